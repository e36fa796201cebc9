//! Geometry validation utilities.
//!
//! `GeometryValidator` checks built triangle geometry: stride, in-range
//! indices, normalized normals, bounding box dimensions.

use crate::viewport::mesh::TriangleGeometry;
use crate::viewport::picking::Aabb;

/// Validator for `TriangleGeometry` integrity checks.
pub struct GeometryValidator<'a> {
    mesh: &'a TriangleGeometry,
}

impl<'a> GeometryValidator<'a> {
    pub fn new(mesh: &'a TriangleGeometry) -> Self {
        Self { mesh }
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Positions and normals are both whole triples and of equal length.
    pub fn is_stride_valid(&self) -> bool {
        self.mesh.positions.len() % 3 == 0 && self.mesh.normals.len() == self.mesh.positions.len()
    }

    pub fn is_index_stride_valid(&self) -> bool {
        self.mesh.indices.len() % 3 == 0
    }

    pub fn are_indices_in_range(&self) -> bool {
        let max_idx = self.vertex_count() as u32;
        self.mesh.indices.iter().all(|&i| i < max_idx)
    }

    /// Check that all vertex normals have unit length (within epsilon).
    pub fn are_normals_normalized(&self, epsilon: f32) -> bool {
        self.mesh
            .normals
            .chunks_exact(3)
            .all(|n| ((n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt() - 1.0).abs() <= epsilon)
    }

    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_points((0..self.vertex_count()).map(|i| self.mesh.position(i)))
    }

    /// Width, height, depth of the bounding box (zero when empty).
    pub fn dimensions(&self) -> [f32; 3] {
        self.aabb().map_or([0.0; 3], |b| b.size().to_array())
    }

    pub fn dimensions_approx(&self, expected: [f32; 3], tolerance: f32) -> bool {
        let dims = self.dimensions();
        (0..3).all(|i| (dims[i] - expected[i]).abs() < tolerance)
    }

    /// Run all validation checks and return a list of error messages.
    /// An empty list means the geometry is valid.
    pub fn validate_all(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_stride_valid() {
            errors.push(format!(
                "Position/normal lengths {}/{} are not matching triples",
                self.mesh.positions.len(),
                self.mesh.normals.len()
            ));
        }
        if !self.is_index_stride_valid() {
            errors.push(format!(
                "Index buffer length {} is not a multiple of 3",
                self.mesh.indices.len()
            ));
        }
        if !self.are_indices_in_range() {
            let max_idx = self.vertex_count() as u32;
            let out_of_range = self.mesh.indices.iter().filter(|&&i| i >= max_idx).count();
            errors.push(format!("{out_of_range} indices out of range (vertex count {max_idx})"));
        }
        if !self.are_normals_normalized(1e-3) {
            errors.push("Some normals are not unit length".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::mesh::{cube, plane};

    #[test]
    fn test_cube_is_valid() {
        let mesh = cube(2.0, 1.0, 3.0);
        let v = GeometryValidator::new(&mesh);
        assert!(v.validate_all().is_empty());
        assert!(v.dimensions_approx([2.0, 1.0, 3.0], 1e-5));
    }

    #[test]
    fn test_detects_bad_index_and_normal() {
        let mut mesh = plane(1.0);
        mesh.indices.push(9);
        mesh.normals[0] = 3.0;
        let errors = GeometryValidator::new(&mesh).validate_all();
        assert_eq!(errors.len(), 3);
    }
}
