use std::sync::Arc;

use glam::{Affine3A, Vec3};

use super::picking::Aabb;

/// CPU-side indexed triangle mesh: flat positions/normals (3 floats per vertex)
#[derive(Clone, Debug, PartialEq)]
pub struct TriangleGeometry {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    /// 2 floats per vertex
    pub uvs: Option<Vec<f32>>,
}

impl TriangleGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[i * 3..i * 3 + 3])
    }

    pub fn normal(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.normals[i * 3..i * 3 + 3])
    }
}

/// Line segments: flat positions, 2 points (6 floats) per segment
#[derive(Clone, Debug, PartialEq)]
pub struct LineGeometry {
    pub positions: Vec<f32>,
    /// Optional per-vertex RGB, 3 floats per point
    pub colors: Option<Vec<f32>>,
}

impl LineGeometry {
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 6
    }
}

/// Point cloud: flat positions
#[derive(Clone, Debug, PartialEq)]
pub struct PointGeometry {
    pub positions: Vec<f32>,
}

impl PointGeometry {
    pub fn point_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Shared geometry buffer of a sub-mesh. Cloning shares the buffer.
#[derive(Clone, Debug)]
pub enum Geometry {
    Triangles(Arc<TriangleGeometry>),
    Lines(Arc<LineGeometry>),
    Points(Arc<PointGeometry>),
}

impl Geometry {
    pub fn positions(&self) -> &[f32] {
        match self {
            Geometry::Triangles(g) => &g.positions,
            Geometry::Lines(g) => &g.positions,
            Geometry::Points(g) => &g.positions,
        }
    }

    /// Bounds of the geometry after applying `transform`
    pub fn bounds(&self, transform: &Affine3A) -> Option<Aabb> {
        Aabb::from_points(
            self.positions()
                .chunks_exact(3)
                .map(|p| transform.transform_point3(Vec3::new(p[0], p[1], p[2]))),
        )
    }

    /// True when both handles point at the same buffer
    pub fn shares_buffer_with(&self, other: &Geometry) -> bool {
        match (self, other) {
            (Geometry::Triangles(a), Geometry::Triangles(b)) => Arc::ptr_eq(a, b),
            (Geometry::Lines(a), Geometry::Lines(b)) => Arc::ptr_eq(a, b),
            (Geometry::Points(a), Geometry::Points(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ── Primitive generation ─────────────────────────────────────

/// Axis-aligned box centered at the origin, 4 vertices and 2 triangles per side.
/// Sides are emitted in the order +Z, -Z, +X, -X, +Y, -Y.
pub fn cube(w: f32, h: f32, d: f32) -> TriangleGeometry {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let hd = d * 0.5;

    let faces: [([Vec3; 4], Vec3); 6] = [
        // Front (+Z)
        ([Vec3::new(-hw, -hh, hd), Vec3::new(hw, -hh, hd), Vec3::new(hw, hh, hd), Vec3::new(-hw, hh, hd)], Vec3::Z),
        // Back (-Z)
        ([Vec3::new(hw, -hh, -hd), Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, hh, -hd), Vec3::new(hw, hh, -hd)], Vec3::NEG_Z),
        // Right (+X)
        ([Vec3::new(hw, -hh, hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, hh, -hd), Vec3::new(hw, hh, hd)], Vec3::X),
        // Left (-X)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(-hw, -hh, hd), Vec3::new(-hw, hh, hd), Vec3::new(-hw, hh, -hd)], Vec3::NEG_X),
        // Top (+Y)
        ([Vec3::new(-hw, hh, hd), Vec3::new(hw, hh, hd), Vec3::new(hw, hh, -hd), Vec3::new(-hw, hh, -hd)], Vec3::Y),
        // Bottom (-Y)
        ([Vec3::new(-hw, -hh, -hd), Vec3::new(hw, -hh, -hd), Vec3::new(hw, -hh, hd), Vec3::new(-hw, -hh, hd)], Vec3::NEG_Y),
    ];

    let mut positions = Vec::with_capacity(24 * 3);
    let mut normals = Vec::with_capacity(24 * 3);
    let mut indices = Vec::with_capacity(36);

    for (quad, normal) in &faces {
        let base = (positions.len() / 3) as u32;
        for v in quad {
            positions.extend_from_slice(&[v.x, v.y, v.z]);
            normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    TriangleGeometry { positions, normals, indices, uvs: None }
}

/// Square of side `size` in the XY plane facing +Z. Used for clip caps.
pub fn plane(size: f32) -> TriangleGeometry {
    let h = size * 0.5;
    TriangleGeometry {
        positions: vec![-h, -h, 0.0, h, -h, 0.0, h, h, 0.0, -h, h, 0.0],
        normals: [0.0, 0.0, 1.0].repeat(4),
        indices: vec![0, 1, 2, 0, 2, 3],
        uvs: None,
    }
}

/// One segment per vertex along its normal, for the normals debug helper.
pub fn normal_lines(mesh: &TriangleGeometry, length: f32) -> LineGeometry {
    let mut positions = Vec::with_capacity(mesh.vertex_count() * 6);
    for i in 0..mesh.vertex_count() {
        let p = mesh.position(i);
        let q = p + mesh.normal(i) * length;
        positions.extend_from_slice(&[p.x, p.y, p.z, q.x, q.y, q.z]);
    }
    LineGeometry { positions, colors: None }
}
