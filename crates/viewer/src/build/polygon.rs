//! Extrusion of instanced 2-D outlines for `polygon` leaves.
//!
//! Each instance maps one outline through its affine matrix, then extrudes
//! it from z = 0 to z = height. Caps use fan triangulation, so outlines are
//! expected to be convex (or star-shaped around their first point). Edges
//! are derived from the perimeter: top ring, bottom ring and the vertical
//! connectors.

use glam::{Vec2, Vec3};
use shared::PolygonShape;

use crate::error::{Result, ViewerError};
use crate::viewport::mesh::{LineGeometry, TriangleGeometry};

/// Map an outline point through `[a, b, c, d, e, f]`.
fn apply_matrix(m: &[f32; 6], p: Vec2) -> Vec2 {
    Vec2::new(m[0] * p.x + m[2] * p.y + m[4], m[1] * p.x + m[3] * p.y + m[5])
}

/// Twice the signed area; positive for counter-clockwise outlines.
fn signed_area2(ring: &[Vec2]) -> f32 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// Resolve every instance's outline in the payload's 2-D frame.
pub fn instance_outlines(shape: &PolygonShape, path: &str) -> Result<Vec<Vec<Vec2>>> {
    if shape.refs.len() != shape.matrices.len() {
        return Err(ViewerError::data_format(
            path,
            "matrices",
            format!("{} matrices for {} refs", shape.matrices.len(), shape.refs.len()),
        ));
    }
    shape
        .refs
        .iter()
        .zip(&shape.matrices)
        .map(|(&r, m)| {
            let outline = shape.polygons.get(r).ok_or_else(|| {
                ViewerError::data_format(
                    path,
                    "refs",
                    format!("ref {} out of range for {} polygons", r, shape.polygons.len()),
                )
            })?;
            if outline.len() % 2 != 0 || outline.len() < 6 {
                return Err(ViewerError::data_format(
                    path,
                    "polygons",
                    format!("outline {} has {} values, need pairs for at least 3 points", r, outline.len()),
                ));
            }
            Ok(outline
                .chunks_exact(2)
                .map(|p| apply_matrix(m, Vec2::new(p[0], p[1])))
                .collect())
        })
        .collect()
}

/// Extrude every instance into one triangle mesh plus its perimeter edges.
pub fn extrude(shape: &PolygonShape, path: &str) -> Result<(TriangleGeometry, LineGeometry)> {
    let outlines = instance_outlines(shape, path)?;
    let height = shape.height;

    let mut mesh = TriangleGeometry {
        positions: Vec::new(),
        normals: Vec::new(),
        indices: Vec::new(),
        uvs: None,
    };
    let mut edges: Vec<f32> = Vec::new();

    for ring in &outlines {
        // Make every ring counter-clockwise so the winding below holds.
        let mut ring = ring.clone();
        if signed_area2(&ring) < 0.0 {
            ring.reverse();
        }
        // A negative height flips which cap faces up.
        let flip = height < 0.0;
        let n = ring.len();
        let bottom: Vec<Vec3> = ring.iter().map(|p| p.extend(0.0)).collect();
        let top: Vec<Vec3> = ring.iter().map(|p| p.extend(height)).collect();

        add_cap(&mut mesh, &bottom, if flip { Vec3::Z } else { Vec3::NEG_Z }, !flip);
        add_cap(&mut mesh, &top, if flip { Vec3::NEG_Z } else { Vec3::Z }, flip);

        // Side walls
        for i in 0..n {
            let next = (i + 1) % n;
            let (b0, b1, t0, t1) = (bottom[i], bottom[next], top[i], top[next]);
            let normal = if flip {
                (t0 - b0).cross(b1 - b0).normalize_or_zero()
            } else {
                (b1 - b0).cross(t0 - b0).normalize_or_zero()
            };
            let base = mesh.vertex_count() as u32;
            for p in [b0, b1, t1, t0] {
                push_vertex(&mut mesh, p, normal);
            }
            if flip {
                mesh.indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
            } else {
                mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }

        // Perimeter edges
        for i in 0..n {
            let next = (i + 1) % n;
            push_segment(&mut edges, bottom[i], bottom[next]);
            push_segment(&mut edges, top[i], top[next]);
            push_segment(&mut edges, bottom[i], top[i]);
        }
    }

    Ok((mesh, LineGeometry { positions: edges, colors: None }))
}

fn push_vertex(mesh: &mut TriangleGeometry, p: Vec3, n: Vec3) {
    mesh.positions.extend_from_slice(&[p.x, p.y, p.z]);
    mesh.normals.extend_from_slice(&[n.x, n.y, n.z]);
}

fn push_segment(edges: &mut Vec<f32>, a: Vec3, b: Vec3) {
    edges.extend_from_slice(&[a.x, a.y, a.z, b.x, b.y, b.z]);
}

/// Fan-triangulated cap; `reversed` emits clockwise triangles.
fn add_cap(mesh: &mut TriangleGeometry, ring: &[Vec3], normal: Vec3, reversed: bool) {
    let base = mesh.vertex_count() as u32;
    for p in ring {
        push_vertex(mesh, *p, normal);
    }
    for i in 1..(ring.len() as u32 - 1) {
        if reversed {
            mesh.indices.extend_from_slice(&[base, base + i + 1, base + i]);
        } else {
            mesh.indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(height: f32) -> PolygonShape {
        PolygonShape {
            polygons: vec![vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]],
            refs: vec![0, 0],
            matrices: vec![[1.0, 0.0, 0.0, 1.0, 0.0, 0.0], [1.0, 0.0, 0.0, 1.0, 2.0, 0.0]],
            height,
        }
    }

    #[test]
    fn test_extrude_two_instances() {
        let (mesh, edges) = extrude(&square(0.5), "/p").unwrap();
        // per instance: 2 caps x 4 + 4 walls x 4
        assert_eq!(mesh.vertex_count(), 2 * 24);
        // per instance: 2 caps x 2 + 4 walls x 2
        assert_eq!(mesh.triangle_count(), 2 * 12);
        // per instance: top ring, bottom ring, connectors
        assert_eq!(edges.segment_count(), 2 * 12);

        let xs: Vec<f32> = mesh.positions.chunks_exact(3).map(|p| p[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), 0.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 3.0);
    }

    #[test]
    fn test_caps_face_outward() {
        let (mesh, _) = extrude(&square(1.0), "/p").unwrap();
        // first cap is the bottom
        assert_eq!(mesh.normal(0), Vec3::NEG_Z);
        assert_eq!(mesh.normal(4), Vec3::Z);
        // first bottom triangle winds clockwise seen from +Z
        let i = &mesh.indices[0..3];
        let (a, b, c) = (mesh.position(i[0] as usize), mesh.position(i[1] as usize), mesh.position(i[2] as usize));
        assert!((b - a).cross(c - a).z < 0.0);
    }

    #[test]
    fn test_clockwise_outline_is_reoriented() {
        let mut shape = square(1.0);
        shape.polygons = vec![vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]];
        let (mesh, _) = extrude(&shape, "/p").unwrap();
        let i = &mesh.indices[6..9];
        let (a, b, c) = (mesh.position(i[0] as usize), mesh.position(i[1] as usize), mesh.position(i[2] as usize));
        assert!((b - a).cross(c - a).z > 0.0);
    }

    #[test]
    fn test_affine_matrix_applied() {
        let m = [0.0, 1.0, -1.0, 0.0, 5.0, 0.0];
        assert_eq!(apply_matrix(&m, Vec2::new(1.0, 0.0)), Vec2::new(5.0, 1.0));
    }

    #[test]
    fn test_bad_ref_and_odd_outline_fail() {
        let mut shape = square(1.0);
        shape.refs = vec![0, 3];
        assert!(matches!(extrude(&shape, "/p"), Err(ViewerError::DataFormat { field: "refs", .. })));

        let mut shape = square(1.0);
        shape.polygons = vec![vec![0.0, 0.0, 1.0]];
        assert!(matches!(extrude(&shape, "/p"), Err(ViewerError::DataFormat { field: "polygons", .. })));

        let mut shape = square(1.0);
        shape.matrices.pop();
        assert!(matches!(extrude(&shape, "/p"), Err(ViewerError::DataFormat { field: "matrices", .. })));
    }
}
