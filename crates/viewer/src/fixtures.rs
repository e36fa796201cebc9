//! Factory functions for creating payload test data.
//!
//! Provides shape-tree leaves in both wire encodings, used by unit tests,
//! integration tests and the headless harness.

use shared::*;

use crate::viewport::mesh::cube;

// ── Solids ──────────────────────────────────────────────────────

/// Corners of the unit cube centered at the origin.
fn cube_corners() -> Vec<[f32; 3]> {
    let mut corners = Vec::with_capacity(8);
    for x in [-0.5, 0.5] {
        for y in [-0.5, 0.5] {
            for z in [-0.5, 0.5] {
                corners.push([x, y, z]);
            }
        }
    }
    corners
}

/// The 12 cube edges as corner index pairs into [`cube_corners`].
const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7), // along z
    (0, 2), (1, 3), (4, 6), (5, 7), // along y
    (0, 4), (1, 5), (2, 6), (3, 7), // along x
];

/// A unit cube solid in the flat encoding: 6 faces of 2 triangles,
/// 12 single-segment edges and 8 vertices.
pub fn unit_cube(id: &str, color: &str) -> ShapeNode {
    let mesh = cube(1.0, 1.0, 1.0);
    let corners = cube_corners();
    let edges: Vec<f32> = CUBE_EDGES
        .iter()
        .flat_map(|&(a, b)| corners[a].into_iter().chain(corners[b]))
        .collect();

    let shape = Shape {
        vertices: Some(FloatBuffer::Flat(mesh.positions)),
        normals: Some(FloatBuffer::Flat(mesh.normals)),
        triangles: Some(IndexBuffer::Flat(mesh.indices)),
        triangles_per_face: Some(vec![2; 6]),
        edges: Some(FloatBuffer::Flat(edges)),
        segments_per_edge: Some(vec![1; 12]),
        obj_vertices: Some(FloatBuffer::Flat(corners.into_iter().flatten().collect())),
        edge_types: Some(vec![0; 12]),
        face_types: Some(vec![0; 6]),
        uvs: None,
    };
    solid(id, color, shape)
}

/// Same cube as [`unit_cube`] in the nested encoding.
pub fn unit_cube_nested(id: &str, color: &str) -> ShapeNode {
    let mesh = cube(1.0, 1.0, 1.0);
    let corners = cube_corners();
    let shape = Shape {
        vertices: Some(FloatBuffer::Nested(mesh.positions.chunks(3).map(<[f32]>::to_vec).collect())),
        normals: Some(FloatBuffer::Nested(mesh.normals.chunks(3).map(<[f32]>::to_vec).collect())),
        triangles: Some(IndexBuffer::Nested(mesh.indices.chunks(6).map(<[u32]>::to_vec).collect())),
        triangles_per_face: None,
        edges: Some(FloatBuffer::Nested(
            CUBE_EDGES
                .iter()
                .map(|&(a, b)| corners[a].into_iter().chain(corners[b]).collect())
                .collect(),
        )),
        segments_per_edge: None,
        obj_vertices: Some(FloatBuffer::Nested(corners.iter().map(|c| c.to_vec()).collect())),
        edge_types: Some(vec![0; 12]),
        face_types: Some(vec![0; 6]),
        uvs: None,
    };
    solid(id, color, shape)
}

/// A flat solid of `n` triangles in a zig-zag strip, one face per triangle.
pub fn triangle_strip_solid(id: &str, n: usize) -> ShapeNode {
    let mut vertices = Vec::with_capacity((n + 2) * 3);
    for i in 0..n + 2 {
        let x = (i / 2) as f32;
        let y = (i % 2) as f32;
        vertices.extend_from_slice(&[x, y, 0.0]);
    }
    let triangles: Vec<u32> = (0..n as u32).flat_map(|i| [i, i + 1, i + 2]).collect();
    let shape = Shape {
        normals: Some(FloatBuffer::Flat([0.0, 0.0, 1.0].repeat(n + 2))),
        vertices: Some(FloatBuffer::Flat(vertices)),
        triangles: Some(IndexBuffer::Flat(triangles)),
        triangles_per_face: Some(vec![1; n]),
        face_types: Some(vec![0; n]),
        ..Default::default()
    };
    solid(id, "#4080c0", shape)
}

fn solid(id: &str, color: &str, shape: Shape) -> ShapeNode {
    ShapeNode {
        subtype: Some("solid".to_string()),
        color: Some(ColorSpec::Single(color.to_string())),
        alpha: Some(1.0),
        ..ShapeNode::leaf(leaf_name(id), id, "shapes", ShapePayload::Tessellated(shape))
    }
}

// ── Edges, vertices, polygons ───────────────────────────────────

/// An edges leaf with one edge per entry of `segments`, each a polyline of
/// that many unit segments along x at y = edge index.
pub fn edge_set(id: &str, segments: &[u32]) -> ShapeNode {
    let mut edges = Vec::new();
    for (j, &count) in segments.iter().enumerate() {
        for s in 0..count {
            let (x, y) = (s as f32, j as f32);
            edges.extend_from_slice(&[x, y, 0.0, x + 1.0, y, 0.0]);
        }
    }
    let shape = Shape {
        edges: Some(FloatBuffer::Flat(edges)),
        segments_per_edge: Some(segments.to_vec()),
        edge_types: Some(vec![1; segments.len()]),
        ..Default::default()
    };
    ShapeNode {
        color: Some(ColorSpec::Single("#ba55d3".to_string())),
        width: Some(2.0),
        ..ShapeNode::leaf(leaf_name(id), id, "edges", ShapePayload::Tessellated(shape))
    }
}

/// Same as [`edge_set`] in the nested encoding.
pub fn edge_set_nested(id: &str, segments: &[u32]) -> ShapeNode {
    let per_edge = segments
        .iter()
        .enumerate()
        .map(|(j, &count)| {
            (0..count)
                .flat_map(|s| {
                    let (x, y) = (s as f32, j as f32);
                    [x, y, 0.0, x + 1.0, y, 0.0]
                })
                .collect()
        })
        .collect();
    let mut node = edge_set(id, segments);
    node.shape = Some(ShapePayload::Tessellated(Shape {
        edges: Some(FloatBuffer::Nested(per_edge)),
        edge_types: Some(vec![1; segments.len()]),
        ..Default::default()
    }));
    node
}

/// A vertices leaf with `n` points along the diagonal.
pub fn vertex_cloud(id: &str, n: usize) -> ShapeNode {
    let points: Vec<f32> = (0..n).flat_map(|i| [i as f32; 3]).collect();
    let shape = Shape {
        obj_vertices: Some(FloatBuffer::Flat(points)),
        ..Default::default()
    };
    ShapeNode {
        color: Some(ColorSpec::Single("#ff8c00".to_string())),
        ..ShapeNode::leaf(leaf_name(id), id, "vertices", ShapePayload::Tessellated(shape))
    }
}

/// A 1x1 square plate extruded to 0.5.
pub fn polygon_plate(id: &str) -> ShapeNode {
    let shape = PolygonShape {
        polygons: vec![vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]],
        refs: vec![0],
        matrices: vec![[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]],
        height: 0.5,
    };
    ShapeNode {
        color: Some(ColorSpec::Single("#c0c0c0".to_string())),
        ..ShapeNode::leaf(leaf_name(id), id, "polygon", ShapePayload::Polygon(shape))
    }
}

// ── Trees ───────────────────────────────────────────────────────

/// A small assembly with one leaf of every type.
pub fn assembly(id: &str) -> ShapeNode {
    let mut cube = unit_cube(&format!("{id}/cube"), "#e8b024");
    cube.loc = Some(Location([2.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
    ShapeNode::group(
        leaf_name(id),
        id,
        vec![
            cube,
            edge_set(&format!("{id}/edges"), &[3, 2]),
            vertex_cloud(&format!("{id}/points"), 4),
            polygon_plate(&format!("{id}/plate")),
        ],
    )
}

/// Serialize a tree to its wire JSON.
pub fn payload_json(node: &ShapeNode) -> String {
    serde_json::to_string(node).unwrap_or_default()
}

fn leaf_name(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}
