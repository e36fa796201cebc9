//! Exploded view: split every tessellated leaf into one synthetic leaf per
//! face, edge and vertex.
//!
//! Works on a private copy; the caller's tree is never touched. Any
//! malformed leaf aborts the whole pass.

use std::collections::HashMap;

use shared::{
    ColorSpec, FloatBuffer, IndexBuffer, NodePath, Shape, ShapeNode, ShapePayload, Visibility,
    VisibilityState,
};

use crate::codec::{Tessellation, POINT_STRIDE, UV_STRIDE};
use crate::error::{Result, ViewerError};
use crate::viewport::render_unit::LeafKind;

/// Point size of synthetic vertex leaves under solids and edge sets.
pub const EXPLODED_POINT_SIZE: f32 = 4.0;
/// Line width of synthetic edge leaves under solids.
pub const EXPLODED_FACE_EDGE_WIDTH: f32 = 1.0;

/// Decompose a whole tree. Returns the rewritten copy.
pub fn decompose(root: &ShapeNode, edge_color: &str) -> Result<ShapeNode> {
    let mut out = root.clone();
    decompose_in_place(&mut out, edge_color)?;
    Ok(out)
}

fn decompose_in_place(node: &mut ShapeNode, edge_color: &str) -> Result<()> {
    if let Some(parts) = node.parts.as_mut() {
        for child in parts.iter_mut() {
            decompose_in_place(child, edge_color)?;
        }
        return Ok(());
    }
    decompose_leaf(node, edge_color)
}

fn decompose_leaf(node: &mut ShapeNode, edge_color: &str) -> Result<()> {
    let kind = LeafKind::from_tag(node.kind.as_deref(), &node.id)?;
    if kind == LeafKind::Polygon {
        return Ok(());
    }
    let shape = match node.shape.take() {
        Some(ShapePayload::Tessellated(shape)) => shape,
        Some(other @ ShapePayload::Polygon(_)) => {
            // polygon payload under a non-polygon tag stays as it is
            node.shape = Some(other);
            return Ok(());
        }
        None => {
            return Err(ViewerError::MissingGeometryData {
                path: node.id.clone(),
                field: "shape",
                kind: kind.as_str(),
            })
        }
    };
    kind.check_required(&shape, &node.id)?;
    let tess = Tessellation::decode(shape, &node.id)?;
    if kind == LeafKind::Shapes {
        tess.check_vertex_normals(&node.id)?;
    }
    let parent_state = node.state_or_default();

    let mut branches = Vec::new();
    if kind == LeafKind::Shapes {
        let faces = face_leaves(node, &tess, parent_state);
        push_branch(&mut branches, &node.id, "faces", faces);
    }
    if matches!(kind, LeafKind::Shapes | LeafKind::Edges) {
        let edges = edge_leaves(node, kind, &tess, parent_state, edge_color)?;
        push_branch(&mut branches, &node.id, "edges", edges);
    }
    let vertices = vertex_leaves(node, kind, &tess, parent_state, edge_color);
    push_branch(&mut branches, &node.id, "vertices", vertices);

    tracing::debug!(
        path = %node.id,
        faces = tess.face_count(),
        edges = tess.edge_count(),
        vertices = tess.point_count(),
        "decomposed leaf"
    );

    node.parts = Some(branches);
    node.color = None;
    node.alpha = None;
    node.renderback = None;
    Ok(())
}

fn push_branch(branches: &mut Vec<ShapeNode>, parent: &str, name: &str, leaves: Vec<ShapeNode>) {
    if leaves.is_empty() {
        return;
    }
    branches.push(ShapeNode::group(name, format!("{parent}/{name}"), leaves));
}

fn child_id(parent: &str, branch: &str, j: usize) -> NodePath {
    format!("{parent}/{branch}/{branch}_{j}")
}

fn face_leaves(parent: &ShapeNode, tess: &Tessellation, state: VisibilityState) -> Vec<ShapeNode> {
    tess.face_ranges()
        .into_iter()
        .enumerate()
        .map(|(j, range)| {
            let mut remap: HashMap<u32, u32> = HashMap::new();
            let mut vertices = Vec::new();
            let mut normals = Vec::new();
            let mut uvs = tess.uvs.as_ref().map(|_| Vec::new());
            let triangles: Vec<u32> = tess.triangles[range]
                .iter()
                .map(|&i| {
                    *remap.entry(i).or_insert_with(|| {
                        let v = i as usize * POINT_STRIDE;
                        vertices.extend_from_slice(&tess.vertices[v..v + POINT_STRIDE]);
                        normals.extend_from_slice(&tess.normals[v..v + POINT_STRIDE]);
                        if let (Some(out), Some(src)) = (uvs.as_mut(), tess.uvs.as_ref()) {
                            let u = i as usize * UV_STRIDE;
                            out.extend_from_slice(&src[u..u + UV_STRIDE]);
                        }
                        (vertices.len() / POINT_STRIDE - 1) as u32
                    })
                })
                .collect();
            let face_type = (!tess.face_types.is_empty()).then(|| tess.face_types[j]);
            let shape = Shape {
                vertices: Some(FloatBuffer::Flat(vertices)),
                normals: Some(FloatBuffer::Flat(normals)),
                triangles_per_face: Some(vec![(triangles.len() / 3) as u32]),
                triangles: Some(IndexBuffer::Flat(triangles)),
                face_types: face_type.map(|t| vec![t]),
                uvs: uvs.map(FloatBuffer::Flat),
                ..Default::default()
            };
            ShapeNode {
                name: format!("faces_{j}"),
                id: child_id(&parent.id, "faces", j),
                shape: Some(ShapePayload::Tessellated(shape)),
                state: Some(VisibilityState(state.faces(), Visibility::NotApplicable)),
                kind: Some(LeafKind::Shapes.as_str().to_string()),
                color: parent.color.clone(),
                alpha: parent.alpha,
                renderback: Some(true),
                geomtype: face_type,
                ..Default::default()
            }
        })
        .collect()
}

fn edge_leaves(
    parent: &ShapeNode,
    kind: LeafKind,
    tess: &Tessellation,
    state: VisibilityState,
    edge_color: &str,
) -> Result<Vec<ShapeNode>> {
    let ranges = tess.edge_ranges();
    let colors: Vec<String> = match (kind, &parent.color) {
        (LeafKind::Shapes, _) | (_, None) => vec![edge_color.to_string(); ranges.len()],
        (_, Some(ColorSpec::Single(c))) => vec![c.clone(); ranges.len()],
        (_, Some(ColorSpec::PerEdge(list))) => {
            if list.len() != ranges.len() {
                return Err(ViewerError::data_format(
                    &parent.id,
                    "color",
                    format!("{} colors for {} edges", list.len(), ranges.len()),
                ));
            }
            list.clone()
        }
    };
    let width = match kind {
        LeafKind::Edges => parent.width,
        _ => Some(EXPLODED_FACE_EDGE_WIDTH),
    };

    Ok(ranges
        .into_iter()
        .zip(colors)
        .enumerate()
        .map(|(j, (range, color))| {
            let segments = (range.len() / 6) as u32;
            let edge_type = (!tess.edge_types.is_empty()).then(|| tess.edge_types[j]);
            let shape = Shape {
                edges: Some(FloatBuffer::Flat(tess.edges[range].to_vec())),
                segments_per_edge: Some(vec![segments]),
                edge_types: edge_type.map(|t| vec![t]),
                ..Default::default()
            };
            ShapeNode {
                name: format!("edges_{j}"),
                id: child_id(&parent.id, "edges", j),
                shape: Some(ShapePayload::Tessellated(shape)),
                state: Some(VisibilityState(Visibility::NotApplicable, state.edges())),
                kind: Some(LeafKind::Edges.as_str().to_string()),
                color: Some(ColorSpec::Single(color)),
                width,
                geomtype: edge_type,
                ..Default::default()
            }
        })
        .collect())
}

fn vertex_leaves(
    parent: &ShapeNode,
    kind: LeafKind,
    tess: &Tessellation,
    state: VisibilityState,
    edge_color: &str,
) -> Vec<ShapeNode> {
    let (color, size) = match kind {
        LeafKind::Vertices => (parent.color.clone(), parent.size),
        _ => (
            Some(ColorSpec::Single(edge_color.to_string())),
            Some(EXPLODED_POINT_SIZE),
        ),
    };
    tess.obj_vertices
        .chunks_exact(POINT_STRIDE)
        .enumerate()
        .map(|(j, p)| ShapeNode {
            name: format!("vertices_{j}"),
            id: child_id(&parent.id, "vertices", j),
            shape: Some(ShapePayload::Tessellated(Shape {
                obj_vertices: Some(FloatBuffer::Flat(p.to_vec())),
                ..Default::default()
            })),
            state: Some(VisibilityState(Visibility::NotApplicable, state.edges())),
            kind: Some(LeafKind::Vertices.as_str().to_string()),
            color: color.clone(),
            size,
            ..Default::default()
        })
        .collect()
}
