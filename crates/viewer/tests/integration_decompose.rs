//! Integration tests for the exploded view.
//!
//! Tests end-to-end: shape tree -> decompose -> build -> per-leaf render units.

use cad_viewer_lib::codec::normalize_shape;
use cad_viewer_lib::decompose::decompose;
use cad_viewer_lib::fixtures::*;
use cad_viewer_lib::harness::ViewerHarness;
use cad_viewer_lib::state::settings::RenderOptions;
use cad_viewer_lib::viewport::mesh::Geometry;
use cad_viewer_lib::viewport::render_unit::{LeafKind, Role};
use cad_viewer_lib::ViewerError;
use shared::{FloatBuffer, ShapePayload};

fn exploded() -> ViewerHarness {
    ViewerHarness::with_options(RenderOptions {
        exploded: true,
        ..RenderOptions::default()
    })
}

#[test]
fn test_normalize_is_idempotent_for_both_encodings() {
    for node in [unit_cube("/a", "#ffffff"), unit_cube_nested("/b", "#ffffff")] {
        let mut once = node.shape.unwrap().as_tessellated().unwrap().clone();
        normalize_shape(&mut once, "/x").unwrap();
        let mut twice = once.clone();
        normalize_shape(&mut twice, "/x").unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn test_hundred_faces_become_hundred_leaves() {
    let tree = triangle_strip_solid("/s", 100);
    let out = decompose(&tree, "#707070").unwrap();
    assert!(out.shape.is_none());
    assert!(out.color.is_none());
    assert_eq!(out.children()[0].children().len(), 100);

    let mut h = exploded();
    h.load(&tree).unwrap();
    let faces = h.graph.subtree_units("/s/faces");
    assert_eq!(faces.len(), 100);
    let total: usize = faces
        .iter()
        .filter_map(|p| h.unit(p))
        .map(|u| match u.submesh(Role::Front).map(|m| &m.geometry) {
            Some(Geometry::Triangles(mesh)) => mesh.triangle_count(),
            _ => 0,
        })
        .sum();
    assert_eq!(total, 100);
}

#[test]
fn test_edge_segments_are_preserved() {
    let segments = [3, 2, 1, 4, 1, 1, 2, 2, 5, 1, 1, 3];
    let total: u32 = segments.iter().sum();

    let mut h = exploded();
    h.load(&edge_set("/e", &segments)).unwrap();
    let edges = h.graph.subtree_units("/e/edges");
    assert_eq!(edges.len(), 12);
    let drawn: usize = edges
        .iter()
        .filter_map(|p| h.unit(p))
        .map(|u| {
            assert_eq!(u.kind(), LeafKind::Edges);
            match u.submesh(Role::Edges).map(|m| &m.geometry) {
                Some(Geometry::Lines(lines)) => lines.segment_count(),
                _ => 0,
            }
        })
        .sum();
    assert_eq!(drawn, total as usize);
}

#[test]
fn test_exploded_cube_has_every_part() {
    let mut h = exploded();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    assert_eq!(h.graph.subtree_units("/cube/faces").len(), 6);
    assert_eq!(h.graph.subtree_units("/cube/edges").len(), 12);
    assert_eq!(h.graph.subtree_units("/cube/vertices").len(), 8);
    assert!(h.validate_all().is_empty());
    // exploded faces are not solids, so nothing gets a cap
    assert_eq!(h.last_caps().attached, 0);
}

#[test]
fn test_nested_and_flat_explode_alike() {
    let flat = decompose(&unit_cube("/cube", "#e8b024"), "#707070").unwrap();
    let nested = decompose(&unit_cube_nested("/cube", "#e8b024"), "#707070").unwrap();
    let ids = |n: &shared::ShapeNode| -> Vec<String> {
        n.children()
            .iter()
            .flat_map(|b| b.children().iter().map(|l| l.id.clone()))
            .collect()
    };
    assert_eq!(ids(&flat), ids(&nested));
}

#[test]
fn test_bad_vertex_stride_names_leaf() {
    let mut cloud = vertex_cloud("/v", 2);
    if let Some(ShapePayload::Tessellated(shape)) = cloud.shape.as_mut() {
        shape.obj_vertices = Some(FloatBuffer::Flat(vec![0.0; 5]));
    }
    let err = exploded().load(&cloud).unwrap_err();
    assert!(matches!(err, ViewerError::DataFormat { .. }));
    assert_eq!(err.path(), Some("/v"));
}

#[test]
fn test_malformed_solid_fails_the_same_in_both_modes() {
    let mut cube = unit_cube("/asm/cube", "#e8b024");
    if let Some(ShapePayload::Tessellated(shape)) = cube.shape.as_mut() {
        shape.triangles = None;
    }
    let tree = shared::ShapeNode::group("asm", "/asm", vec![cube, edge_set("/asm/edges", &[2])]);

    let mut normal = ViewerHarness::with_options(RenderOptions::default());
    let mut split = exploded();
    for harness in [&mut normal, &mut split] {
        let err = harness.load(&tree).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::MissingGeometryData { field: "triangles", .. }
        ));
        assert_eq!(err.path(), Some("/asm/cube"));
        assert_eq!(harness.unit_count(), 0);
    }
}

#[test]
fn test_short_uvs_reject_the_model() {
    let mut cube = unit_cube("/cube", "#e8b024");
    if let Some(ShapePayload::Tessellated(shape)) = cube.shape.as_mut() {
        shape.uvs = Some(FloatBuffer::Flat(vec![0.0; 4]));
    }
    let err = exploded().load(&cube).unwrap_err();
    assert!(matches!(err, ViewerError::DataFormat { field: "uvs", .. }));
    assert_eq!(err.path(), Some("/cube"));
}
