//! Integration tests for scene graph building and render unit state.
//!
//! Tests end-to-end: shape tree -> SceneGraphBuilder -> render units -> ops.

use cad_viewer_lib::build::SceneGraphBuilder;
use cad_viewer_lib::fixtures::*;
use cad_viewer_lib::harness::ViewerHarness;
use cad_viewer_lib::state::settings::RenderOptions;
use cad_viewer_lib::validation::GeometryValidator;
use cad_viewer_lib::viewport::mesh::Geometry;
use cad_viewer_lib::viewport::render_unit::{LeafKind, Role, UnitOp};
use cad_viewer_lib::ViewerError;
use shared::{ShapeNode, Visibility};

#[test]
fn test_assembly_end_to_end() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();

    let errors = h.validate_all();
    assert!(errors.is_empty(), "Validation errors: {:?}", errors);
    assert_eq!(h.unit_count(), 4);
    assert_eq!(h.unit("/asm/cube").unwrap().kind(), LeafKind::Shapes);
    assert_eq!(h.unit("/asm/edges").unwrap().kind(), LeafKind::Edges);
    assert_eq!(h.unit("/asm/points").unwrap().kind(), LeafKind::Vertices);
    assert_eq!(h.unit("/asm/plate").unwrap().kind(), LeafKind::Polygon);
}

#[test]
fn test_cube_translation_from_loc() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();
    let bounds = h.unit("/asm/cube").unwrap().bounds().unwrap();
    assert_eq!(bounds.center().x, 2.0);
}

#[test]
fn test_nested_and_flat_build_the_same_mesh() {
    let opts = RenderOptions::default();
    let flat = SceneGraphBuilder::new(opts.clone()).build(&unit_cube("/c", "#e8b024")).unwrap();
    let nested = SceneGraphBuilder::new(opts).build(&unit_cube_nested("/c", "#e8b024")).unwrap();

    let mesh = |g: &cad_viewer_lib::build::SceneGraph| match &g.unit("/c").unwrap().submesh(Role::Front).unwrap().geometry {
        Geometry::Triangles(m) => m.as_ref().clone(),
        other => panic!("expected triangles, got {other:?}"),
    };
    let (a, b) = (mesh(&flat), mesh(&nested));
    assert_eq!(a.positions, b.positions);
    assert_eq!(a.indices, b.indices);
    assert!(GeometryValidator::new(&a).dimensions_approx([1.0, 1.0, 1.0], 1e-5));
}

#[test]
fn test_highlight_cycles_restore_exact_color() {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    let before = h.unit("/cube").unwrap().submesh(Role::Front).unwrap().material.clone();

    for _ in 0..2 {
        h.hover(Some("/cube"));
        assert_ne!(h.unit("/cube").unwrap().submesh(Role::Front).unwrap().material.color, before.color);
        h.hover(None);
    }
    assert_eq!(h.unit("/cube").unwrap().submesh(Role::Front).unwrap().material, before);
}

#[test]
fn test_selection_survives_hover() {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    h.select("/cube");
    let selected = h.unit("/cube").unwrap().submesh(Role::Front).unwrap().material.color;
    h.hover(Some("/cube"));
    h.hover(None);
    assert_eq!(h.unit("/cube").unwrap().submesh(Role::Front).unwrap().material.color, selected);
    assert!(h.unit("/cube").unwrap().state().selected);
}

#[test]
fn test_set_state_on_group_reaches_leaves() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();
    let touched = h.graph.set_state("/asm", Visibility::Hidden, Visibility::Shown);
    assert_eq!(touched, 4);
    let cube = h.unit("/asm/cube").unwrap();
    assert!(!cube.submesh(Role::Front).unwrap().visible);
    assert!(cube.submesh(Role::Edges).unwrap().visible);
}

#[test]
fn test_session_transparency_disables_depth_writes() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();
    assert!(!h.graph.session_transparent());

    h.apply("/asm/plate", UnitOp::SetTransparent(true));
    assert!(h.graph.session_transparent());
    let cube = h.unit("/asm/cube").unwrap();
    assert!(!cube.submesh(Role::Front).unwrap().material.depth_write);

    h.apply("/asm/plate", UnitOp::SetTransparent(false));
    assert!(!h.graph.session_transparent());
}

#[test]
fn test_unknown_leaf_type_rejected() {
    let mut node = unit_cube("/x", "#ffffff");
    node.kind = Some("nurbs".into());
    let err = SceneGraphBuilder::new(RenderOptions::default()).build(&node).unwrap_err();
    assert!(matches!(err, ViewerError::UnsupportedLeafType { .. }));
}

#[test]
fn test_missing_vertices_reported() {
    let mut node = unit_cube("/x", "#ffffff");
    if let Some(shared::ShapePayload::Tessellated(shape)) = node.shape.as_mut() {
        shape.vertices = None;
    }
    let err = SceneGraphBuilder::new(RenderOptions::default()).build(&node).unwrap_err();
    assert!(matches!(err, ViewerError::MissingGeometryData { .. }));
    assert_eq!(err.path(), Some("/x"));
}

#[test]
fn test_json_payload_loads() {
    let json = payload_json(&assembly("/asm"));
    let mut h = ViewerHarness::new();
    h.load_json(&json).unwrap();
    assert_eq!(h.unit_count(), 4);
    assert_eq!(ShapeNode::from_json(&json).unwrap().leaf_count(), 4);
}

#[test]
fn test_dispose_twice_empties_registry() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();
    h.dispose();
    h.dispose();
    assert!(h.graph.is_empty());
    assert!(!h.clipping.has_planes());
    assert!(h.frame().unwrap().stencil_pairs().is_empty());
}
