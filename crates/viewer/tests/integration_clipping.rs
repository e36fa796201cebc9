//! Integration tests for clip planes and stencil caps.

use cad_viewer_lib::fixtures::*;
use cad_viewer_lib::harness::ViewerHarness;
use cad_viewer_lib::viewport::frame::{DrawRole, Pass};
use cad_viewer_lib::viewport::material::{Color, StencilOp};
use cad_viewer_lib::viewport::render_unit::UnitOp;

fn clipped_cube() -> ViewerHarness {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    h.set_clipping(true);
    h.set_clip_distance(0, 0.0);
    h
}

#[test]
fn test_cap_color_follows_object_color_mode() {
    let mut h = clipped_cube();
    assert_eq!(h.clipping.cap_color_of(&h.graph, 0, "/cube"), Some(Color(0xff0000)));

    h.set_object_color_caps(true);
    assert_eq!(h.clipping.cap_color_of(&h.graph, 0, "/cube"), Some(Color(0xe8b024)));

    h.set_object_color_caps(false);
    assert_eq!(h.clipping.cap_color_of(&h.graph, 0, "/cube"), Some(Color(0xff0000)));
}

#[test]
fn test_caps_only_for_solids() {
    let mut h = ViewerHarness::new();
    h.load(&assembly("/asm")).unwrap();
    // one solid cube, three axes
    assert_eq!(h.last_caps().attached, 3);
    assert!(h.unit("/asm/plate").unwrap().clip_meshes(0).is_none());
    assert!(h.unit("/asm/edges").unwrap().clip_meshes(0).is_none());
}

#[test]
fn test_stencil_pass_per_axis() {
    let h = clipped_cube();
    let plan = h.frame().unwrap();
    assert_eq!(plan.stencil_pairs(), vec![(0, "/cube"), (1, "/cube"), (2, "/cube")]);

    for pass in &plan.passes {
        let Pass::Stencil { items, .. } = pass else { continue };
        assert_eq!(items[0].role, DrawRole::BackStencil);
        assert_eq!(items[0].material.stencil.unwrap().pass, StencilOp::IncrementWrap);
        assert_eq!(items[1].role, DrawRole::FrontStencil);
        assert_eq!(items[1].material.stencil.unwrap().pass, StencilOp::DecrementWrap);
        assert_eq!(items[2].role, DrawRole::Cap);
        assert!(items[2].material.color_write);
    }
}

#[test]
fn test_plane_distance_moves_constant() {
    let mut h = clipped_cube();
    h.set_clip_distance(1, 0.25);
    let planes = h.clipping.planes().unwrap();
    // normal -Y through the origin-centered cube
    assert_eq!(planes[1].constant, 0.25);
    assert_eq!(h.clipping.distance(1), 0.25);
}

#[test]
fn test_hidden_solid_loses_caps() {
    let mut h = clipped_cube();
    h.apply("/cube", UnitOp::SetFacesVisible(false));
    assert!(h.frame().unwrap().stencil_pairs().is_empty());
    h.apply("/cube", UnitOp::SetFacesVisible(true));
    assert_eq!(h.frame().unwrap().stencil_pairs().len(), 3);
}

#[test]
fn test_intersection_reaches_materials() {
    let mut h = clipped_cube();
    h.set_clip_intersection(true);
    let plan = h.frame().unwrap();
    let Pass::Opaque(items) = &plan.passes[0] else { panic!("expected opaque pass") };
    assert!(items.iter().all(|i| i.material.clip_intersection));
}

#[test]
fn test_reload_replaces_caps() {
    let mut h = clipped_cube();
    h.load(&unit_cube("/other", "#00ff00")).unwrap();
    assert!(h.unit("/cube").is_none());
    assert_eq!(h.frame().unwrap().stencil_pairs(), vec![(0, "/other"), (1, "/other"), (2, "/other")]);
}
