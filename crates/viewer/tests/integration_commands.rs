//! Integration tests for the JSON command protocol.

use cad_viewer_lib::command::{execute_json, execute_json_batch};
use cad_viewer_lib::fixtures::*;
use cad_viewer_lib::harness::ViewerHarness;

#[test]
fn test_full_session() {
    let mut h = ViewerHarness::new();
    let payload = payload_json(&assembly("/asm"));
    let batch = format!(
        r#"[
            {{"command": "load", "payload": {payload}}},
            {{"command": "set_clipping", "flag": true}},
            {{"command": "set_clip_distance", "axis": 2, "distance": 0.1}},
            {{"command": "select", "path": "/asm/cube"}},
            {{"command": "hover", "path": "/asm/edges"}},
            {{"command": "set_black_edges", "flag": true}},
            {{"command": "inspect"}}
        ]"#
    );
    let resps = execute_json_batch(&mut h, &batch).unwrap();
    assert!(resps.iter().all(|r| r.success), "{resps:?}");

    let data = resps[6].data.as_ref().unwrap();
    assert_eq!(data["unit_count"], 4);
    assert_eq!(data["session_transparent"], false);
    assert_eq!(resps[3].data.as_ref().unwrap()["selected"][0], "/asm/cube");
    assert_eq!(h.frame().unwrap().stencil_pairs().len(), 3);
}

#[test]
fn test_opacity_then_transparent() {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    execute_json(&mut h, r#"{"command": "set_opacity", "path": "/cube", "opacity": 0.25}"#).unwrap();
    let resp = execute_json(&mut h, r#"{"command": "set_transparent", "path": "/cube", "flag": true}"#).unwrap();
    assert_eq!(resp.data.unwrap()["touched"], 1);
    assert_eq!(h.unit("/cube").unwrap().effective_alpha(), 0.25);
    assert!(h.graph.session_transparent());
}

#[test]
fn test_unknown_path_touches_nothing() {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    let resp = execute_json(&mut h, r#"{"command": "set_state", "path": "/nope", "state": [0, 0]}"#).unwrap();
    assert!(resp.success);
    assert_eq!(resp.data.unwrap()["touched"], 0);
}

#[test]
fn test_dispose_command_is_repeatable() {
    let mut h = ViewerHarness::new();
    h.load(&unit_cube("/cube", "#e8b024")).unwrap();
    let resps = execute_json_batch(&mut h, r#"[{"command": "dispose"}, {"command": "dispose"}]"#).unwrap();
    assert!(resps.iter().all(|r| r.success));
    assert_eq!(h.unit_count(), 0);
}
