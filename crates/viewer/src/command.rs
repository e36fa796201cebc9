//! JSON command protocol for driving a headless viewer.

use serde::{Deserialize, Serialize};
use shared::{ShapeNode, Visibility};

use crate::harness::ViewerHarness;
use crate::viewport::render_unit::UnitOp;

/// A command against the viewer state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewerCommand {
    /// Build a payload, replacing the current graph
    Load { payload: ShapeNode },
    /// Set the `[face, edge]` visibility of a subtree
    SetState { path: String, state: [u8; 2] },
    Select { path: String },
    ClearSelection,
    Hover {
        #[serde(default)]
        path: Option<String>,
    },
    SetTransparent { path: String, flag: bool },
    SetOpacity { path: String, opacity: f32 },
    SetBlackEdges { flag: bool },
    SetClipping { flag: bool },
    SetClipDistance { axis: usize, distance: f32 },
    SetClipIntersection { flag: bool },
    SetObjectColorCaps { flag: bool },
    /// List units with their visibility and colors
    Inspect,
    Dispose,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

fn visibility(value: u8) -> Result<Visibility, String> {
    Visibility::try_from(value).map_err(|e| e.to_string())
}

/// Execute a single command on the harness.
pub fn execute_command(harness: &mut ViewerHarness, cmd: ViewerCommand) -> CommandResponse {
    match cmd {
        ViewerCommand::Load { payload } => match harness.load(&payload) {
            Ok(()) => CommandResponse::ok_with_data(serde_json::json!({
                "units": harness.unit_count(),
                "caps": harness.last_caps().attached,
            })),
            Err(e) => CommandResponse::err(e.to_string()),
        },

        ViewerCommand::SetState { path, state } => {
            let (faces, edges) = match (visibility(state[0]), visibility(state[1])) {
                (Ok(f), Ok(e)) => (f, e),
                (Err(e), _) | (_, Err(e)) => return CommandResponse::err(e),
            };
            let touched = harness.graph.set_state(&path, faces, edges);
            CommandResponse::ok_with_data(serde_json::json!({ "touched": touched }))
        }

        ViewerCommand::Select { path } => {
            harness.select(&path);
            CommandResponse::ok_with_data(serde_json::json!({ "selected": harness.selection.all() }))
        }

        ViewerCommand::ClearSelection => {
            harness.selection.clear(&mut harness.graph);
            CommandResponse::ok()
        }

        ViewerCommand::Hover { path } => {
            harness.hover(path.as_deref());
            CommandResponse::ok()
        }

        ViewerCommand::SetTransparent { path, flag } => {
            let touched = harness.apply(&path, UnitOp::SetTransparent(flag));
            CommandResponse::ok_with_data(serde_json::json!({ "touched": touched }))
        }

        ViewerCommand::SetOpacity { path, opacity } => {
            let touched = harness.apply(&path, UnitOp::SetOpacity(opacity));
            CommandResponse::ok_with_data(serde_json::json!({ "touched": touched }))
        }

        ViewerCommand::SetBlackEdges { flag } => {
            harness.graph.apply_all(&UnitOp::SetBlackEdges(flag));
            CommandResponse::ok()
        }

        ViewerCommand::SetClipping { flag } => {
            harness.set_clipping(flag);
            CommandResponse::ok()
        }

        ViewerCommand::SetClipDistance { axis, distance } => {
            if axis > 2 {
                tracing::warn!("Ignoring clip distance for axis {axis}");
                return CommandResponse::err(format!("axis {axis} out of range"));
            }
            harness.set_clip_distance(axis, distance);
            CommandResponse::ok()
        }

        ViewerCommand::SetClipIntersection { flag } => {
            harness.set_clip_intersection(flag);
            CommandResponse::ok()
        }

        ViewerCommand::SetObjectColorCaps { flag } => {
            harness.set_object_color_caps(flag);
            CommandResponse::ok()
        }

        ViewerCommand::Inspect => {
            let units: Vec<serde_json::Value> = harness
                .graph
                .units()
                .map(|unit| {
                    let meshes: Vec<serde_json::Value> = unit
                        .submeshes()
                        .map(|(role, m)| {
                            serde_json::json!({
                                "role": format!("{role:?}"),
                                "visible": m.visible,
                                "color": m.material.color.to_hex(),
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "path": unit.path(),
                        "type": unit.kind().as_str(),
                        "solid": unit.is_solid(),
                        "meshes": meshes,
                    })
                })
                .collect();
            CommandResponse::ok_with_data(serde_json::json!({
                "unit_count": units.len(),
                "units": units,
                "session_transparent": harness.graph.session_transparent(),
            }))
        }

        ViewerCommand::Dispose => {
            harness.dispose();
            CommandResponse::ok()
        }
    }
}

/// Parse and execute a single JSON command string.
pub fn execute_json(harness: &mut ViewerHarness, json: &str) -> Result<CommandResponse, String> {
    let cmd: ViewerCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(harness, cmd))
}

/// Parse and execute multiple JSON commands (array).
pub fn execute_json_batch(
    harness: &mut ViewerHarness,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<ViewerCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds
        .into_iter()
        .map(|cmd| execute_command(harness, cmd))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn loaded() -> ViewerHarness {
        let mut h = ViewerHarness::new();
        h.load(&fixtures::unit_cube("/cube", "#e8b024")).unwrap();
        h
    }

    #[test]
    fn test_command_serde_set_state() {
        let json = r#"{"command": "set_state", "path": "/a", "state": [0, 1]}"#;
        let cmd: ViewerCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ViewerCommand::SetState { path, state } => {
                assert_eq!(path, "/a");
                assert_eq!(state, [0, 1]);
            }
            _ => panic!("Expected SetState"),
        }
    }

    #[test]
    fn test_execute_load_payload() {
        let mut h = ViewerHarness::new();
        let payload = fixtures::payload_json(&fixtures::assembly("/asm"));
        let json = format!(r#"{{"command": "load", "payload": {payload}}}"#);
        let resp = execute_json(&mut h, &json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["units"], 4);
    }

    #[test]
    fn test_execute_load_bad_payload_reports_path() {
        let mut h = ViewerHarness::new();
        let json = r#"{"command": "load", "payload": {"name": "x", "id": "/x", "type": "nurbs", "shape": {}}}"#;
        let resp = execute_json(&mut h, json).unwrap();
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("/x"));
    }

    #[test]
    fn test_execute_set_state_and_inspect() {
        let mut h = loaded();
        let resp = execute_json(&mut h, r#"{"command": "set_state", "path": "/cube", "state": [0, 1]}"#).unwrap();
        assert_eq!(resp.data.unwrap()["touched"], 1);

        let resp = execute_json(&mut h, r#"{"command": "inspect"}"#).unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data["unit_count"], 1);
        assert_eq!(data["units"][0]["meshes"][0]["visible"], false);

        let resp = execute_json(&mut h, r#"{"command": "set_state", "path": "/cube", "state": [9, 1]}"#).unwrap();
        assert!(!resp.success);
    }

    #[test]
    fn test_execute_batch_caps() {
        let mut h = loaded();
        let batch = r#"[
            {"command": "set_clipping", "flag": true},
            {"command": "set_clip_distance", "axis": 0, "distance": 0.0},
            {"command": "set_object_color_caps", "flag": true},
            {"command": "set_clip_distance", "axis": 5, "distance": 0.0}
        ]"#;
        let resps = execute_json_batch(&mut h, batch).unwrap();
        assert!(resps[..3].iter().all(|r| r.success));
        assert!(!resps[3].success);
        let color = h.clipping.cap_color_of(&h.graph, 0, "/cube").unwrap();
        assert_eq!(color.to_hex(), "#e8b024");
    }

    #[test]
    fn test_execute_invalid_json() {
        let mut h = ViewerHarness::new();
        assert!(execute_json(&mut h, "not valid json").is_err());
    }
}
