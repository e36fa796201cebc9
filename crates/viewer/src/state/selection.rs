use shared::NodePath;

use crate::build::SceneGraph;
use crate::viewport::render_unit::UnitOp;

/// Selected and hovered units (supports multi-select)
#[derive(Default, Debug)]
pub struct SelectionState {
    /// Selected unit paths (in order of selection)
    selected: Vec<NodePath>,
    hovered: Option<NodePath>,
}

impl SelectionState {
    /// Primary (first) selected unit
    pub fn primary(&self) -> Option<&NodePath> {
        self.selected.first()
    }

    pub fn all(&self) -> &[NodePath] {
        &self.selected
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.iter().any(|p| p == path)
    }

    pub fn hovered(&self) -> Option<&NodePath> {
        self.hovered.as_ref()
    }

    /// Replace the selection with a single path
    pub fn select(&mut self, graph: &mut SceneGraph, path: &str) {
        self.clear(graph);
        self.add(graph, path);
    }

    /// Add a path to the selection (no-op if already selected)
    pub fn add(&mut self, graph: &mut SceneGraph, path: &str) {
        if self.is_selected(path) {
            return;
        }
        if graph.apply(path, &UnitOp::SetSelected(true)) > 0 {
            self.selected.push(path.to_string());
        }
    }

    /// Toggle a path in or out of the selection
    pub fn toggle(&mut self, graph: &mut SceneGraph, path: &str) {
        if let Some(pos) = self.selected.iter().position(|p| p == path) {
            self.selected.remove(pos);
            graph.apply(path, &UnitOp::SetSelected(false));
        } else {
            self.add(graph, path);
        }
    }

    pub fn clear(&mut self, graph: &mut SceneGraph) {
        for path in self.selected.drain(..) {
            graph.apply(&path, &UnitOp::SetSelected(false));
        }
    }

    /// Move the hover highlight to `path`
    pub fn hover(&mut self, graph: &mut SceneGraph, path: Option<&str>) {
        if self.hovered.as_deref() == path {
            return;
        }
        if let Some(old) = self.hovered.take() {
            graph.apply(&old, &UnitOp::Highlight(false));
        }
        if let Some(p) = path {
            graph.apply(p, &UnitOp::Highlight(true));
            self.hovered = Some(p.to_string());
        }
    }

    /// Forget everything without touching a graph (after dispose)
    pub fn reset(&mut self) {
        self.selected.clear();
        self.hovered = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SceneGraphBuilder;
    use crate::fixtures;
    use crate::state::settings::RenderOptions;
    use crate::viewport::render_unit::{Role, HOVER_COLOR, SELECTED_COLOR};
    use shared::ShapeNode;

    fn graph() -> SceneGraph {
        let tree = ShapeNode::group(
            "root",
            "/root",
            vec![
                fixtures::unit_cube("/root/a", "#ff0000"),
                fixtures::unit_cube("/root/b", "#00ff00"),
            ],
        );
        SceneGraphBuilder::new(RenderOptions::default()).build(&tree).unwrap()
    }

    fn front_color(graph: &SceneGraph, path: &str) -> u32 {
        graph.unit(path).unwrap().submesh(Role::Front).unwrap().material.color.0
    }

    #[test]
    fn test_select_replaces() {
        let mut g = graph();
        let mut sel = SelectionState::default();
        sel.select(&mut g, "/root/a");
        sel.select(&mut g, "/root/b");
        assert_eq!(sel.all(), ["/root/b".to_string()]);
        assert_eq!(front_color(&g, "/root/a"), 0xff0000);
        assert_eq!(front_color(&g, "/root/b"), SELECTED_COLOR.0);
    }

    #[test]
    fn test_toggle_and_unknown_path() {
        let mut g = graph();
        let mut sel = SelectionState::default();
        sel.toggle(&mut g, "/root/a");
        sel.toggle(&mut g, "/root/missing");
        assert_eq!(sel.all().len(), 1);
        sel.toggle(&mut g, "/root/a");
        assert!(sel.all().is_empty());
        assert_eq!(front_color(&g, "/root/a"), 0xff0000);
    }

    #[test]
    fn test_hover_moves() {
        let mut g = graph();
        let mut sel = SelectionState::default();
        sel.hover(&mut g, Some("/root/a"));
        assert_eq!(front_color(&g, "/root/a"), HOVER_COLOR.0);
        sel.hover(&mut g, Some("/root/b"));
        assert_eq!(front_color(&g, "/root/a"), 0xff0000);
        sel.hover(&mut g, None);
        assert_eq!(front_color(&g, "/root/b"), 0x00ff00);
        assert!(sel.hovered().is_none());
    }
}
