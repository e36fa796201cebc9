//! Side panels: object tree, display toggles and clipping controls.

use eframe::egui;
use shared::Visibility;

use crate::build::SceneNode;
use crate::harness::ViewerHarness;
use crate::state::settings::{CapTheme, RenderOptions};
use crate::viewport::render_unit::UnitOp;

/// What the app must do after the display panel ran
#[derive(Debug, Default)]
pub struct PanelAction {
    /// Options changed that only a fresh build can honor
    pub rebuild: bool,
}

/// Display toggles and the clipping section.
pub fn display_panel(ui: &mut egui::Ui, options: &mut RenderOptions, harness: &mut ViewerHarness) -> PanelAction {
    let mut action = PanelAction::default();

    ui.heading("Display");
    if ui.checkbox(&mut options.transparent, "Transparent").changed() {
        harness.graph.apply_all(&UnitOp::SetTransparent(options.transparent));
    }
    if ui.checkbox(&mut options.black_edges, "Black edges").changed() {
        harness.graph.apply_all(&UnitOp::SetBlackEdges(options.black_edges));
    }
    if ui.checkbox(&mut options.back_visible, "Back faces").changed() {
        harness.graph.apply_all(&UnitOp::SetBackVisible(options.back_visible));
    }
    if ui.checkbox(&mut options.exploded, "Explode faces and edges").changed() {
        action.rebuild = true;
    }
    ui.horizontal(|ui| {
        ui.label("Opacity");
        if ui
            .add(egui::Slider::new(&mut options.default_opacity, 0.0..=1.0))
            .changed()
        {
            harness.graph.apply_all(&UnitOp::SetOpacity(options.default_opacity));
        }
    });
    ui.horizontal(|ui| {
        ui.label("Metalness");
        if ui.add(egui::Slider::new(&mut options.metalness, 0.0..=1.0)).changed() {
            harness.graph.apply_all(&UnitOp::SetMetalness(options.metalness));
        }
    });
    ui.horizontal(|ui| {
        ui.label("Roughness");
        if ui.add(egui::Slider::new(&mut options.roughness, 0.0..=1.0)).changed() {
            harness.graph.apply_all(&UnitOp::SetRoughness(options.roughness));
        }
    });

    ui.separator();
    clipping_section(ui, options, harness);

    ui.separator();
    egui::ScrollArea::vertical().show(ui, |ui| tree_section(ui, harness));

    action
}

fn clipping_section(ui: &mut egui::Ui, options: &mut RenderOptions, harness: &mut ViewerHarness) {
    ui.heading("Clipping");

    let mut enabled = harness.is_clipping_enabled();
    if ui.checkbox(&mut enabled, "Enable clip planes").changed() {
        harness.set_clipping(enabled);
    }

    if !harness.clipping.has_planes() {
        ui.label("No model loaded");
        return;
    }

    let half = harness.clipping.size() * 0.5;
    for (axis, label) in ["X", "Y", "Z"].into_iter().enumerate() {
        let mut distance = harness.clipping.distance(axis);
        ui.horizontal(|ui| {
            ui.label(label);
            let slider = egui::Slider::new(&mut distance, -half..=half).fixed_decimals(3);
            if ui.add_enabled(enabled, slider).changed() {
                harness.set_clip_distance(axis, distance);
            }
        });
    }

    let mut intersection = options.clip_intersection;
    if ui.checkbox(&mut intersection, "Intersection").changed() {
        options.clip_intersection = intersection;
        harness.set_clip_intersection(intersection);
    }
    let mut object_caps = options.object_color_caps;
    if ui.checkbox(&mut object_caps, "Use object color for caps").changed() {
        options.object_color_caps = object_caps;
        harness.set_object_color_caps(object_caps);
    }

    let mut theme = options.cap_theme;
    egui::ComboBox::from_id_salt("cap_theme")
        .selected_text(theme.display_name())
        .show_ui(ui, |ui| {
            for t in CapTheme::all() {
                ui.selectable_value(&mut theme, *t, t.display_name());
            }
        });
    if theme != options.cap_theme {
        options.cap_theme = theme;
        harness.options.cap_theme = theme;
        harness.clipping.set_theme(&mut harness.graph, theme);
    }
}

/// Faces/edges shown for every unit below `path`
fn subtree_shown(harness: &ViewerHarness, path: &str) -> (bool, bool) {
    let units: Vec<_> = harness
        .graph
        .subtree_units(path)
        .iter()
        .filter_map(|p| harness.unit(p))
        .map(|u| (u.visibility.faces().is_shown(), u.visibility.edges().is_shown()))
        .collect();
    (units.iter().all(|s| s.0), units.iter().all(|s| s.1))
}

fn tree_section(ui: &mut egui::Ui, harness: &mut ViewerHarness) {
    ui.heading("Objects");
    let Some(root) = harness.graph.root().map(str::to_string) else {
        return;
    };
    tree_node(ui, harness, &root);
}

fn tree_node(ui: &mut egui::Ui, harness: &mut ViewerHarness, path: &str) {
    let (name, children) = match harness.graph.get(path) {
        Some(SceneNode::Group(g)) => (g.name.clone(), Some(g.children.clone())),
        Some(SceneNode::Unit(u)) => (u.name().to_string(), None),
        None => return,
    };

    let (mut faces, mut edges) = subtree_shown(harness, path);
    let mut row = |ui: &mut egui::Ui, harness: &mut ViewerHarness| {
        if ui.checkbox(&mut faces, "").on_hover_text("Faces").changed() {
            harness.graph.set_state(path, Visibility::from(faces), Visibility::NotApplicable);
        }
        if ui.checkbox(&mut edges, "").on_hover_text("Edges").changed() {
            harness.graph.set_state(path, Visibility::NotApplicable, Visibility::from(edges));
        }
        let selected = harness.selection.is_selected(path);
        if ui.selectable_label(selected, &name).clicked() {
            harness.select(path);
        }
    };

    match children {
        Some(children) => {
            egui::CollapsingHeader::new(name.clone())
                .id_salt(path)
                .default_open(true)
                .show(ui, |ui| {
                    ui.horizontal(|ui| row(ui, harness));
                    for child in &children {
                        tree_node(ui, harness, child);
                    }
                });
        }
        None => {
            ui.horizontal(|ui| row(ui, harness));
        }
    }
}
