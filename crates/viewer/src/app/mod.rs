//! Main application module

mod panels;

use eframe::egui;
use shared::ShapeNode;

use crate::harness::ViewerHarness;
use crate::state::settings::ViewerSettings;
use crate::viewport::ViewportPanel;

/// Main application
pub struct ViewerApp {
    settings: ViewerSettings,
    harness: ViewerHarness,
    viewport: ViewportPanel,
    /// Tree of the loaded model, kept for rebuilds (explode toggle)
    tree: Option<ShapeNode>,
    /// Bumped on every rebuild so the renderer drops stale GPU buffers
    generation: u64,
    /// Last load error, shown in the status bar
    status: Option<String>,
    show_clipping_panel: bool,
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, initial: Option<ShapeNode>, explode: bool) -> Self {
        let mut settings = ViewerSettings::load();
        if explode {
            settings.render.exploded = true;
        }

        let mut viewport = ViewportPanel::new();
        if let Some(gl) = cc.gl.as_ref() {
            viewport.init_gl(gl);
        }

        let show_clipping_panel = settings.viewport.show_clipping_panel;
        let mut app = Self {
            harness: ViewerHarness::with_options(settings.render.clone()),
            settings,
            viewport,
            tree: None,
            generation: 0,
            status: None,
            show_clipping_panel,
        };
        if let Some(tree) = initial {
            app.load(tree);
        }
        app
    }

    /// Build `tree` into the harness; on failure the previous model stays.
    fn load(&mut self, tree: ShapeNode) {
        self.harness.options = self.settings.render.clone();
        match self.harness.load(&tree) {
            Ok(()) => {
                self.generation += 1;
                self.viewport.frame_scene(&self.harness);
                self.status = None;
                self.tree = Some(tree);
            }
            Err(e) => {
                tracing::error!("Failed to load model: {e}");
                self.status = Some(e.to_string());
            }
        }
    }

    /// Rebuild the current tree with the current options
    fn rebuild(&mut self) {
        if let Some(tree) = self.tree.clone() {
            self.load(tree);
        }
    }

    fn open_file(&mut self) {
        let Some(path) = rfd::FileDialog::new().add_filter("Shape tree", &["json"]).pick_file() else {
            return;
        };
        match crate::harness::read_model(&path) {
            Ok(tree) => self.load(tree),
            Err(e) => {
                tracing::error!("Failed to open model: {e}");
                self.status = Some(e.to_string());
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open…").clicked() {
                        ui.close_menu();
                        self.open_file();
                    }
                    if ui.add_enabled(self.tree.is_some(), egui::Button::new("Close")).clicked() {
                        ui.close_menu();
                        self.harness.dispose();
                        self.tree = None;
                        self.generation += 1;
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Frame all").clicked() {
                        ui.close_menu();
                        self.viewport.frame_scene(&self.harness);
                    }
                    ui.checkbox(&mut self.show_clipping_panel, "Side panel");
                });
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("{} objects", self.harness.unit_count()));
                if let Some(path) = self.harness.selection.primary() {
                    ui.separator();
                    ui.label(path);
                }
                if let Some(err) = &self.status {
                    ui.separator();
                    ui.colored_label(egui::Color32::from_rgb(230, 90, 90), err);
                }
            });
        });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.menu_bar(ctx);
        self.status_bar(ctx);

        if self.show_clipping_panel {
            let action = egui::SidePanel::right("display_panel")
                .resizable(true)
                .default_width(240.0)
                .show(ctx, |ui| panels::display_panel(ui, &mut self.settings.render, &mut self.harness))
                .inner;
            if action.rebuild {
                self.rebuild();
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(
                    ui,
                    &mut self.harness,
                    self.settings.viewport.background_color,
                    self.generation,
                );
            });
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        self.settings.viewport.show_clipping_panel = self.show_clipping_panel;
        self.settings.save();
        self.harness.dispose();
        if let Some(gl) = gl {
            self.viewport.destroy_gl(gl);
        }
    }
}
