//! 3D viewport panel with OpenGL rendering

mod camera;
mod gl_renderer;
pub use cad_viewer_lib::viewport::{frame, material, mesh, picking, render_unit};

use std::sync::{Arc, Mutex};

use egui::Ui;

use crate::harness::ViewerHarness;
use camera::ArcBallCamera;
use gl_renderer::GlRenderer;
use picking::pick_nearest;

/// 3D viewport panel with OpenGL rendering
pub struct ViewportPanel {
    camera: ArcBallCamera,
    gl_renderer: Option<Arc<Mutex<GlRenderer>>>,
}

impl ViewportPanel {
    pub fn new() -> Self {
        Self {
            camera: ArcBallCamera::new(),
            gl_renderer: None,
        }
    }

    /// Initialize GL renderer (must be called with a GL context)
    pub fn init_gl(&mut self, gl: &glow::Context) {
        match GlRenderer::new(gl) {
            Some(renderer) => self.gl_renderer = Some(Arc::new(Mutex::new(renderer))),
            None => tracing::error!("GL renderer unavailable; viewport will stay empty"),
        }
    }

    pub fn destroy_gl(&mut self, gl: &glow::Context) {
        if let Some(renderer) = self.gl_renderer.take() {
            if let Ok(mut r) = renderer.lock() {
                r.destroy(gl);
            }
        }
    }

    /// Point the camera at the whole scene
    pub fn frame_scene(&mut self, harness: &ViewerHarness) {
        self.camera = ArcBallCamera::new();
        if let Some(sphere) = harness.graph.bounding_sphere() {
            self.camera.frame_sphere(sphere);
        }
    }

    pub fn show(&mut self, ui: &mut Ui, harness: &mut ViewerHarness, bg_color: [u8; 3], generation: u64) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

        // ── Camera controls ─────────────────────────────
        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            self.camera.rotate(-delta.x * 0.5, delta.y * 0.5);
        }
        if response.dragged_by(egui::PointerButton::Middle) || response.dragged_by(egui::PointerButton::Secondary) {
            let delta = response.drag_delta();
            self.camera.pan(-delta.x * 0.01, delta.y * 0.01);
        }
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if response.hovered() && scroll.abs() > 0.1 {
            self.camera.zoom(scroll * 0.01);
        }

        // ── Hover and selection ─────────────────────────────
        self.handle_picking(&response, ui, rect, harness);

        if !ui.is_rect_visible(rect) {
            return;
        }
        self.render_gl(ui, rect, harness, bg_color, generation);
    }

    fn handle_picking(&self, response: &egui::Response, ui: &Ui, rect: egui::Rect, harness: &mut ViewerHarness) {
        let hovered = response
            .hover_pos()
            .and_then(|pos| pick_nearest(&self.camera.screen_ray(pos, rect), &harness.graph));
        if harness.selection.hovered().map(String::as_str) != hovered.as_deref() {
            harness.hover(hovered.as_deref());
        }

        if response.clicked() {
            let shift = ui.input(|i| i.modifiers.shift);
            match hovered {
                Some(path) if shift => harness.selection.toggle(&mut harness.graph, &path),
                Some(path) => harness.select(&path),
                None if !shift => harness.selection.clear(&mut harness.graph),
                None => {}
            }
        }
    }

    fn render_gl(&self, ui: &mut Ui, rect: egui::Rect, harness: &ViewerHarness, bg_color: [u8; 3], generation: u64) {
        let Some(gl_renderer) = &self.gl_renderer else {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "OpenGL is not available",
                egui::FontId::proportional(14.0),
                egui::Color32::GRAY,
            );
            return;
        };

        let plan = match harness.frame() {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Skipping frame: {e}");
                return;
            }
        };

        let renderer_clone = gl_renderer.clone();
        let camera = self.camera.clone();

        let callback = egui::PaintCallback {
            rect,
            callback: Arc::new(eframe::egui_glow::CallbackFn::new(move |info, painter| {
                let gl = painter.gl();
                let clip = info.clip_rect_in_pixels();
                let params = gl_renderer::RenderParams {
                    viewport: [
                        clip.left_px as f32,
                        clip.from_bottom_px as f32,
                        clip.width_px as f32,
                        clip.height_px as f32,
                    ],
                    bg_color,
                    generation,
                };
                if let Ok(mut r) = renderer_clone.lock() {
                    r.paint(gl, &camera, &params, &plan);
                }
            })),
        };
        ui.painter().add(callback);
    }
}
