//! Headless harness: owns a scene graph, its clipping system and selection
//! without any window or GL context. Drives integration tests and the JSON
//! command protocol.

use std::path::Path;

use shared::ShapeNode;

use crate::build::{SceneGraph, SceneGraphBuilder};
use crate::error::{Result, ViewerError};
use crate::state::selection::SelectionState;
use crate::state::settings::RenderOptions;
use crate::validation::GeometryValidator;
use crate::viewport::clipping::{CapReport, ClippingSystem};
use crate::viewport::frame::{plan_frame, FramePlan};
use crate::viewport::material::ClipBinding;
use crate::viewport::mesh::Geometry;
use crate::viewport::render_unit::{RenderUnit, Role, UnitOp};

/// Headless viewer state
pub struct ViewerHarness {
    pub options: RenderOptions,
    pub graph: SceneGraph,
    pub clipping: ClippingSystem,
    pub selection: SelectionState,
    clipping_enabled: bool,
    last_caps: CapReport,
}

impl Default for ViewerHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerHarness {
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    pub fn with_options(options: RenderOptions) -> Self {
        let clipping = ClippingSystem::new(options.cap_theme);
        Self {
            options,
            graph: SceneGraph::default(),
            clipping,
            selection: SelectionState::default(),
            clipping_enabled: false,
            last_caps: CapReport::default(),
        }
    }

    // ── Loading ───────────────────────────────────────────────

    /// Build `tree` (replacing the current graph), create the clip planes
    /// around its bounds and attach caps.
    pub fn load(&mut self, tree: &ShapeNode) -> Result<()> {
        let graph = SceneGraphBuilder::new(self.options.clone()).build(tree)?;
        self.dispose();
        self.graph = graph;

        let (center, size) = self
            .graph
            .bounding_box()
            .map_or((glam::Vec3::ZERO, 1.0), |b| (b.center(), b.max_extent()));
        self.clipping = ClippingSystem::new(self.options.cap_theme);
        self.clipping.create_planes(center, size);
        self.last_caps = self.clipping.attach(&mut self.graph)?;
        if self.options.object_color_caps {
            self.clipping.set_object_color_caps(&mut self.graph, true);
        }
        if self.clipping_enabled {
            self.graph.set_clip_planes(ClipBinding::Planes(vec![0, 1, 2]));
        }
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let tree = ShapeNode::from_json(json)?;
        self.load(&tree)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let tree = read_model(path)?;
        self.load(&tree)
    }

    pub fn last_caps(&self) -> &CapReport {
        &self.last_caps
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn unit(&self, path: &str) -> Option<&RenderUnit> {
        self.graph.unit(path)
    }

    pub fn unit_count(&self) -> usize {
        self.graph.units().count()
    }

    pub fn unit_paths(&self) -> Vec<String> {
        self.graph.units().map(|u| u.path().to_string()).collect()
    }

    pub fn is_clipping_enabled(&self) -> bool {
        self.clipping_enabled
    }

    /// Validate every surface geometry; returns `(path, message)` pairs.
    pub fn validate_all(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        for unit in self.graph.units() {
            if let Some(Geometry::Triangles(mesh)) = unit.submesh(Role::Front).map(|m| &m.geometry) {
                for e in GeometryValidator::new(mesh).validate_all() {
                    errors.push((unit.path().to_string(), e));
                }
            }
        }
        errors
    }

    // ── Mutation ──────────────────────────────────────────────

    pub fn apply(&mut self, path: &str, op: UnitOp) -> usize {
        self.graph.apply(path, &op)
    }

    pub fn select(&mut self, path: &str) {
        self.selection.select(&mut self.graph, path);
    }

    pub fn hover(&mut self, path: Option<&str>) {
        self.selection.hover(&mut self.graph, path);
    }

    /// Bind or unbind all three clip planes on every unit
    pub fn set_clipping(&mut self, flag: bool) {
        self.clipping_enabled = flag;
        let binding = if flag {
            ClipBinding::Planes(vec![0, 1, 2])
        } else {
            ClipBinding::None
        };
        self.graph.set_clip_planes(binding);
    }

    pub fn set_clip_distance(&mut self, axis: usize, distance: f32) {
        self.clipping.set_constant(axis, distance);
    }

    pub fn set_clip_intersection(&mut self, flag: bool) {
        self.options.clip_intersection = flag;
        self.graph.set_clip_intersection(flag);
    }

    pub fn set_object_color_caps(&mut self, flag: bool) {
        self.options.object_color_caps = flag;
        self.clipping.set_object_color_caps(&mut self.graph, flag);
    }

    pub fn frame(&self) -> Result<FramePlan> {
        plan_frame(&self.graph, &self.clipping)
    }

    /// Release the graph; safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.graph.dispose();
        self.clipping.reset();
        self.selection.reset();
        self.last_caps = CapReport::default();
    }
}

/// Read and parse a shape tree JSON file.
pub fn read_model(path: &Path) -> Result<ShapeNode> {
    let json = std::fs::read_to_string(path).map_err(|source| ViewerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let tree = ShapeNode::from_json(&json)?;
    tracing::info!("Read model {} ({} leaves)", path.display(), tree.leaf_count());
    Ok(tree)
}
