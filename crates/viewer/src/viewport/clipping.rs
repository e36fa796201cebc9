//! Three axis-aligned clip planes and stencil-buffer section caps.
//!
//! For every (axis, solid unit) pair the unit gets a triple of extra
//! sub-meshes: its back faces incrementing the stencil, its front faces
//! decrementing it, and a plane-sized cap that paints where the count is
//! non-zero. The triple is created once, lazily, and owned by the unit.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3, Vec4};
use shared::NodePath;

use super::material::{ClipBinding, Color, Material, Side, StencilOp, StencilState};
use super::mesh::{plane, Geometry};
use super::render_unit::{ClipMeshes, Role, SubMesh};
use crate::build::SceneGraph;
use crate::error::{Result, ViewerError};
use crate::state::settings::CapTheme;

/// Plane normals per axis. A plane keeps the half-space it points into.
pub const PLANE_NORMALS: [Vec3; 3] = [Vec3::NEG_X, Vec3::NEG_Y, Vec3::NEG_Z];

/// `normal · p + constant = 0`; points with a negative distance are clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub constant: f32,
}

impl ClipPlane {
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.constant
    }

    pub fn negated(&self) -> ClipPlane {
        ClipPlane {
            normal: -self.normal,
            constant: -self.constant,
        }
    }

    /// Project `p` onto the plane.
    pub fn project(&self, p: Vec3) -> Vec3 {
        p - self.normal * self.distance_to(p)
    }

    pub fn as_vec4(&self) -> Vec4 {
        self.normal.extend(self.constant)
    }
}

/// Composite key of one cap: clip axis plus the capped unit's path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapKey {
    pub axis: usize,
    pub path: NodePath,
}

/// Outcome of [`ClippingSystem::attach`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CapReport {
    /// Triples created by this call
    pub attached: usize,
    /// Triples that already existed
    pub existing: usize,
    /// Solids whose cap could not be built, with the reason
    pub skipped: Vec<(NodePath, String)>,
}

#[derive(Debug)]
pub struct ClippingSystem {
    center: Vec3,
    size: f32,
    distances: [f32; 3],
    planes: Option<[ClipPlane; 3]>,
    theme: CapTheme,
    object_color_caps: bool,
    object_colors: HashMap<CapKey, Color>,
}

impl Default for ClippingSystem {
    fn default() -> Self {
        Self::new(CapTheme::default())
    }
}

impl ClippingSystem {
    /// No planes exist until [`create_planes`](Self::create_planes).
    pub fn new(theme: CapTheme) -> Self {
        Self {
            center: Vec3::ZERO,
            size: 0.0,
            distances: [0.0; 3],
            planes: None,
            theme,
            object_color_caps: false,
            object_colors: HashMap::new(),
        }
    }

    /// Create the three planes around the session center. `size` is the
    /// model's largest extent; planes start at the model boundary.
    pub fn create_planes(&mut self, center: Vec3, size: f32) {
        self.center = center;
        self.size = size;
        self.distances = [size * 0.5; 3];
        let planes = PLANE_NORMALS.map(|normal| ClipPlane { normal, constant: 0.0 });
        self.planes = Some(planes);
        for axis in 0..3 {
            self.set_constant(axis, self.distances[axis]);
        }
    }

    pub fn has_planes(&self) -> bool {
        self.planes.is_some()
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Slider range is `[-size / 2, size / 2]`
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn distance(&self, axis: usize) -> f32 {
        self.distances.get(axis).copied().unwrap_or(0.0)
    }

    /// Move plane `axis` to a signed distance from the session center.
    /// Does nothing before the planes exist.
    pub fn set_constant(&mut self, axis: usize, distance: f32) {
        let center = self.center;
        let Some(plane) = self.planes.as_mut().and_then(|p| p.get_mut(axis)) else {
            return;
        };
        plane.constant = distance - plane.normal.dot(center);
        self.distances[axis] = distance;
    }

    pub fn planes(&self) -> Option<&[ClipPlane; 3]> {
        self.planes.as_ref()
    }

    /// Complementary half-spaces, always in sync with [`planes`](Self::planes)
    pub fn reverse_planes(&self) -> Option<[ClipPlane; 3]> {
        self.planes.map(|p| p.map(|plane| plane.negated()))
    }

    pub fn theme(&self) -> CapTheme {
        self.theme
    }

    pub fn object_color_caps(&self) -> bool {
        self.object_color_caps
    }

    fn cap_color(&self, key: &CapKey) -> Color {
        if self.object_color_caps {
            if let Some(c) = self.object_colors.get(key) {
                return *c;
            }
        }
        self.theme.cap_colors()[key.axis]
    }

    /// Create the missing stencil/cap triples for every solid in `graph`.
    /// Fails only when the planes don't exist yet; a solid whose cap can't
    /// be built is logged and skipped.
    pub fn attach(&mut self, graph: &mut SceneGraph) -> Result<CapReport> {
        if self.planes.is_none() {
            return Err(ViewerError::StencilOrdering);
        }
        let mut report = CapReport::default();
        let cap_geometry = Geometry::Triangles(Arc::new(plane(self.size.max(f32::EPSILON) * 2.0)));

        for axis in 0..3 {
            for unit in graph.units_mut() {
                if !unit.is_solid() {
                    continue;
                }
                if unit.clip_meshes(axis).is_some() {
                    report.existing += 1;
                    continue;
                }
                let key = CapKey { axis, path: unit.path().to_string() };
                let Some(front) = unit.submesh(Role::Front) else {
                    tracing::warn!("Skipping cap for '{}' on axis {axis}: no front mesh", key.path);
                    report.skipped.push((key.path, "no front mesh".to_string()));
                    continue;
                };
                let Geometry::Triangles(_) = &front.geometry else {
                    tracing::warn!("Skipping cap for '{}' on axis {axis}: front is not a surface", key.path);
                    report.skipped.push((key.path, "front mesh is not a surface".to_string()));
                    continue;
                };
                let geometry = front.geometry.clone();
                let original = front.original().color;

                let own_plane = ClipBinding::Planes(vec![axis]);
                let back_stencil = SubMesh::new(
                    geometry.clone(),
                    Material {
                        clipping: own_plane.clone(),
                        ..Material::stencil_only(Side::Back, StencilOp::IncrementWrap)
                    },
                );
                let front_stencil = SubMesh::new(
                    geometry,
                    Material {
                        clipping: own_plane,
                        ..Material::stencil_only(Side::Front, StencilOp::DecrementWrap)
                    },
                );

                self.object_colors.insert(key.clone(), original);
                let cap = SubMesh::new(
                    cap_geometry.clone(),
                    Material {
                        stencil: Some(StencilState::not_zero_then_reset()),
                        clipping: ClipBinding::Planes(other_axes(axis).to_vec()),
                        polygon_offset: None,
                        ..Material::surface(self.cap_color(&key), Side::Double)
                    },
                );
                unit.set_clip_meshes(axis, ClipMeshes { back_stencil, front_stencil, cap });
                tracing::debug!("Attached cap for '{}' on axis {axis}", key.path);
                report.attached += 1;
            }
        }

        if !report.skipped.is_empty() {
            tracing::warn!("{} solid caps skipped", report.skipped.len());
        }
        Ok(report)
    }

    /// Switch caps between the axis theme color and the capped solid's color.
    pub fn set_object_color_caps(&mut self, graph: &mut SceneGraph, flag: bool) {
        self.object_color_caps = flag;
        self.recolor(graph);
    }

    pub fn set_theme(&mut self, graph: &mut SceneGraph, theme: CapTheme) {
        self.theme = theme;
        self.recolor(graph);
    }

    fn recolor(&self, graph: &mut SceneGraph) {
        for key in self.object_colors.keys() {
            let color = self.cap_color(key);
            if let Some(meshes) = graph.unit_mut(&key.path).and_then(|u| u.clip_meshes_mut(key.axis)) {
                meshes.cap.material.color = color;
            }
        }
    }

    /// Cap color of one (axis, solid) pair, `None` before it is attached.
    pub fn cap_color_of(&self, graph: &SceneGraph, axis: usize, path: &str) -> Option<Color> {
        graph
            .unit(path)
            .and_then(|u| u.clip_meshes(axis))
            .map(|m| m.cap.material.color)
    }

    /// World transform placing the +Z facing cap quad onto plane `axis`,
    /// centered on the session center's projection.
    pub fn cap_transform(&self, axis: usize) -> Option<Affine3A> {
        let plane = self.planes.as_ref()?.get(axis)?;
        let rotation = Quat::from_rotation_arc(Vec3::Z, plane.normal);
        Some(Affine3A::from_rotation_translation(rotation, plane.project(self.center)))
    }

    /// Forget cached cap colors (after the graph was disposed)
    pub fn reset(&mut self) {
        self.object_colors.clear();
        self.planes = None;
    }
}

/// The two axes other than `axis`, used to clip its cap.
pub fn other_axes(axis: usize) -> [usize; 2] {
    match axis {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    }
}
