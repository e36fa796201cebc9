//! Per-leaf render unit: role-keyed sub-meshes plus interaction state.
//!
//! A unit owns up to one front, back, edge, vertex and normals-helper
//! sub-mesh, and lazily one stencil/cap triple per clip axis. All state
//! changes go through [`RenderUnit::apply`] with a closed [`UnitOp`]; an op
//! that targets a sub-mesh the unit doesn't own does nothing.

use glam::Affine3A;
use shared::{NodePath, Shape, VisibilityState};

use super::material::{ClipBinding, Color, Material};
use super::mesh::Geometry;
use super::picking::Aabb;
use crate::error::{Result, ViewerError};

/// Accent color of a selected unit.
pub const SELECTED_COLOR: Color = Color(0x53a0e3);
/// Accent color of a hovered, unselected unit.
pub const HOVER_COLOR: Color = Color(0x89b9e8);
/// Line width multiplier while highlighted.
pub const HIGHLIGHT_LINE_FACTOR: f32 = 2.0;
/// Point size multiplier while highlighted.
pub const HIGHLIGHT_POINT_FACTOR: f32 = 1.5;

/// Leaf type tag from the payload's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Shapes,
    Edges,
    Vertices,
    Polygon,
}

impl LeafKind {
    /// Parse the wire tag. A leaf without a tag is a `shapes` leaf.
    pub fn from_tag(tag: Option<&str>, path: &str) -> Result<Self> {
        match tag {
            None | Some("shapes") => Ok(LeafKind::Shapes),
            Some("edges") => Ok(LeafKind::Edges),
            Some("vertices") => Ok(LeafKind::Vertices),
            Some("polygon") => Ok(LeafKind::Polygon),
            Some(other) => Err(ViewerError::UnsupportedLeafType {
                path: path.to_string(),
                tag: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeafKind::Shapes => "shapes",
            LeafKind::Edges => "edges",
            LeafKind::Vertices => "vertices",
            LeafKind::Polygon => "polygon",
        }
    }

    /// Tessellation fields a leaf of this kind can't be built without.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            LeafKind::Shapes => &["vertices", "normals", "triangles"],
            LeafKind::Edges => &["edges"],
            LeafKind::Vertices => &["obj_vertices"],
            LeafKind::Polygon => &[],
        }
    }

    /// Fail on the first required field `shape` lacks.
    pub fn check_required(self, shape: &Shape, path: &str) -> Result<()> {
        for &field in self.required_fields() {
            let present = match field {
                "vertices" => shape.vertices.is_some(),
                "normals" => shape.normals.is_some(),
                "triangles" => shape.triangles.is_some(),
                "edges" => shape.edges.is_some(),
                "obj_vertices" => shape.obj_vertices.is_some(),
                _ => true,
            };
            if !present {
                return Err(ViewerError::MissingGeometryData {
                    path: path.to_string(),
                    field,
                    kind: self.as_str(),
                });
            }
        }
        Ok(())
    }
}

/// Slot of a sub-mesh within its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Front,
    Back,
    Edges,
    Vertices,
    Normals,
}

/// Look of a sub-mesh before any highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginalLook {
    pub color: Color,
    pub line_width: f32,
    pub point_size: f32,
}

/// Geometry plus its material and visibility.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub geometry: Geometry,
    pub material: Material,
    pub visible: bool,
    original: OriginalLook,
}

impl SubMesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        let original = OriginalLook {
            color: material.color,
            line_width: material.line_width,
            point_size: material.point_size,
        };
        Self {
            geometry,
            material,
            visible: true,
            original,
        }
    }

    pub fn original(&self) -> OriginalLook {
        self.original
    }
}

/// Stencil writers and the cap for one clip axis.
#[derive(Debug, Clone)]
pub struct ClipMeshes {
    /// Back faces, increments the stencil.
    pub back_stencil: SubMesh,
    /// Front faces, decrements the stencil.
    pub front_stencil: SubMesh,
    /// Plane-shaped cap drawn where the stencil is non-zero.
    pub cap: SubMesh,
}

/// State change fanned out to render units.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOp {
    SetFacesVisible(bool),
    SetEdgesVisible(bool),
    SetBackVisible(bool),
    SetTransparent(bool),
    /// Opacity used while the unit is transparent.
    SetOpacity(f32),
    SetBlackEdges(bool),
    SetMetalness(f32),
    SetRoughness(f32),
    SetSelected(bool),
    Highlight(bool),
    SetClipPlanes(ClipBinding),
    SetClipIntersection(bool),
}

/// Interaction flags of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitState {
    pub faces_visible: bool,
    pub edges_visible: bool,
    pub back_visible: bool,
    pub selected: bool,
    pub highlighted: bool,
    pub transparent: bool,
    pub black_edges: bool,
}

/// Depth writes for a surface given its own alpha and the session-wide
/// transparency flag.
pub fn depth_write_policy(local_alpha: f32, session_transparent: bool) -> bool {
    local_alpha >= 1.0 && !session_transparent
}

/// Render unit for one leaf.
#[derive(Debug)]
pub struct RenderUnit {
    path: NodePath,
    name: String,
    kind: LeafKind,
    subtype: Option<String>,
    pub transform: Affine3A,
    pub visibility: VisibilityState,
    alpha: f32,
    opacity: f32,
    render_back: bool,
    front: Option<SubMesh>,
    back: Option<SubMesh>,
    edges: Option<SubMesh>,
    vertices: Option<SubMesh>,
    normals: Option<SubMesh>,
    clip: [Option<ClipMeshes>; 3],
    state: UnitState,
    pub texture: Option<serde_json::Value>,
    disposed: bool,
}

impl RenderUnit {
    pub fn new(
        path: impl Into<NodePath>,
        name: impl Into<String>,
        kind: LeafKind,
        subtype: Option<String>,
        visibility: VisibilityState,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind,
            subtype,
            transform: Affine3A::IDENTITY,
            visibility,
            alpha: 1.0,
            opacity: 1.0,
            render_back: false,
            front: None,
            back: None,
            edges: None,
            vertices: None,
            normals: None,
            clip: [None, None, None],
            state: UnitState {
                faces_visible: visibility.faces().is_shown(),
                edges_visible: visibility.edges().is_shown(),
                back_visible: false,
                selected: false,
                highlighted: false,
                transparent: false,
                black_edges: false,
            },
            texture: None,
            disposed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// A closed solid whose cross-sections can be capped.
    pub fn is_solid(&self) -> bool {
        self.kind == LeafKind::Shapes && self.subtype() == Some("solid")
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn render_back(&self) -> bool {
        self.render_back
    }

    pub(crate) fn set_surface_params(&mut self, alpha: f32, opacity: f32, render_back: bool) {
        self.alpha = alpha;
        self.opacity = opacity;
        self.render_back = render_back;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ── Sub-mesh slots ───────────────────────────────────────

    fn slot(&self, role: Role) -> &Option<SubMesh> {
        match role {
            Role::Front => &self.front,
            Role::Back => &self.back,
            Role::Edges => &self.edges,
            Role::Vertices => &self.vertices,
            Role::Normals => &self.normals,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<SubMesh> {
        match role {
            Role::Front => &mut self.front,
            Role::Back => &mut self.back,
            Role::Edges => &mut self.edges,
            Role::Vertices => &mut self.vertices,
            Role::Normals => &mut self.normals,
        }
    }

    pub fn submesh(&self, role: Role) -> Option<&SubMesh> {
        self.slot(role).as_ref()
    }

    pub fn submesh_mut(&mut self, role: Role) -> Option<&mut SubMesh> {
        self.slot_mut(role).as_mut()
    }

    /// Attach a sub-mesh. The pre-highlight look of a slot is captured the
    /// first time it is filled and survives later replacements.
    pub fn attach(&mut self, role: Role, mut mesh: SubMesh) {
        let slot = self.slot_mut(role);
        if let Some(previous) = slot.as_ref() {
            mesh.original = previous.original;
        }
        *slot = Some(mesh);
        self.sync_visibility();
        self.refresh_look();
    }

    pub fn submeshes(&self) -> impl Iterator<Item = (Role, &SubMesh)> {
        [Role::Front, Role::Back, Role::Edges, Role::Vertices, Role::Normals]
            .into_iter()
            .filter_map(move |role| self.submesh(role).map(|m| (role, m)))
    }

    fn submeshes_mut(&mut self) -> impl Iterator<Item = &mut SubMesh> {
        [
            self.front.as_mut(),
            self.back.as_mut(),
            self.edges.as_mut(),
            self.vertices.as_mut(),
            self.normals.as_mut(),
        ]
        .into_iter()
        .flatten()
    }

    /// Color of the front material before any highlight.
    pub fn original_color(&self) -> Option<Color> {
        self.front.as_ref().map(|m| m.original.color)
    }

    pub fn clip_meshes(&self, axis: usize) -> Option<&ClipMeshes> {
        self.clip.get(axis).and_then(Option::as_ref)
    }

    pub fn clip_meshes_mut(&mut self, axis: usize) -> Option<&mut ClipMeshes> {
        self.clip.get_mut(axis).and_then(Option::as_mut)
    }

    pub(crate) fn set_clip_meshes(&mut self, axis: usize, meshes: ClipMeshes) {
        if let Some(slot) = self.clip.get_mut(axis) {
            *slot = Some(meshes);
        }
    }

    pub fn is_any_visible(&self) -> bool {
        self.submeshes().any(|(_, m)| m.visible)
    }

    /// World-space bounds of all sub-meshes
    pub fn bounds(&self) -> Option<Aabb> {
        self.submeshes()
            .filter_map(|(_, m)| m.geometry.bounds(&self.transform))
            .reduce(|a, b| a.union(&b))
    }

    // ── State machine ────────────────────────────────────────

    pub fn apply(&mut self, op: &UnitOp) {
        match op {
            UnitOp::SetFacesVisible(flag) => self.state.faces_visible = *flag,
            UnitOp::SetEdgesVisible(flag) => self.state.edges_visible = *flag,
            UnitOp::SetBackVisible(flag) => self.state.back_visible = *flag,
            UnitOp::SetTransparent(flag) => self.state.transparent = *flag,
            UnitOp::SetOpacity(value) => self.opacity = value.clamp(0.0, 1.0),
            UnitOp::SetBlackEdges(flag) => self.state.black_edges = *flag,
            UnitOp::SetSelected(flag) => self.state.selected = *flag,
            UnitOp::Highlight(flag) => self.state.highlighted = *flag,
            UnitOp::SetMetalness(value) => {
                for m in [self.front.as_mut(), self.back.as_mut()].into_iter().flatten() {
                    m.material.metalness = *value;
                }
            }
            UnitOp::SetRoughness(value) => {
                for m in [self.front.as_mut(), self.back.as_mut()].into_iter().flatten() {
                    m.material.roughness = *value;
                }
            }
            UnitOp::SetClipPlanes(binding) => {
                for m in self.submeshes_mut() {
                    m.material.clipping = binding.clone();
                }
            }
            UnitOp::SetClipIntersection(flag) => {
                for m in self.submeshes_mut() {
                    m.material.clip_intersection = *flag;
                }
            }
        }
        self.sync_visibility();
        self.refresh_look();
        self.refresh_opacity();
    }

    fn sync_visibility(&mut self) {
        let faces = self.state.faces_visible;
        let back = faces && (self.render_back || self.state.back_visible);
        let edges = self.state.edges_visible;
        if let Some(m) = self.front.as_mut() {
            m.visible = faces;
        }
        if let Some(m) = self.back.as_mut() {
            m.visible = back;
        }
        if let Some(m) = self.normals.as_mut() {
            m.visible = faces;
        }
        for m in [self.edges.as_mut(), self.vertices.as_mut()].into_iter().flatten() {
            m.visible = edges;
        }
    }

    /// Recompute colors and widths from the captured originals.
    fn refresh_look(&mut self) {
        let accent = if self.state.selected { SELECTED_COLOR } else { HOVER_COLOR };
        let lit = self.state.highlighted || self.state.selected;
        let black_edges = self.state.black_edges && self.kind == LeafKind::Shapes;

        if let Some(m) = self.front.as_mut() {
            m.material.color = if lit { accent } else { m.original.color };
        }
        if let Some(m) = self.edges.as_mut() {
            let base = if black_edges { Color::BLACK } else { m.original.color };
            m.material.color = if lit { accent } else { base };
            m.material.line_width = if lit {
                m.original.line_width * HIGHLIGHT_LINE_FACTOR
            } else {
                m.original.line_width
            };
        }
        if let Some(m) = self.vertices.as_mut() {
            m.material.color = if lit { accent } else { m.original.color };
            m.material.point_size = if lit {
                m.original.point_size * HIGHLIGHT_POINT_FACTOR
            } else {
                m.original.point_size
            };
        }
    }

    /// Opacity shown for the faces right now.
    pub fn effective_alpha(&self) -> f32 {
        if self.state.transparent {
            self.alpha * self.opacity
        } else {
            self.alpha
        }
    }

    fn refresh_opacity(&mut self) {
        let alpha = self.effective_alpha();
        for m in [self.front.as_mut(), self.back.as_mut()].into_iter().flatten() {
            m.material.opacity = alpha;
            m.material.transparent = alpha < 1.0;
        }
    }

    /// Re-derive depth writes of the surfaces from the session flag.
    pub fn apply_depth_policy(&mut self, session_transparent: bool) {
        let depth_write = depth_write_policy(self.effective_alpha(), session_transparent);
        for m in [self.front.as_mut(), self.back.as_mut()].into_iter().flatten() {
            m.material.depth_write = depth_write;
        }
    }

    /// Drop every buffer, material, clip mesh and texture. Idempotent.
    pub fn dispose(&mut self) {
        self.front = None;
        self.back = None;
        self.edges = None;
        self.vertices = None;
        self.normals = None;
        self.clip = [None, None, None];
        self.texture = None;
        self.disposed = true;
    }
}
