//! Scene graph building: turns a (possibly exploded) shape tree into render
//! units and group nodes registered by path.

pub mod polygon;

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use shared::{ColorSpec, NodePath, PolygonShape, Shape, ShapeNode, ShapePayload, Visibility, VisibilityState};

use crate::codec::{Tessellation, SEGMENT_STRIDE};
use crate::decompose::decompose;
use crate::error::{Result, ViewerError};
use crate::state::settings::RenderOptions;
use crate::viewport::material::{ClipBinding, Color, Material, Side};
use crate::viewport::mesh::{normal_lines, Geometry, LineGeometry, PointGeometry, TriangleGeometry};
use crate::viewport::picking::{Aabb, BoundingSphere};
use crate::viewport::render_unit::{LeafKind, RenderUnit, Role, SubMesh, UnitOp};

/// Face color of a leaf without one.
pub const DEFAULT_FACE_COLOR: Color = Color(0xe8b024);
/// Color of the normals helper lines.
pub const NORMALS_COLOR: Color = Color(0xff00ff);
/// Blend of the edge color toward white used for exploded back faces.
pub const EXPLODED_BACK_BLEND: f32 = 0.15;
pub const DEFAULT_LINE_WIDTH: f32 = 1.0;
pub const DEFAULT_POINT_SIZE: f32 = 4.0;

/// Compound node: holds its children's paths.
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub path: NodePath,
    pub name: String,
    pub transform: Affine3A,
    pub state: VisibilityState,
    pub children: Vec<NodePath>,
}

#[derive(Debug)]
pub enum SceneNode {
    Unit(RenderUnit),
    Group(GroupNode),
}

impl SceneNode {
    pub fn path(&self) -> &str {
        match self {
            SceneNode::Unit(u) => u.path(),
            SceneNode::Group(g) => &g.path,
        }
    }

    pub fn as_unit(&self) -> Option<&RenderUnit> {
        match self {
            SceneNode::Unit(u) => Some(u),
            SceneNode::Group(_) => None,
        }
    }
}

/// Path-addressable result of one build. Lives until [`SceneGraph::dispose`].
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodePath, SceneNode>,
    root: Option<NodePath>,
    options: RenderOptions,
    session_transparent: bool,
}

impl SceneGraph {
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn get(&self, path: &str) -> Option<&SceneNode> {
        self.nodes.get(path)
    }

    pub fn unit(&self, path: &str) -> Option<&RenderUnit> {
        self.nodes.get(path).and_then(SceneNode::as_unit)
    }

    pub fn unit_mut(&mut self, path: &str) -> Option<&mut RenderUnit> {
        match self.nodes.get_mut(path) {
            Some(SceneNode::Unit(u)) => Some(u),
            _ => None,
        }
    }

    pub fn group(&self, path: &str) -> Option<&GroupNode> {
        match self.nodes.get(path) {
            Some(SceneNode::Group(g)) => Some(g),
            _ => None,
        }
    }

    /// Every render unit, ordered by path
    pub fn units(&self) -> impl Iterator<Item = &RenderUnit> {
        self.nodes.values().filter_map(SceneNode::as_unit)
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut RenderUnit> {
        self.nodes.values_mut().filter_map(|n| match n {
            SceneNode::Unit(u) => Some(u),
            SceneNode::Group(_) => None,
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Paths of the units at or below `path`.
    pub fn subtree_units(&self, path: &str) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut stack = vec![path.to_string()];
        while let Some(p) = stack.pop() {
            match self.nodes.get(&p) {
                Some(SceneNode::Unit(_)) => out.push(p),
                Some(SceneNode::Group(g)) => stack.extend(g.children.iter().rev().cloned()),
                None => {}
            }
        }
        out
    }

    /// Apply `op` to every unit at or below `path`. Returns how many units
    /// were touched; an unknown path touches none.
    pub fn apply(&mut self, path: &str, op: &UnitOp) -> usize {
        let targets = self.subtree_units(path);
        for p in &targets {
            if let Some(unit) = self.unit_mut(p) {
                unit.apply(op);
            }
        }
        self.refresh_depth_policy();
        targets.len()
    }

    /// Apply `op` to every unit in the graph.
    pub fn apply_all(&mut self, op: &UnitOp) {
        for unit in self.units_mut() {
            unit.apply(op);
        }
        self.refresh_depth_policy();
    }

    /// Set the visibility pair of every unit at or below `path`.
    /// Mixed and not-applicable entries leave that half untouched.
    pub fn set_state(&mut self, path: &str, faces: Visibility, edges: Visibility) -> usize {
        let targets = self.subtree_units(path);
        for p in &targets {
            let Some(unit) = self.unit_mut(p) else { continue };
            if matches!(faces, Visibility::Hidden | Visibility::Shown) {
                unit.visibility.0 = faces;
                unit.apply(&UnitOp::SetFacesVisible(faces.is_shown()));
            }
            if matches!(edges, Visibility::Hidden | Visibility::Shown) {
                unit.visibility.1 = edges;
                unit.apply(&UnitOp::SetEdgesVisible(edges.is_shown()));
            }
        }
        self.refresh_depth_policy();
        targets.len()
    }

    /// True when any unit is see-through; then no surface writes depth.
    pub fn session_transparent(&self) -> bool {
        self.session_transparent
    }

    fn refresh_depth_policy(&mut self) {
        let session = self
            .units()
            .any(|u| u.effective_alpha() < 1.0 || u.state().transparent);
        self.session_transparent = session;
        for unit in self.units_mut() {
            unit.apply_depth_policy(session);
        }
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        self.units()
            .filter_map(RenderUnit::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        self.bounding_box().map(|b| b.bounding_sphere())
    }

    /// Bind every unit's regular materials to the given clip planes.
    pub fn set_clip_planes(&mut self, binding: ClipBinding) {
        self.apply_all(&UnitOp::SetClipPlanes(binding));
    }

    pub fn set_clip_intersection(&mut self, flag: bool) {
        self.options.clip_intersection = flag;
        self.apply_all(&UnitOp::SetClipIntersection(flag));
    }

    /// Release every unit's buffers and empty the registry. Idempotent.
    pub fn dispose(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        for unit in self.units_mut() {
            unit.dispose();
        }
        let count = self.nodes.len();
        self.nodes.clear();
        self.root = None;
        self.session_transparent = false;
        tracing::debug!("Disposed scene graph ({count} nodes)");
    }
}

/// One-shot builder; `build` consumes it.
pub struct SceneGraphBuilder {
    options: RenderOptions,
    edge_color: Color,
    nodes: BTreeMap<NodePath, SceneNode>,
}

impl SceneGraphBuilder {
    pub fn new(options: RenderOptions) -> Self {
        let edge_color = options.edge_color();
        Self {
            options,
            edge_color,
            nodes: BTreeMap::new(),
        }
    }

    /// Build the graph for `root`. The input tree is never modified; any
    /// malformed node aborts the whole build.
    pub fn build(mut self, root: &ShapeNode) -> Result<SceneGraph> {
        let tree = if self.options.exploded {
            decompose(root, &self.options.edge_color)?
        } else {
            root.clone()
        };

        self.walk(tree, Affine3A::IDENTITY)?;

        let mut graph = SceneGraph {
            nodes: self.nodes,
            root: Some(root.id.clone()),
            options: self.options,
            session_transparent: false,
        };

        let opts = graph.options.clone();
        if opts.transparent {
            graph.apply_all(&UnitOp::SetTransparent(true));
        }
        graph.apply_all(&UnitOp::SetBackVisible(opts.back_visible));
        graph.apply_all(&UnitOp::SetBlackEdges(opts.black_edges));
        graph.apply_all(&UnitOp::SetClipIntersection(opts.clip_intersection));

        let units = graph.units().count();
        tracing::info!(
            "Built scene graph for '{}': {} units, {} groups, bounds {:?}",
            root.id,
            units,
            graph.len() - units,
            graph.bounding_box()
        );
        Ok(graph)
    }

    fn register(&mut self, node: SceneNode) -> Result<()> {
        let path = node.path().to_string();
        if self.nodes.contains_key(&path) {
            return Err(ViewerError::data_format(&path, "id", "duplicate path"));
        }
        self.nodes.insert(path, node);
        Ok(())
    }

    fn walk(&mut self, mut node: ShapeNode, parent: Affine3A) -> Result<()> {
        let world = parent * local_transform(&node);
        match node.parts.take() {
            Some(parts) => {
                if node.shape.is_some() {
                    return Err(ViewerError::data_format(
                        &node.id,
                        "parts",
                        "node carries both parts and a shape",
                    ));
                }
                let group = GroupNode {
                    path: node.id.clone(),
                    name: node.name.clone(),
                    transform: world,
                    state: node.state_or_default(),
                    children: parts.iter().map(|p| p.id.clone()).collect(),
                };
                self.register(SceneNode::Group(group))?;
                for child in parts {
                    self.walk(child, world)?;
                }
                Ok(())
            }
            None => {
                let unit = self.build_leaf(node, world)?;
                self.register(SceneNode::Unit(unit))
            }
        }
    }

    fn build_leaf(&self, mut node: ShapeNode, world: Affine3A) -> Result<RenderUnit> {
        let kind = LeafKind::from_tag(node.kind.as_deref(), &node.id)?;
        let mut unit = RenderUnit::new(
            node.id.clone(),
            node.name.clone(),
            kind,
            node.subtype.clone(),
            node.state_or_default(),
        );
        unit.transform = world;
        unit.texture = node.texture.take();

        let payload = node.shape.take().ok_or_else(|| ViewerError::MissingGeometryData {
            path: node.id.clone(),
            field: "shape",
            kind: kind.as_str(),
        })?;

        match (kind, payload) {
            (LeafKind::Polygon, ShapePayload::Polygon(poly)) => self.build_polygon(&mut unit, &node, &poly)?,
            (LeafKind::Polygon, ShapePayload::Tessellated(_)) => {
                return Err(ViewerError::data_format(
                    &node.id,
                    "shape",
                    "polygon leaf needs polygons, refs, matrices and height",
                ))
            }
            (_, ShapePayload::Polygon(_)) => {
                return Err(ViewerError::data_format(
                    &node.id,
                    "shape",
                    format!("{} leaf carries a polygon payload", kind.as_str()),
                ))
            }
            (LeafKind::Shapes, ShapePayload::Tessellated(shape)) => self.build_shapes(&mut unit, &node, shape)?,
            (LeafKind::Edges, ShapePayload::Tessellated(shape)) => self.build_edges(&mut unit, &node, shape)?,
            (LeafKind::Vertices, ShapePayload::Tessellated(shape)) => self.build_vertices(&mut unit, &node, shape)?,
        }

        tracing::debug!("Built {} leaf '{}'", kind.as_str(), node.id);
        Ok(unit)
    }

    fn face_color(&self, node: &ShapeNode) -> Result<Color> {
        match &node.color {
            None => Ok(DEFAULT_FACE_COLOR),
            Some(ColorSpec::Single(hex)) => parse_color(hex, &node.id),
            Some(ColorSpec::PerEdge(_)) => Err(ViewerError::data_format(
                &node.id,
                "color",
                "a color list is only valid on edges leaves",
            )),
        }
    }

    /// Front, back and optional normals helper over one shared buffer.
    ///
    /// Only a solid in the normal view shows its own color on the inside;
    /// everything else gets the edge color lifted toward white.
    fn attach_surfaces(&self, unit: &mut RenderUnit, node: &ShapeNode, mesh: TriangleGeometry) -> Result<()> {
        let color = self.face_color(node)?;
        let back_color = if unit.is_solid() && !self.options.exploded {
            color
        } else {
            self.edge_color.lerp(Color::WHITE, EXPLODED_BACK_BLEND)
        };
        let mesh = Arc::new(mesh);
        let geometry = Geometry::Triangles(Arc::clone(&mesh));

        let surface = |color, side| Material {
            metalness: self.options.metalness,
            roughness: self.options.roughness,
            ..Material::surface(color, side)
        };
        unit.set_surface_params(
            node.alpha.unwrap_or(1.0).clamp(0.0, 1.0),
            self.options.default_opacity,
            node.renderback.unwrap_or(false),
        );
        unit.attach(Role::Front, SubMesh::new(geometry.clone(), surface(color, Side::Front)));
        unit.attach(Role::Back, SubMesh::new(geometry, surface(back_color, Side::Back)));

        if self.options.normal_len > 0.0 {
            let lines = normal_lines(&mesh, self.options.normal_len);
            unit.attach(
                Role::Normals,
                SubMesh::new(Geometry::Lines(Arc::new(lines)), Material::line(NORMALS_COLOR, 1.0)),
            );
        }
        Ok(())
    }

    fn attach_edges(&self, unit: &mut RenderUnit, lines: LineGeometry, color: Color, width: f32) {
        if lines.positions.is_empty() {
            return;
        }
        let vertex_colors = lines.colors.is_some();
        let material = Material {
            vertex_colors,
            ..Material::line(color, width)
        };
        unit.attach(Role::Edges, SubMesh::new(Geometry::Lines(Arc::new(lines)), material));
    }

    fn build_shapes(&self, unit: &mut RenderUnit, node: &ShapeNode, shape: Shape) -> Result<()> {
        LeafKind::Shapes.check_required(&shape, &node.id)?;
        let tess = Tessellation::decode(shape, &node.id)?;
        tess.check_vertex_normals(&node.id)?;

        let mesh = TriangleGeometry {
            positions: tess.vertices,
            normals: tess.normals,
            indices: tess.triangles,
            uvs: tess.uvs,
        };
        self.attach_surfaces(unit, node, mesh)?;
        let width = node.width.unwrap_or(DEFAULT_LINE_WIDTH);
        self.attach_edges(unit, LineGeometry { positions: tess.edges, colors: None }, self.edge_color, width);
        Ok(())
    }

    fn build_edges(&self, unit: &mut RenderUnit, node: &ShapeNode, shape: Shape) -> Result<()> {
        LeafKind::Edges.check_required(&shape, &node.id)?;
        let tess = Tessellation::decode(shape, &node.id)?;
        let (color, colors) = match &node.color {
            None => (self.edge_color, None),
            Some(ColorSpec::Single(hex)) => (parse_color(hex, &node.id)?, None),
            Some(ColorSpec::PerEdge(list)) => {
                let per_edge = list
                    .iter()
                    .map(|hex| parse_color(hex, &node.id))
                    .collect::<Result<Vec<_>>>()?;
                let colors = expand_edge_colors(&per_edge, &tess.segments_per_edge, &node.id)?;
                (per_edge.first().copied().unwrap_or(self.edge_color), Some(colors))
            }
        };
        let width = node.width.unwrap_or(DEFAULT_LINE_WIDTH);
        let points = tess.obj_vertices;
        self.attach_edges(unit, LineGeometry { positions: tess.edges, colors }, color, width);
        if !points.is_empty() {
            let size = node.size.unwrap_or(DEFAULT_POINT_SIZE);
            unit.attach(
                Role::Vertices,
                SubMesh::new(
                    Geometry::Points(Arc::new(PointGeometry { positions: points })),
                    Material::points(color, size),
                ),
            );
        }
        Ok(())
    }

    fn build_vertices(&self, unit: &mut RenderUnit, node: &ShapeNode, shape: Shape) -> Result<()> {
        LeafKind::Vertices.check_required(&shape, &node.id)?;
        let tess = Tessellation::decode(shape, &node.id)?;
        let color = match &node.color {
            None => self.edge_color,
            Some(ColorSpec::Single(hex)) => parse_color(hex, &node.id)?,
            Some(ColorSpec::PerEdge(_)) => {
                return Err(ViewerError::data_format(
                    &node.id,
                    "color",
                    "a color list is only valid on edges leaves",
                ))
            }
        };
        let size = node.size.unwrap_or(DEFAULT_POINT_SIZE);
        unit.attach(
            Role::Vertices,
            SubMesh::new(
                Geometry::Points(Arc::new(PointGeometry { positions: tess.obj_vertices })),
                Material::points(color, size),
            ),
        );
        Ok(())
    }

    fn build_polygon(&self, unit: &mut RenderUnit, node: &ShapeNode, poly: &PolygonShape) -> Result<()> {
        let (mesh, edges) = polygon::extrude(poly, &node.id)?;
        self.attach_surfaces(unit, node, mesh)?;
        let width = node.width.unwrap_or(DEFAULT_LINE_WIDTH);
        self.attach_edges(unit, edges, self.edge_color, width);
        Ok(())
    }
}

fn parse_color(hex: &str, path: &str) -> Result<Color> {
    Color::from_hex(hex)
        .ok_or_else(|| ViewerError::data_format(path, "color", format!("'{hex}' is not #rrggbb")))
}

/// One RGB triple per line point: each edge's color over its segments.
fn expand_edge_colors(colors: &[Color], segments_per_edge: &[u32], path: &str) -> Result<Vec<f32>> {
    if colors.len() != segments_per_edge.len() {
        return Err(ViewerError::data_format(
            path,
            "color",
            format!("{} colors for {} edges", colors.len(), segments_per_edge.len()),
        ));
    }
    let points: usize = segments_per_edge.iter().map(|&s| s as usize * 2).sum();
    let mut out = Vec::with_capacity(points * 3);
    for (color, &segments) in colors.iter().zip(segments_per_edge) {
        let rgb = color.rgb_f32();
        for _ in 0..segments as usize * (SEGMENT_STRIDE / 3) {
            out.extend_from_slice(&rgb);
        }
    }
    Ok(out)
}

fn local_transform(node: &ShapeNode) -> Affine3A {
    let Some(loc) = node.loc else {
        return Affine3A::IDENTITY;
    };
    let [x, y, z] = loc.position();
    let [qx, qy, qz, qw] = loc.rotation();
    let rotation = Quat::from_xyzw(qx as f32, qy as f32, qz as f32, qw as f32);
    let rotation = if rotation.length_squared() > 0.0 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };
    Affine3A::from_rotation_translation(rotation, Vec3::new(x as f32, y as f32, z as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use shared::{FloatBuffer, Location};

    fn build(tree: &ShapeNode, options: RenderOptions) -> Result<SceneGraph> {
        SceneGraphBuilder::new(options).build(tree)
    }

    #[test]
    fn test_cube_builds_one_unit() {
        let cube = fixtures::unit_cube("/cube", "#e8b024");
        let graph = build(&cube, RenderOptions::default()).unwrap();
        assert_eq!(graph.len(), 1);
        let unit = graph.unit("/cube").unwrap();
        assert!(unit.is_solid());
        let front = unit.submesh(Role::Front).unwrap();
        let back = unit.submesh(Role::Back).unwrap();
        assert!(front.geometry.shares_buffer_with(&back.geometry));
        assert_eq!(back.material.color, Color(0xe8b024));
        assert_eq!(unit.submesh(Role::Edges).unwrap().material.color, Color(0x707070));
        let bb = graph.bounding_box().unwrap();
        assert_eq!(bb.min, Vec3::splat(-0.5));
        assert_eq!(bb.max, Vec3::splat(0.5));
    }

    #[test]
    fn test_missing_normals_names_path() {
        let mut cube = fixtures::unit_cube("/cube", "#e8b024");
        if let Some(ShapePayload::Tessellated(s)) = cube.shape.as_mut() {
            s.normals = None;
        }
        let err = build(&cube, RenderOptions::default()).unwrap_err();
        assert!(matches!(err, ViewerError::MissingGeometryData { field: "normals", .. }));
        assert_eq!(err.path(), Some("/cube"));
    }

    #[test]
    fn test_unknown_leaf_type_fails() {
        let mut cube = fixtures::unit_cube("/cube", "#e8b024");
        cube.kind = Some("surface".into());
        let err = build(&cube, RenderOptions::default()).unwrap_err();
        assert!(matches!(err, ViewerError::UnsupportedLeafType { .. }));
    }

    #[test]
    fn test_parts_and_shape_together_fail() {
        let mut cube = fixtures::unit_cube("/cube", "#e8b024");
        cube.parts = Some(vec![]);
        let err = build(&cube, RenderOptions::default()).unwrap_err();
        assert!(matches!(err, ViewerError::DataFormat { field: "parts", .. }));
    }

    #[test]
    fn test_exploded_back_color_blends_edge_color() {
        let cube = fixtures::unit_cube("/cube", "#e8b024");
        let opts = RenderOptions {
            exploded: true,
            ..Default::default()
        };
        let graph = build(&cube, opts).unwrap();
        let face = graph.unit("/cube/faces/faces_0").unwrap();
        let expected = Color(0x707070).lerp(Color::WHITE, EXPLODED_BACK_BLEND);
        assert_eq!(face.submesh(Role::Back).unwrap().material.color, expected);
        assert!(face.submesh(Role::Back).unwrap().visible);
        assert_eq!(graph.subtree_units("/cube").len(), 6 + 12 + 8);
        assert!(graph.group("/cube/faces").is_some());
    }

    #[test]
    fn test_open_shell_back_color_blends_edge_color() {
        let mut shell = fixtures::unit_cube("/shell", "#e8b024");
        shell.subtype = None;
        let graph = build(&shell, RenderOptions::default()).unwrap();
        let unit = graph.unit("/shell").unwrap();
        assert!(!unit.is_solid());
        assert_eq!(unit.submesh(Role::Front).unwrap().material.color, Color(0xe8b024));
        assert_eq!(unit.submesh(Role::Back).unwrap().material.color, Color(0x858585));

        let plate = build(&fixtures::polygon_plate("/plate"), RenderOptions::default()).unwrap();
        let back = plate.unit("/plate").unwrap().submesh(Role::Back).unwrap();
        assert_eq!(back.material.color, Color(0x858585));
    }

    #[test]
    fn test_exploded_missing_fields_name_leaf() {
        let opts = RenderOptions {
            exploded: true,
            ..Default::default()
        };
        for field in ["triangles", "normals", "vertices"] {
            let mut cube = fixtures::unit_cube("/cube", "#e8b024");
            if let Some(ShapePayload::Tessellated(s)) = cube.shape.as_mut() {
                match field {
                    "triangles" => s.triangles = None,
                    "normals" => s.normals = None,
                    _ => s.vertices = None,
                }
            }
            let err = build(&cube, opts.clone()).unwrap_err();
            match err {
                ViewerError::MissingGeometryData { path, field: missing, kind } => {
                    assert_eq!(path, "/cube");
                    assert_eq!(missing, field);
                    assert_eq!(kind, "shapes");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_alpha_promotes_session_transparency() {
        let mut a = fixtures::unit_cube("/root/a", "#ff0000");
        a.alpha = Some(0.5);
        let b = fixtures::unit_cube("/root/b", "#00ff00");
        let tree = ShapeNode::group("root", "/root", vec![a, b]);
        let mut graph = build(&tree, RenderOptions::default()).unwrap();
        assert!(graph.session_transparent());
        let b_front = graph.unit("/root/b").unwrap().submesh(Role::Front).unwrap();
        assert!(!b_front.material.depth_write);

        graph.unit_mut("/root/a").unwrap().set_surface_params(1.0, 0.5, false);
        graph.apply("/root/a", &UnitOp::SetFacesVisible(true));
        assert!(!graph.session_transparent());
        assert!(graph.unit("/root/b").unwrap().submesh(Role::Front).unwrap().material.depth_write);
    }

    #[test]
    fn test_apply_fans_out_over_subtree() {
        let tree = ShapeNode::group(
            "root",
            "/root",
            vec![
                fixtures::unit_cube("/root/a", "#ff0000"),
                ShapeNode::group("g", "/root/g", vec![fixtures::unit_cube("/root/g/b", "#00ff00")]),
            ],
        );
        let mut graph = build(&tree, RenderOptions::default()).unwrap();
        assert_eq!(graph.apply("/root/g", &UnitOp::SetFacesVisible(false)), 1);
        assert!(graph.unit("/root/a").unwrap().submesh(Role::Front).unwrap().visible);
        assert!(!graph.unit("/root/g/b").unwrap().submesh(Role::Front).unwrap().visible);
        assert_eq!(graph.apply("/nope", &UnitOp::Highlight(true)), 0);
    }

    #[test]
    fn test_set_state_ignores_mixed() {
        let cube = fixtures::unit_cube("/cube", "#e8b024");
        let mut graph = build(&cube, RenderOptions::default()).unwrap();
        graph.set_state("/cube", Visibility::Mixed, Visibility::Hidden);
        let unit = graph.unit("/cube").unwrap();
        assert!(unit.submesh(Role::Front).unwrap().visible);
        assert!(!unit.submesh(Role::Edges).unwrap().visible);
        assert_eq!(unit.visibility.1, Visibility::Hidden);
    }

    #[test]
    fn test_transform_from_loc() {
        let mut cube = fixtures::unit_cube("/cube", "#e8b024");
        cube.loc = Some(Location([10.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
        let graph = build(&ShapeNode::group("r", "/r", vec![cube]), RenderOptions::default()).unwrap();
        let bb = graph.bounding_box().unwrap();
        assert_eq!(bb.center(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_per_edge_colors_expand_to_vertex_colors() {
        let mut edges = fixtures::edge_set("/e", &[2, 1]);
        edges.color = Some(ColorSpec::PerEdge(vec!["#ff0000".into(), "#0000ff".into()]));
        let graph = build(&edges, RenderOptions::default()).unwrap();
        let sub = graph.unit("/e").unwrap().submesh(Role::Edges).unwrap();
        assert!(sub.material.vertex_colors);
        let Geometry::Lines(lines) = &sub.geometry else { panic!("expected lines") };
        let colors = lines.colors.as_ref().unwrap();
        assert_eq!(colors.len(), 3 * 2 * 3);
        assert_eq!(&colors[0..3], &[1.0, 0.0, 0.0]);
        assert_eq!(&colors[colors.len() - 3..], &[0.0, 0.0, 1.0]);

        edges.color = Some(ColorSpec::PerEdge(vec!["#ff0000".into()]));
        assert!(build(&edges, RenderOptions::default()).is_err());
    }

    #[test]
    fn test_vertices_leaf_bad_stride() {
        let mut cloud = fixtures::vertex_cloud("/v", 2);
        if let Some(ShapePayload::Tessellated(s)) = cloud.shape.as_mut() {
            s.obj_vertices = Some(FloatBuffer::Flat(vec![0.0; 5]));
        }
        let err = build(&cloud, RenderOptions::default()).unwrap_err();
        assert!(matches!(err, ViewerError::DataFormat { field: "obj_vertices", .. }));
    }

    #[test]
    fn test_polygon_leaf_gets_procedural_edges() {
        let graph = build(&fixtures::polygon_plate("/p"), RenderOptions::default()).unwrap();
        let unit = graph.unit("/p").unwrap();
        assert_eq!(unit.kind(), LeafKind::Polygon);
        let Geometry::Lines(lines) = &unit.submesh(Role::Edges).unwrap().geometry else {
            panic!("expected lines")
        };
        assert_eq!(lines.segment_count(), 12);
    }

    #[test]
    fn test_normals_helper_when_enabled() {
        let cube = fixtures::unit_cube("/cube", "#e8b024");
        let opts = RenderOptions {
            normal_len: 0.1,
            ..Default::default()
        };
        let graph = build(&cube, opts).unwrap();
        assert!(graph.unit("/cube").unwrap().submesh(Role::Normals).is_some());
        let graph = build(&cube, RenderOptions::default()).unwrap();
        assert!(graph.unit("/cube").unwrap().submesh(Role::Normals).is_none());
    }

    #[test]
    fn test_dispose_twice() {
        let cube = fixtures::unit_cube("/cube", "#e8b024");
        let mut graph = build(&cube, RenderOptions::default()).unwrap();
        graph.dispose();
        graph.dispose();
        assert!(graph.is_empty());
        assert!(graph.bounding_box().is_none());
    }
}
