use serde::{Deserialize, Serialize};

/// Путь узла в дереве формы: id, разделённый слешами ("/assembly/part")
pub type NodePath = String;

/// Видимость граней или рёбер узла
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Visibility {
    Hidden,
    Shown,
    /// Часть потомков видна, часть скрыта
    Mixed,
    /// Не применимо (например, рёбра у синтетической грани)
    NotApplicable,
}

impl Visibility {
    pub fn is_shown(self) -> bool {
        self == Visibility::Shown
    }
}

impl From<bool> for Visibility {
    fn from(shown: bool) -> Self {
        if shown {
            Visibility::Shown
        } else {
            Visibility::Hidden
        }
    }
}

/// Недопустимое целое значение видимости в payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVisibility(pub u8);

impl std::fmt::Display for InvalidVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid visibility value {} (expected 0..=3)", self.0)
    }
}

impl std::error::Error for InvalidVisibility {}

impl TryFrom<u8> for Visibility {
    type Error = InvalidVisibility;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Visibility::Hidden),
            1 => Ok(Visibility::Shown),
            2 => Ok(Visibility::Mixed),
            3 => Ok(Visibility::NotApplicable),
            other => Err(InvalidVisibility(other)),
        }
    }
}

impl From<Visibility> for u8 {
    fn from(value: Visibility) -> Self {
        match value {
            Visibility::Hidden => 0,
            Visibility::Shown => 1,
            Visibility::Mixed => 2,
            Visibility::NotApplicable => 3,
        }
    }
}

/// Пара (видимость граней, видимость рёбер); на проводе `[face, edge]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityState(pub Visibility, pub Visibility);

impl VisibilityState {
    pub const SHOWN: VisibilityState = VisibilityState(Visibility::Shown, Visibility::Shown);

    pub fn faces(&self) -> Visibility {
        self.0
    }

    pub fn edges(&self) -> Visibility {
        self.1
    }
}

impl Default for VisibilityState {
    fn default() -> Self {
        Self::SHOWN
    }
}

/// Локальная трансформация узла: позиция и кватернион `[x, y, z, w]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location(pub [f64; 3], pub [f64; 4]);

impl Location {
    pub const IDENTITY: Location = Location([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);

    pub fn position(&self) -> [f64; 3] {
        self.0
    }

    pub fn rotation(&self) -> [f64; 4] {
        self.1
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Числовой буфер в одной из двух кодировок провода
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FloatBuffer {
    /// Плоский массив чисел
    Flat(Vec<f32>),
    /// Массив массивов (кортежи или по одному массиву на ребро)
    Nested(Vec<Vec<f32>>),
}

impl FloatBuffer {
    pub fn is_flat(&self) -> bool {
        matches!(self, FloatBuffer::Flat(_))
    }

    /// Общее число скаляров во всех вложенных массивах
    pub fn scalar_count(&self) -> usize {
        match self {
            FloatBuffer::Flat(v) => v.len(),
            FloatBuffer::Nested(v) => v.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scalar_count() == 0
    }
}

impl Default for FloatBuffer {
    fn default() -> Self {
        FloatBuffer::Flat(Vec::new())
    }
}

/// Индексы треугольников: плоский буфер или по массиву на грань
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexBuffer {
    Flat(Vec<u32>),
    Nested(Vec<Vec<u32>>),
}

impl IndexBuffer {
    pub fn is_flat(&self) -> bool {
        matches!(self, IndexBuffer::Flat(_))
    }

    pub fn scalar_count(&self) -> usize {
        match self {
            IndexBuffer::Flat(v) => v.len(),
            IndexBuffer::Nested(v) => v.iter().map(Vec::len).sum(),
        }
    }
}

impl Default for IndexBuffer {
    fn default() -> Self {
        IndexBuffer::Flat(Vec::new())
    }
}

/// Цвет узла: один `"#rrggbb"` или (только для рёбер) по цвету на ребро
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Single(String),
    PerEdge(Vec<String>),
}

/// Тесселяция листа. Все поля необязательны на проводе; какие из них
/// требуются, решает тип листа при построении сцены.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<FloatBuffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<FloatBuffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triangles: Option<IndexBuffer>,
    /// Число треугольников на грань (только для плоской кодировки)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triangles_per_face: Option<Vec<u32>>,
    /// Отрезки рёбер, 6 чисел на отрезок
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<FloatBuffer>,
    /// Число отрезков на ребро (только для плоской кодировки)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments_per_edge: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_vertices: Option<FloatBuffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_types: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_types: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvs: Option<FloatBuffer>,
}

/// 2D-контуры, размноженные аффинными матрицами и выдавленные на высоту
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    /// Контуры: плоские пары `x, y`
    pub polygons: Vec<Vec<f32>>,
    /// Для каждого экземпляра — индекс контура в `polygons`
    pub refs: Vec<usize>,
    /// Для каждого экземпляра — матрица `[a, b, c, d, e, f]`
    pub matrices: Vec<[f32; 6]>,
    pub height: f32,
}

/// Полезная нагрузка листа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapePayload {
    Polygon(PolygonShape),
    Tessellated(Shape),
}

impl ShapePayload {
    pub fn as_tessellated(&self) -> Option<&Shape> {
        match self {
            ShapePayload::Tessellated(s) => Some(s),
            ShapePayload::Polygon(_) => None,
        }
    }

    pub fn as_tessellated_mut(&mut self) -> Option<&mut Shape> {
        match self {
            ShapePayload::Tessellated(s) => Some(s),
            ShapePayload::Polygon(_) => None,
        }
    }
}

/// Узел дерева формы: либо `parts`, либо `shape`, но не оба сразу
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeNode {
    pub name: String,
    pub id: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<ShapeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<VisibilityState>,
    /// Тип листа: "shapes", "edges", "vertices", "polygon"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderback: Option<bool>,
    /// Текстура передаётся как есть; загрузка вне ядра
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<serde_json::Value>,
    /// Толщина линий рёбер
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Размер точек вершин
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    /// Топологический тип единственной грани/ребра синтетического листа
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geomtype: Option<u32>,
}

impl ShapeNode {
    /// Составной узел с потомками
    pub fn group(name: impl Into<String>, id: impl Into<NodePath>, parts: Vec<ShapeNode>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            parts: Some(parts),
            ..Default::default()
        }
    }

    /// Лист с тесселяцией заданного типа
    pub fn leaf(
        name: impl Into<String>,
        id: impl Into<NodePath>,
        kind: &str,
        shape: ShapePayload,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            kind: Some(kind.to_string()),
            shape: Some(shape),
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.parts.is_none()
    }

    pub fn children(&self) -> &[ShapeNode] {
        self.parts.as_deref().unwrap_or(&[])
    }

    pub fn state_or_default(&self) -> VisibilityState {
        self.state.unwrap_or_default()
    }

    /// Число листьев в поддереве
    pub fn leaf_count(&self) -> usize {
        match &self.parts {
            Some(parts) => parts.iter().map(ShapeNode::leaf_count).sum(),
            None => 1,
        }
    }

    /// Найти узел по пути
    pub fn find(&self, path: &str) -> Option<&ShapeNode> {
        if self.id == path {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(path))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_encoding() {
        let json = r##"{
            "name": "box", "id": "/box", "type": "shapes", "subtype": "solid",
            "color": "#e8b024", "state": [1, 3],
            "shape": {
                "vertices": [0,0,0, 1,0,0, 0,1,0],
                "normals": [0,0,1, 0,0,1, 0,0,1],
                "triangles": [0,1,2],
                "triangles_per_face": [1],
                "edges": [0,0,0, 1,0,0],
                "segments_per_edge": [1],
                "obj_vertices": [0,0,0],
                "face_types": [0],
                "edge_types": [0]
            }
        }"##;
        let node = ShapeNode::from_json(json).unwrap();
        assert_eq!(node.kind.as_deref(), Some("shapes"));
        assert_eq!(node.state, Some(VisibilityState(Visibility::Shown, Visibility::NotApplicable)));
        let shape = node.shape.as_ref().unwrap().as_tessellated().unwrap();
        assert!(shape.vertices.as_ref().unwrap().is_flat());
        assert!(shape.triangles.as_ref().unwrap().is_flat());
        assert_eq!(shape.triangles_per_face, Some(vec![1]));
    }

    #[test]
    fn test_parse_nested_encoding() {
        let json = r#"{
            "name": "box", "id": "/box",
            "shape": {
                "vertices": [[0,0,0], [1,0,0], [0,1,0]],
                "triangles": [[0,1,2]],
                "edges": [[0,0,0, 1,0,0]]
            }
        }"#;
        let node = ShapeNode::from_json(json).unwrap();
        let shape = node.shape.as_ref().unwrap().as_tessellated().unwrap();
        assert!(!shape.vertices.as_ref().unwrap().is_flat());
        assert_eq!(shape.triangles.as_ref().unwrap().scalar_count(), 3);
        assert!(shape.triangles_per_face.is_none());
        assert!(shape.segments_per_edge.is_none());
    }

    #[test]
    fn test_parse_polygon_payload() {
        let json = r#"{
            "name": "plate", "id": "/plate", "type": "polygon",
            "shape": {
                "polygons": [[0,0, 1,0, 1,1, 0,1]],
                "refs": [0, 0],
                "matrices": [[1,0,0,1,0,0], [1,0,0,1,2,0]],
                "height": 0.5
            }
        }"#;
        let node = ShapeNode::from_json(json).unwrap();
        match node.shape.unwrap() {
            ShapePayload::Polygon(p) => {
                assert_eq!(p.refs.len(), 2);
                assert_eq!(p.height, 0.5);
            }
            other => panic!("expected polygon payload, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_visibility_rejected() {
        let json = r#"{ "name": "a", "id": "/a", "state": [1, 7] }"#;
        assert!(ShapeNode::from_json(json).is_err());
    }

    #[test]
    fn test_multi_color() {
        let json = r##"{ "name": "e", "id": "/e", "type": "edges", "color": ["#ff0000", "#00ff00"] }"##;
        let node = ShapeNode::from_json(json).unwrap();
        assert_eq!(
            node.color,
            Some(ColorSpec::PerEdge(vec!["#ff0000".into(), "#00ff00".into()]))
        );
    }

    #[test]
    fn test_wire_field_names_preserved() {
        let node = ShapeNode::leaf(
            "f",
            "/f",
            "shapes",
            ShapePayload::Tessellated(Shape {
                triangles: Some(IndexBuffer::Flat(vec![0, 1, 2])),
                triangles_per_face: Some(vec![1]),
                ..Default::default()
            }),
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "shapes");
        assert_eq!(value["shape"]["triangles_per_face"][0], 1);
        assert!(value.get("parts").is_none());
    }

    #[test]
    fn test_tree_helpers() {
        let tree = ShapeNode::group(
            "root",
            "/root",
            vec![
                ShapeNode::leaf("a", "/root/a", "vertices", ShapePayload::Tessellated(Shape::default())),
                ShapeNode::group("g", "/root/g", vec![]),
            ],
        );
        assert_eq!(tree.leaf_count(), 1);
        assert!(tree.find("/root/g").is_some());
        assert!(tree.find("/root/missing").is_none());
        assert_eq!(tree.state_or_default(), VisibilityState::SHOWN);
        assert_eq!(Location::default(), Location::IDENTITY);
    }
}
