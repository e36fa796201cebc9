//! Tessellation codec: resolves the two wire encodings of a leaf's numeric
//! buffers into one flat, typed form.
//!
//! Triangles and edges arrive either flat with a companion counts array
//! (`triangles_per_face`, `segments_per_edge`) or nested, one array per face
//! or edge. Point-like buffers arrive flat or as nested tuples. After
//! [`normalize_shape`] every buffer is `Flat` and both counts arrays are
//! present, so nothing downstream ever branches on the encoding.

use std::ops::Range;

use shared::{FloatBuffer, IndexBuffer, Shape};

use crate::error::{Result, ViewerError};

/// Floats per vertex / normal / point.
pub const POINT_STRIDE: usize = 3;
/// Floats per uv pair.
pub const UV_STRIDE: usize = 2;
/// Indices per triangle.
pub const TRIANGLE_STRIDE: usize = 3;
/// Floats per edge segment (two points).
pub const SEGMENT_STRIDE: usize = 6;

/// Normalize every numeric buffer of `shape` in place.
///
/// Nested buffers are moved out and flattened, flat buffers are left where
/// they are. Idempotent: a normalized shape passes through unchanged.
pub fn normalize_shape(shape: &mut Shape, path: &str) -> Result<()> {
    flatten_points(&mut shape.vertices, POINT_STRIDE, "vertices", path)?;
    flatten_points(&mut shape.normals, POINT_STRIDE, "normals", path)?;
    flatten_points(&mut shape.obj_vertices, POINT_STRIDE, "obj_vertices", path)?;
    flatten_points(&mut shape.uvs, UV_STRIDE, "uvs", path)?;

    if let Some(triangles) = shape.triangles.as_mut() {
        let counts = flatten_indices(triangles, shape.triangles_per_face.take(), path)?;
        shape.triangles_per_face = Some(counts);
    }
    if let Some(edges) = shape.edges.as_mut() {
        let counts = flatten_segments(edges, shape.segments_per_edge.take(), path)?;
        shape.segments_per_edge = Some(counts);
    }

    check_cross_references(shape, path)
}

fn flatten_points(
    buffer: &mut Option<FloatBuffer>,
    stride: usize,
    field: &'static str,
    path: &str,
) -> Result<()> {
    let Some(buf) = buffer.as_mut() else {
        return Ok(());
    };
    match buf {
        FloatBuffer::Flat(values) => {
            if values.len() % stride != 0 {
                return Err(ViewerError::data_format(
                    path,
                    field,
                    format!("length {} is not a multiple of {}", values.len(), stride),
                ));
            }
        }
        FloatBuffer::Nested(tuples) => {
            if let Some((i, bad)) = tuples.iter().enumerate().find(|(_, t)| t.len() != stride) {
                return Err(ViewerError::data_format(
                    path,
                    field,
                    format!("entry {} has {} components, expected {}", i, bad.len(), stride),
                ));
            }
            let flat: Vec<f32> = std::mem::take(tuples).into_iter().flatten().collect();
            *buf = FloatBuffer::Flat(flat);
        }
    }
    Ok(())
}

fn flatten_indices(
    triangles: &mut IndexBuffer,
    supplied: Option<Vec<u32>>,
    path: &str,
) -> Result<Vec<u32>> {
    match triangles {
        IndexBuffer::Nested(faces) => {
            let mut counts = Vec::with_capacity(faces.len());
            for (i, face) in faces.iter().enumerate() {
                if face.len() % TRIANGLE_STRIDE != 0 {
                    return Err(ViewerError::data_format(
                        path,
                        "triangles",
                        format!("face {} has {} indices, not a multiple of 3", i, face.len()),
                    ));
                }
                counts.push((face.len() / TRIANGLE_STRIDE) as u32);
            }
            if let Some(supplied) = supplied {
                check_nested_counts(&supplied, &counts, "triangles_per_face", path)?;
            }
            let flat: Vec<u32> = std::mem::take(faces).into_iter().flatten().collect();
            *triangles = IndexBuffer::Flat(flat);
            Ok(counts)
        }
        IndexBuffer::Flat(indices) => {
            if indices.len() % TRIANGLE_STRIDE != 0 {
                return Err(ViewerError::data_format(
                    path,
                    "triangles",
                    format!("length {} is not a multiple of 3", indices.len()),
                ));
            }
            let total = indices.len() / TRIANGLE_STRIDE;
            let counts = supplied.unwrap_or_else(|| single_group(total));
            check_counts(&counts, total, "triangles_per_face", path)?;
            Ok(counts)
        }
    }
}

fn flatten_segments(
    edges: &mut FloatBuffer,
    supplied: Option<Vec<u32>>,
    path: &str,
) -> Result<Vec<u32>> {
    match edges {
        FloatBuffer::Nested(per_edge) => {
            let mut counts = Vec::with_capacity(per_edge.len());
            for (i, edge) in per_edge.iter().enumerate() {
                if edge.len() % SEGMENT_STRIDE != 0 {
                    return Err(ViewerError::data_format(
                        path,
                        "edges",
                        format!("edge {} has {} values, not a multiple of 6", i, edge.len()),
                    ));
                }
                counts.push((edge.len() / SEGMENT_STRIDE) as u32);
            }
            if let Some(supplied) = supplied {
                check_nested_counts(&supplied, &counts, "segments_per_edge", path)?;
            }
            let flat: Vec<f32> = std::mem::take(per_edge).into_iter().flatten().collect();
            *edges = FloatBuffer::Flat(flat);
            Ok(counts)
        }
        FloatBuffer::Flat(values) => {
            if values.len() % SEGMENT_STRIDE != 0 {
                return Err(ViewerError::data_format(
                    path,
                    "edges",
                    format!("length {} is not a multiple of 6", values.len()),
                ));
            }
            let total = values.len() / SEGMENT_STRIDE;
            let counts = supplied.unwrap_or_else(|| single_group(total));
            check_counts(&counts, total, "segments_per_edge", path)?;
            Ok(counts)
        }
    }
}

/// A flat buffer without counts is a single group, or none when empty.
fn single_group(total: usize) -> Vec<u32> {
    if total == 0 {
        Vec::new()
    } else {
        vec![total as u32]
    }
}

fn check_counts(counts: &[u32], total: usize, field: &'static str, path: &str) -> Result<()> {
    let sum: usize = counts.iter().map(|&c| c as usize).sum();
    if sum != total {
        return Err(ViewerError::data_format(
            path,
            field,
            format!("counts sum to {} but the buffer holds {}", sum, total),
        ));
    }
    Ok(())
}

/// Counts sent next to a nested buffer must agree with its shape.
fn check_nested_counts(supplied: &[u32], nested: &[u32], field: &'static str, path: &str) -> Result<()> {
    if supplied != nested {
        return Err(ViewerError::data_format(
            path,
            field,
            format!("counts {:?} disagree with the nested buffer {:?}", supplied, nested),
        ));
    }
    Ok(())
}

fn check_type_count(types: &Option<Vec<u32>>, counts: &Option<Vec<u32>>, field: &'static str, path: &str) -> Result<()> {
    if let (Some(types), Some(counts)) = (types, counts) {
        if types.len() != counts.len() {
            return Err(ViewerError::data_format(
                path,
                field,
                format!("{} types for {} groups", types.len(), counts.len()),
            ));
        }
    }
    Ok(())
}

fn check_cross_references(shape: &Shape, path: &str) -> Result<()> {
    let vertex_count = flat_len(&shape.vertices) / POINT_STRIDE;
    let normal_len = flat_len(&shape.normals);
    if normal_len != 0 && normal_len != flat_len(&shape.vertices) {
        return Err(ViewerError::data_format(
            path,
            "normals",
            format!("{} normals for {} vertices", normal_len / POINT_STRIDE, vertex_count),
        ));
    }
    if let Some(IndexBuffer::Flat(indices)) = &shape.triangles {
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ViewerError::data_format(
                path,
                "triangles",
                format!("index {} out of range for {} vertices", bad, vertex_count),
            ));
        }
    }
    if let Some(uvs) = &shape.uvs {
        let pairs = uvs.scalar_count() / UV_STRIDE;
        if pairs != vertex_count {
            return Err(ViewerError::data_format(
                path,
                "uvs",
                format!("{} uv pairs for {} vertices", pairs, vertex_count),
            ));
        }
    }
    check_type_count(&shape.face_types, &shape.triangles_per_face, "face_types", path)?;
    check_type_count(&shape.edge_types, &shape.segments_per_edge, "edge_types", path)
}

fn flat_len(buffer: &Option<FloatBuffer>) -> usize {
    buffer.as_ref().map_or(0, FloatBuffer::scalar_count)
}

fn take_flat(buffer: Option<FloatBuffer>) -> Vec<f32> {
    match buffer {
        Some(FloatBuffer::Flat(v)) => v,
        Some(FloatBuffer::Nested(v)) => v.into_iter().flatten().collect(),
        None => Vec::new(),
    }
}

/// The internal typed form of a leaf's tessellation. Only produced through
/// [`Tessellation::decode`], so every buffer is flat and validated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tessellation {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub triangles: Vec<u32>,
    pub triangles_per_face: Vec<u32>,
    pub edges: Vec<f32>,
    pub segments_per_edge: Vec<u32>,
    pub obj_vertices: Vec<f32>,
    pub face_types: Vec<u32>,
    pub edge_types: Vec<u32>,
    pub uvs: Option<Vec<f32>>,
}

impl Tessellation {
    /// Normalize `shape` and take ownership of its buffers.
    pub fn decode(mut shape: Shape, path: &str) -> Result<Self> {
        normalize_shape(&mut shape, path)?;
        let triangles = match shape.triangles {
            Some(IndexBuffer::Flat(v)) => v,
            Some(IndexBuffer::Nested(v)) => v.into_iter().flatten().collect(),
            None => Vec::new(),
        };
        Ok(Self {
            vertices: take_flat(shape.vertices),
            normals: take_flat(shape.normals),
            triangles,
            triangles_per_face: shape.triangles_per_face.unwrap_or_default(),
            edges: take_flat(shape.edges),
            segments_per_edge: shape.segments_per_edge.unwrap_or_default(),
            obj_vertices: take_flat(shape.obj_vertices),
            face_types: shape.face_types.unwrap_or_default(),
            edge_types: shape.edge_types.unwrap_or_default(),
            uvs: shape.uvs.map(|b| take_flat(Some(b))),
        })
    }

    /// Shaded triangles need one normal per vertex.
    pub fn check_vertex_normals(&self, path: &str) -> Result<()> {
        if self.normals.len() != self.vertices.len() {
            return Err(ViewerError::data_format(
                path,
                "normals",
                format!("{} normals for {} vertices", self.normals.len() / POINT_STRIDE, self.vertex_count()),
            ));
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / POINT_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / TRIANGLE_STRIDE
    }

    pub fn face_count(&self) -> usize {
        self.triangles_per_face.len()
    }

    pub fn edge_count(&self) -> usize {
        self.segments_per_edge.len()
    }

    pub fn segment_count(&self) -> usize {
        self.edges.len() / SEGMENT_STRIDE
    }

    pub fn point_count(&self) -> usize {
        self.obj_vertices.len() / POINT_STRIDE
    }

    /// Index ranges into `triangles`, one per face.
    pub fn face_ranges(&self) -> Vec<Range<usize>> {
        group_ranges(&self.triangles_per_face, TRIANGLE_STRIDE)
    }

    /// Value ranges into `edges`, one per edge.
    pub fn edge_ranges(&self) -> Vec<Range<usize>> {
        group_ranges(&self.segments_per_edge, SEGMENT_STRIDE)
    }
}

fn group_ranges(counts: &[u32], stride: usize) -> Vec<Range<usize>> {
    let mut start = 0;
    counts
        .iter()
        .map(|&c| {
            let end = start + c as usize * stride;
            let range = start..end;
            start = end;
            range
        })
        .collect()
}
