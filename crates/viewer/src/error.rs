//! Error types for payload decoding, scene building and capping.

use shared::NodePath;

/// Result alias used across the viewer library.
pub type Result<T, E = ViewerError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// A numeric field has the wrong arity (length not a multiple of its
    /// stride, counts that don't add up, indices out of range).
    #[error("data format error at '{path}': field `{field}`: {detail}")]
    DataFormat {
        path: NodePath,
        field: &'static str,
        detail: String,
    },

    /// A field required by the leaf's declared type is absent.
    #[error("missing geometry data at '{path}': `{field}` is required for {kind} leaves")]
    MissingGeometryData {
        path: NodePath,
        field: &'static str,
        kind: &'static str,
    },

    #[error("unsupported leaf type '{tag}' at '{path}'")]
    UnsupportedLeafType { path: NodePath, tag: String },

    /// Capping was requested before the clip planes were created.
    #[error("stencil caps requested before clip planes exist")]
    StencilOrdering,

    #[error("invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ViewerError {
    pub(crate) fn data_format(path: &str, field: &'static str, detail: impl Into<String>) -> Self {
        ViewerError::DataFormat {
            path: path.to_string(),
            field,
            detail: detail.into(),
        }
    }

    /// Path of the offending node, when the error is tied to one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ViewerError::DataFormat { path, .. }
            | ViewerError::MissingGeometryData { path, .. }
            | ViewerError::UnsupportedLeafType { path, .. } => Some(path),
            ViewerError::Io { path, .. } => Some(path),
            ViewerError::StencilOrdering | ViewerError::Json(_) => None,
        }
    }
}
