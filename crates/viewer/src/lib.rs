// Library crate: the scene graph core and everything testable without a window.
// The egui shell, camera and GL renderer stay in the binary crate.

pub mod build;
pub mod codec;
pub mod command;
pub mod decompose;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod state;
pub mod validation;

/// Scene-side viewport types: meshes, materials, render units, clipping,
/// the frame plan and picking. GL execution lives in the binary.
pub mod viewport {
    pub mod clipping;
    pub mod frame;
    pub mod material;
    pub mod mesh;
    pub mod picking;
    pub mod render_unit;
}

pub use error::{Result, ViewerError};
