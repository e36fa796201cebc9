pub mod selection;
pub mod settings;

pub use selection::SelectionState;
pub use settings::{CapTheme, RenderOptions, ViewerSettings, ViewportSettings};
