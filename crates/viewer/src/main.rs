mod app;
mod viewport;

// Re-export library modules so that `crate::build`, `crate::harness`, etc.
// resolve to the lib crate types everywhere in the binary.
pub use cad_viewer_lib::build;
pub use cad_viewer_lib::harness;
pub use cad_viewer_lib::state;

use app::ViewerApp;
use shared::ShapeNode;

/// Command line options
#[derive(Debug, Default)]
struct Args {
    model: Option<ShapeNode>,
    explode: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cad_viewer=info,cad_viewer_lib=info".into()),
        )
        .init();

    let args = parse_args();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("CAD Viewer")
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        // caps need a stencil buffer
        depth_buffer: 24,
        stencil_buffer: 8,
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "cad-viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, args.model, args.explode)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }
}

/// `--model <path>` loads a shape tree JSON on start, `--explode` starts in
/// exploded mode.
fn parse_args() -> Args {
    let mut args = Args::default();
    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--explode" => args.explode = true,
            "--model" if i + 1 < argv.len() => {
                i += 1;
                args.model = read_model(&argv[i]);
            }
            other => tracing::warn!("Ignoring unknown argument {other}"),
        }
        i += 1;
    }
    args
}

fn read_model(path: &str) -> Option<ShapeNode> {
    match harness::read_model(std::path::Path::new(path)) {
        Ok(tree) => Some(tree),
        Err(e) => {
            tracing::error!("Failed to load model: {e}");
            None
        }
    }
}
