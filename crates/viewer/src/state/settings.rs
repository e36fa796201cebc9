//! Viewer settings

use serde::{Deserialize, Serialize};

use crate::viewport::material::Color;

/// Cap color palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapTheme {
    #[default]
    Light,
    Dark,
}

impl CapTheme {
    /// Per-axis cap colors (x, y, z)
    pub fn cap_colors(&self) -> [Color; 3] {
        match self {
            CapTheme::Light => [Color(0xff0000), Color(0x00ff00), Color(0x0000ff)],
            CapTheme::Dark => [Color(0xff4500), Color(0x32cd32), Color(0x3b9eff)],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CapTheme::Light => "Light",
            CapTheme::Dark => "Dark",
        }
    }

    pub fn all() -> &'static [CapTheme] {
        &[CapTheme::Light, CapTheme::Dark]
    }
}

/// Runtime options consumed while building and mutating the scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Color of solid edges and exploded vertices, `"#rrggbb"`
    pub edge_color: String,
    /// Opacity applied while a unit is transparent (0.0 - 1.0)
    pub default_opacity: f32,
    pub metalness: f32,
    pub roughness: f32,
    /// Start with every unit transparent
    pub transparent: bool,
    /// Length of the normals helper lines; 0 disables them
    pub normal_len: f32,
    /// Draw back faces of every solid
    pub back_visible: bool,
    /// Draw solid edges in black
    pub black_edges: bool,
    /// Split solids into per-face / edge / vertex leaves
    pub exploded: bool,
    /// Keep only fragments on the inside of all clip planes
    pub clip_intersection: bool,
    /// Paint caps in the capped solid's color instead of the axis color
    pub object_color_caps: bool,
    pub cap_theme: CapTheme,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            edge_color: "#707070".to_string(),
            default_opacity: 0.5,
            metalness: 0.3,
            roughness: 0.65,
            transparent: false,
            normal_len: 0.0,
            back_visible: false,
            black_edges: false,
            exploded: false,
            clip_intersection: false,
            object_color_caps: false,
            cap_theme: CapTheme::Light,
        }
    }
}

impl RenderOptions {
    /// Edge color, falling back to the default gray on a malformed string
    pub fn edge_color(&self) -> Color {
        Color::from_hex(&self.edge_color).unwrap_or(Color(0x707070))
    }
}

/// Viewport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    /// Background color RGB
    pub background_color: [u8; 3],
    /// Enable anti-aliasing
    pub antialiasing: bool,
    /// Show the clipping side panel on start
    pub show_clipping_panel: bool,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            background_color: [30, 30, 35],
            antialiasing: true,
            show_clipping_panel: true,
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub viewport: ViewportSettings,
}

impl ViewerSettings {
    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        if let Some(dirs) = directories::ProjectDirs::from("com", "cad-viewer", "cad-viewer") {
            let config_path = dirs.config_dir().join("settings.json");
            if let Ok(json) = std::fs::read_to_string(&config_path) {
                match serde_json::from_str(&json) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("Ignoring corrupt settings file: {e}"),
                }
            }
        }
        Self::default()
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(dirs) = directories::ProjectDirs::from("com", "cad-viewer", "cad-viewer") {
            let config_dir = dirs.config_dir();
            if std::fs::create_dir_all(config_dir).is_ok() {
                let config_path = config_dir.join("settings.json");
                if let Ok(json) = serde_json::to_string_pretty(self) {
                    let _ = std::fs::write(config_path, json);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_fill_defaults() {
        let opts: RenderOptions = serde_json::from_str(r#"{ "exploded": true }"#).unwrap();
        assert!(opts.exploded);
        assert_eq!(opts.edge_color, "#707070");
        assert_eq!(opts.cap_theme, CapTheme::Light);
    }

    #[test]
    fn test_settings_round_trip() {
        let mut s = ViewerSettings::default();
        s.render.cap_theme = CapTheme::Dark;
        s.viewport.antialiasing = false;
        let json = serde_json::to_string(&s).unwrap();
        let back: ViewerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.render, s.render);
        assert!(!back.viewport.antialiasing);
    }

    #[test]
    fn test_theme_colors() {
        assert_eq!(CapTheme::Light.cap_colors()[0], Color(0xff0000));
        assert_eq!(CapTheme::Dark.cap_colors()[2], Color(0x3b9eff));
    }

    #[test]
    fn test_bad_edge_color_falls_back() {
        let opts = RenderOptions {
            edge_color: "grey".into(),
            ..Default::default()
        };
        assert_eq!(opts.edge_color(), Color(0x707070));
    }
}
