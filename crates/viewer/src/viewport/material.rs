//! CPU-side material state consumed by the GL renderer.
//!
//! Materials are plain values. Clip planes are referenced by index into the
//! clipping system, so moving a plane never touches a material.

use serde::{Deserialize, Serialize};

/// 24-bit RGB color stored as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xffffff);
    pub const BLACK: Color = Color(0x000000);

    /// Parse `"#rrggbb"` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Color)
    }

    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0)
    }

    pub fn rgb_u8(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    pub fn rgb_f32(self) -> [f32; 3] {
        let [r, g, b] = self.rgb_u8();
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }

    pub fn from_rgb_f32(rgb: [f32; 3]) -> Color {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        Color((c(rgb[0]) << 16) | (c(rgb[1]) << 8) | c(rgb[2]))
    }

    /// Linear blend toward `other` by `t` (0 keeps `self`).
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let a = self.rgb_f32();
        let b = other.rgb_f32();
        Color::from_rgb_f32([
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
        ])
    }
}

/// Which triangle winding a material rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Always,
    Never,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementWrap,
    DecrementWrap,
}

/// Stencil test and update for one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    pub func: CompareFunc,
    pub reference: i32,
    pub mask: u32,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl StencilState {
    /// Unconditionally apply `op` on every outcome.
    pub fn always(op: StencilOp) -> Self {
        Self {
            func: CompareFunc::Always,
            reference: 0,
            mask: 0xff,
            fail: op,
            depth_fail: op,
            pass: op,
        }
    }

    /// Pass where the stored value differs from zero, then reset it to zero.
    pub fn not_zero_then_reset() -> Self {
        Self {
            func: CompareFunc::NotEqual,
            reference: 0,
            mask: 0xff,
            fail: StencilOp::Replace,
            depth_fail: StencilOp::Replace,
            pass: StencilOp::Replace,
        }
    }
}

/// Which clip planes apply to a draw.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClipBinding {
    #[default]
    None,
    /// Indices into the clipping system's planes.
    Planes(Vec<usize>),
}

impl ClipBinding {
    pub fn planes(&self) -> &[usize] {
        match self {
            ClipBinding::None => &[],
            ClipBinding::Planes(p) => p,
        }
    }
}

/// Render state for a single sub-mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub color_write: bool,
    pub side: Side,
    pub line_width: f32,
    pub point_size: f32,
    /// Use the geometry's per-vertex colors instead of `color`.
    pub vertex_colors: bool,
    /// Polygon offset (factor, units) so edges draw on top of faces.
    pub polygon_offset: Option<(f32, f32)>,
    pub stencil: Option<StencilState>,
    pub clipping: ClipBinding,
    /// Keep only fragments inside all planes instead of any plane.
    pub clip_intersection: bool,
    pub metalness: f32,
    pub roughness: f32,
}

impl Material {
    pub fn surface(color: Color, side: Side) -> Self {
        Self {
            color,
            opacity: 1.0,
            transparent: false,
            depth_write: true,
            depth_test: true,
            color_write: true,
            side,
            line_width: 1.0,
            point_size: 1.0,
            vertex_colors: false,
            polygon_offset: Some((1.0, 1.0)),
            stencil: None,
            clipping: ClipBinding::None,
            clip_intersection: false,
            metalness: 0.3,
            roughness: 0.65,
        }
    }

    pub fn line(color: Color, width: f32) -> Self {
        Self {
            line_width: width,
            polygon_offset: None,
            ..Self::surface(color, Side::Double)
        }
    }

    pub fn points(color: Color, size: f32) -> Self {
        Self {
            point_size: size,
            polygon_offset: None,
            ..Self::surface(color, Side::Double)
        }
    }

    /// Invisible material that only updates the stencil buffer.
    pub fn stencil_only(side: Side, op: StencilOp) -> Self {
        Self {
            depth_write: false,
            depth_test: false,
            color_write: false,
            polygon_offset: None,
            stencil: Some(StencilState::always(op)),
            ..Self::surface(Color::BLACK, side)
        }
    }
}
