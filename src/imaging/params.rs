//! Parameter types for image operations.
//!
//! These describe *what* to do to a buffer; [`operations`](super::operations)
//! does the pixel work and [`calculations`](super::calculations) the math.
//!
//! ## Types
//!
//! - [`Quality`]: Encoder quality (0–100, default 80). Clamped on construction, never rejected.
//! - [`ResizeMode`]: Target dimensions by width, height, exact size, bounding box or factor.
//! - [`CropMode`]: Explicit region or centered aspect-ratio crop.
//! - [`ExtendMode`]: Pad to an exact canvas or to an aspect ratio.
//! - [`FillColor`]: What padding pixels are filled with.

/// Quality setting passed to encoders (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// How to resize an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeMode {
    /// Set width, derive height preserving aspect ratio.
    Width(u32),
    /// Set height, derive width preserving aspect ratio.
    Height(u32),
    /// Exact dimensions; may distort.
    Exact(u32, u32),
    /// Largest size fitting within `(max_w, max_h)`, preserving aspect ratio.
    Fit(u32, u32),
    /// Multiply both dimensions by a factor (e.g. 0.5 = half size).
    Scale(f64),
}

/// How to crop an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// The rectangle `[x, x+width) × [y, y+height)`.
    Region {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Largest centered region with ratio `num:den`.
    AspectRatio { num: u32, den: u32 },
}

/// How to extend (pad) an image. The source is always centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendMode {
    /// Canvas of exactly `width × height`; never smaller than the source.
    Size { width: u32, height: u32 },
    /// Smallest canvas with ratio `num:den` containing the source.
    AspectRatio { num: u32, den: u32 },
}

/// Fill for padded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillColor {
    /// RGBA (0, 0, 0, 0).
    #[default]
    Transparent,
    /// A constant RGBA value.
    Solid([u8; 4]),
}

impl FillColor {
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Transparent => [0, 0, 0, 0],
            Self::Solid(rgba) => rgba,
        }
    }
}
