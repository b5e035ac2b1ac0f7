//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any pixels or I/O.
//!
//! ## Rounding
//!
//! Every non-integral dimension is rounded half-up (`f64::round`, which for
//! non-negative values rounds `.5` upward): 3.5 → 4, 2.5 → 3, 2.49 → 2.
//! Centering offsets use floor division, so an odd margin puts the extra
//! pixel on the right/bottom.
//!
//! Aspect-ratio comparisons are done in integer arithmetic
//! (`w * den` vs `h * num`) so that exactly matching ratios are never
//! misclassified by floating point error.

use super::params::{CropMode, ExtendMode, ResizeMode};
use crate::error::{Error, Result};

/// A rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An extended canvas and where the source lands on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// Round half-up to a pixel count.
fn round_px(value: f64) -> u32 {
    value.round() as u32
}

/// `value * num / den`, rounded.
fn scale_px(value: u32, num: u32, den: u32) -> u32 {
    round_px(value as f64 * num as f64 / den as f64)
}

/// Ordering of the source ratio `w:h` against the target `num:den`.
fn compare_ratio(w: u32, h: u32, num: u32, den: u32) -> std::cmp::Ordering {
    (w as u64 * den as u64).cmp(&(h as u64 * num as u64))
}

/// Calculate the target dimensions for a resize.
///
/// Fails with [`Error::Resize`] for an empty source, a non-positive or
/// non-finite scale factor, or when either computed dimension is zero.
pub fn calculate_resize_dimensions(original: (u32, u32), mode: &ResizeMode) -> Result<(u32, u32)> {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 {
        return Err(Error::Resize(format!(
            "cannot resize an empty {orig_w}x{orig_h} image"
        )));
    }

    let (w, h) = match *mode {
        ResizeMode::Width(target_w) => (target_w, scale_px(orig_h, target_w, orig_w)),
        ResizeMode::Height(target_h) => (scale_px(orig_w, target_h, orig_h), target_h),
        ResizeMode::Exact(w, h) => (w, h),
        ResizeMode::Fit(max_w, max_h) => {
            let ratio_w = max_w as f64 / orig_w as f64;
            let ratio_h = max_h as f64 / orig_h as f64;
            let ratio = ratio_w.min(ratio_h);
            (
                round_px(orig_w as f64 * ratio).min(max_w),
                round_px(orig_h as f64 * ratio).min(max_h),
            )
        }
        ResizeMode::Scale(factor) => {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(Error::Resize(format!(
                    "scale factor must be positive, got {factor}"
                )));
            }
            (
                round_px(orig_w as f64 * factor),
                round_px(orig_h as f64 * factor),
            )
        }
    };

    if w == 0 || h == 0 {
        return Err(Error::Resize(format!(
            "calculated dimensions are zero: {w}x{h}"
        )));
    }

    Ok((w, h))
}

/// Calculate the region a crop keeps.
///
/// `Region` fails with [`Error::Crop`] when empty or out of bounds; it is
/// never clamped. `AspectRatio` keeps one full source dimension and centers
/// along the other.
pub fn calculate_crop_region(image: (u32, u32), mode: &CropMode) -> Result<Region> {
    let (img_w, img_h) = image;
    match *mode {
        CropMode::Region {
            x,
            y,
            width,
            height,
        } => {
            if width == 0 || height == 0 {
                return Err(Error::Crop("crop dimensions must be non-zero".to_string()));
            }
            if x as u64 + width as u64 > img_w as u64 || y as u64 + height as u64 > img_h as u64 {
                return Err(Error::Crop(format!(
                    "crop region ({x},{y},{width},{height}) exceeds image bounds ({img_w}x{img_h})"
                )));
            }
            Ok(Region {
                x,
                y,
                width,
                height,
            })
        }
        CropMode::AspectRatio { num, den } => {
            if num == 0 || den == 0 {
                return Err(Error::Crop("aspect ratio must be non-zero".to_string()));
            }
            if img_w == 0 || img_h == 0 {
                return Err(Error::Crop(format!(
                    "cannot crop an empty {img_w}x{img_h} image"
                )));
            }

            if compare_ratio(img_w, img_h, num, den).is_gt() {
                // Wider than target: keep full height, trim the sides
                let width = scale_px(img_h, num, den).clamp(1, img_w);
                Ok(Region {
                    x: (img_w - width) / 2,
                    y: 0,
                    width,
                    height: img_h,
                })
            } else {
                // Taller or equal: keep full width, trim top and bottom
                let height = scale_px(img_w, den, num).clamp(1, img_h);
                Ok(Region {
                    x: 0,
                    y: (img_h - height) / 2,
                    width: img_w,
                    height,
                })
            }
        }
    }
}

/// Calculate the extended canvas and the offset of the source on it.
///
/// `Size` fails with [`Error::Extend`] if it would shrink either dimension.
/// `AspectRatio` grows only the deficient dimension; a source already at the
/// ratio yields a canvas equal to the source.
pub fn calculate_extend_canvas(image: (u32, u32), mode: &ExtendMode) -> Result<Canvas> {
    let (img_w, img_h) = image;
    let (width, height) = match *mode {
        ExtendMode::Size { width, height } => {
            if width == 0 || height == 0 {
                return Err(Error::Extend(
                    "extend dimensions must be non-zero".to_string(),
                ));
            }
            if width < img_w || height < img_h {
                return Err(Error::Extend(format!(
                    "target size ({width}x{height}) is smaller than image ({img_w}x{img_h})"
                )));
            }
            (width, height)
        }
        ExtendMode::AspectRatio { num, den } => {
            if num == 0 || den == 0 {
                return Err(Error::Extend("aspect ratio must be non-zero".to_string()));
            }
            if img_w == 0 || img_h == 0 {
                return Err(Error::Extend(format!(
                    "cannot extend an empty {img_w}x{img_h} image"
                )));
            }

            if compare_ratio(img_w, img_h, num, den).is_lt() {
                // Narrower than target: widen
                (scale_px(img_h, num, den).max(img_w), img_h)
            } else {
                // Wider or equal: heighten
                (img_w, scale_px(img_w, den, num).max(img_h))
            }
        }
    };

    Ok(Canvas {
        width,
        height,
        offset_x: (width - img_w) / 2,
        offset_y: (height - img_h) / 2,
    })
}
