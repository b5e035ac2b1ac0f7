//! Geometric operations on pixel buffers.
//!
//! Each function combines a [`calculations`](super::calculations) step with
//! the pixel work. All are pure: they borrow the input and return a freshly
//! allocated [`PixelBuffer`].

use super::buffer::{BYTES_PER_PIXEL, PixelBuffer, allocation_len};
use super::calculations::{
    calculate_crop_region, calculate_extend_canvas, calculate_resize_dimensions,
};
use super::params::{CropMode, ExtendMode, FillColor, ResizeMode};
use crate::error::{Error, Result};
use image::imageops::FilterType;

/// Resize with Lanczos3 resampling to the dimensions the mode calls for.
pub fn resize(image: &PixelBuffer, mode: &ResizeMode) -> Result<PixelBuffer> {
    let (width, height) = calculate_resize_dimensions(image.dimensions(), mode)?;
    log::debug!(
        "resize {}x{} -> {}x{} ({:?})",
        image.width(),
        image.height(),
        width,
        height,
        mode
    );

    if (width, height) == image.dimensions() {
        return Ok(image.clone());
    }
    allocation_len(width, height).map_err(|e| Error::Resize(e.to_string()))?;

    let rgba = image.to_rgba_image()?;
    let resized = image::imageops::resize(&rgba, width, height, FilterType::Lanczos3);
    Ok(PixelBuffer::from_rgba_image(resized))
}

/// Extract a sub-rectangle. Out-of-bounds regions are an error, never clamped.
pub fn crop(image: &PixelBuffer, mode: &CropMode) -> Result<PixelBuffer> {
    let region = calculate_crop_region(image.dimensions(), mode)?;
    log::debug!(
        "crop {}x{} -> {}x{} at ({}, {})",
        image.width(),
        image.height(),
        region.width,
        region.height,
        region.x,
        region.y
    );

    let src_stride = image.stride();
    let row_bytes = region.width as usize * BYTES_PER_PIXEL;
    let left = region.x as usize * BYTES_PER_PIXEL;
    let src = image.pixels();

    let mut data = Vec::with_capacity(row_bytes * region.height as usize);
    for row in region.y as usize..(region.y + region.height) as usize {
        let start = row * src_stride + left;
        data.extend_from_slice(&src[start..start + row_bytes]);
    }

    PixelBuffer::new(region.width, region.height, data)
}

/// Pad onto a larger canvas with the source centered.
///
/// When the canvas equals the source the result is a byte-identical copy.
pub fn extend(image: &PixelBuffer, mode: &ExtendMode, fill: FillColor) -> Result<PixelBuffer> {
    let canvas = calculate_extend_canvas(image.dimensions(), mode)?;

    if (canvas.width, canvas.height) == image.dimensions() {
        log::debug!("extend is a no-op for {}x{}", image.width(), image.height());
        return Ok(image.clone());
    }
    log::debug!(
        "extend {}x{} -> {}x{} at ({}, {})",
        image.width(),
        image.height(),
        canvas.width,
        canvas.height,
        canvas.offset_x,
        canvas.offset_y
    );

    allocation_len(canvas.width, canvas.height).map_err(|e| Error::Extend(e.to_string()))?;
    let background = PixelBuffer::filled(canvas.width, canvas.height, fill.rgba())?;
    let canvas_stride = background.stride();
    let mut data = background.into_pixels();

    let src_stride = image.stride();
    let left = canvas.offset_x as usize * BYTES_PER_PIXEL;
    for (row, src_row) in image.pixels().chunks_exact(src_stride).enumerate() {
        let start = (canvas.offset_y as usize + row) * canvas_stride + left;
        data[start..start + src_stride].copy_from_slice(src_row);
    }

    PixelBuffer::new(canvas.width, canvas.height, data)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=48, 1u32..=48)
    }

    fn ratio_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=21, 1u32..=21)
    }

    fn patterned(width: u32, height: u32) -> PixelBuffer {
        let data = (0..width * height * 4).map(|i| (i % 251) as u8).collect();
        PixelBuffer::new(width, height, data).unwrap()
    }

    proptest! {
        /// Fit never exceeds its bounds.
        #[test]
        fn prop_fit_within_bounds(
            (w, h) in dimensions_strategy(),
            (max_w, max_h) in dimensions_strategy(),
        ) {
            let img = patterned(w, h);
            if let Ok(out) = resize(&img, &ResizeMode::Fit(max_w, max_h)) {
                prop_assert!(out.width() <= max_w);
                prop_assert!(out.height() <= max_h);
                prop_assert_eq!(out.pixels().len(), (out.width() * out.height() * 4) as usize);
            }
        }

        /// Aspect crops keep one full source dimension and fit inside the source.
        #[test]
        fn prop_crop_aspect_keeps_one_dimension(
            (w, h) in dimensions_strategy(),
            (num, den) in ratio_strategy(),
        ) {
            let img = patterned(w, h);
            let out = crop(&img, &CropMode::AspectRatio { num, den }).unwrap();
            prop_assert!(out.width() <= w && out.height() <= h);
            prop_assert!(out.width() == w || out.height() == h);
        }

        /// Region crops succeed exactly when the region is non-empty and in bounds.
        #[test]
        fn prop_crop_region_bounds(
            (w, h) in dimensions_strategy(),
            (x, y) in (0u32..60, 0u32..60),
            (cw, ch) in (0u32..60, 0u32..60),
        ) {
            let img = patterned(w, h);
            let mode = CropMode::Region { x, y, width: cw, height: ch };
            let in_bounds = cw > 0 && ch > 0 && x + cw <= w && y + ch <= h;
            prop_assert_eq!(crop(&img, &mode).is_ok(), in_bounds);
        }

        /// Aspect extends never shrink and always contain the source unchanged.
        #[test]
        fn prop_extend_aspect_contains_source(
            (w, h) in dimensions_strategy(),
            (num, den) in ratio_strategy(),
        ) {
            let img = patterned(w, h);
            let before = img.clone();
            let out = extend(&img, &ExtendMode::AspectRatio { num, den }, FillColor::Transparent)
                .unwrap();
            prop_assert!(out.width() >= w && out.height() >= h);
            prop_assert!(out.width() == w || out.height() == h);
            let ox = (out.width() - w) / 2;
            let oy = (out.height() - h) / 2;
            prop_assert_eq!(out.pixel(ox, oy), img.pixel(0, 0));
            prop_assert_eq!(out.pixel(ox + w - 1, oy + h - 1), img.pixel(w - 1, h - 1));
            prop_assert_eq!(img, before);
        }
    }
}
