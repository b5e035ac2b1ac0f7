//! Raw RGBA8 pixel buffer.

use crate::error::{Error, Result};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest buffer a transform will allocate: 512 MiB, the same ceiling the
/// `image` crate puts on decoding.
pub const MAX_BUFFER_BYTES: usize = 512 * 1024 * 1024;

/// Decoded image as row-major RGBA8 with no row padding.
///
/// `pixels.len() == width * height * 4` always holds. Buffers are values:
/// every transform produces a new one and never touches its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing RGBA8 data, validating its length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height)?;
        if pixels.len() != expected {
            return Err(Error::InvalidBuffer(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = allocation_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..len / BYTES_PER_PIXEL {
            pixels.extend_from_slice(&rgba);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from the `image` crate's RGBA buffer (length is guaranteed there).
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// RGBA value at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let px = &self.pixels[i..i + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy into an `image::RgbaImage` for the resampler and encoders.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(|| {
            Error::InvalidBuffer(format!(
                "cannot view {}x{} buffer ({} bytes) as RGBA",
                self.width,
                self.height,
                self.pixels.len()
            ))
        })
    }

    /// Drop the alpha channel.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .flat_map(|px| &px[..3])
            .copied()
            .collect()
    }
}

fn byte_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| Error::InvalidBuffer(format!("{width}x{height} overflows memory")))
}

/// Byte length of a new `width`x`height` buffer, refusing anything over
/// [`MAX_BUFFER_BYTES`].
pub fn allocation_len(width: u32, height: u32) -> Result<usize> {
    let len = byte_len(width, height)?;
    if len > MAX_BUFFER_BYTES {
        return Err(Error::InvalidBuffer(format!(
            "{width}x{height} needs {len} bytes, over the {MAX_BUFFER_BYTES} byte limit"
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_matching_length() {
        let buf = PixelBuffer::new(3, 2, vec![0; 24]).unwrap();
        assert_eq!(buf.dimensions(), (3, 2));
        assert_eq!(buf.stride(), 12);
    }

    #[test]
    fn new_rejects_wrong_length() {
        let result = PixelBuffer::new(2, 2, vec![0; 10]);
        assert!(matches!(result, Err(Error::InvalidBuffer(_))));
    }

    #[test]
    fn filled_sets_every_pixel() {
        let buf = PixelBuffer::filled(2, 3, [1, 2, 3, 4]).unwrap();
        assert_eq!(buf.pixels().len(), 24);
        assert!(buf.pixels().chunks_exact(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn allocation_len_enforces_limit() {
        assert_eq!(allocation_len(8, 2).unwrap(), 64);
        assert!(matches!(
            allocation_len(100_000, 100_000),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(matches!(
            allocation_len(u32::MAX, u32::MAX),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(matches!(
            PixelBuffer::filled(70_000, 70_000, [0; 4]),
            Err(Error::InvalidBuffer(_))
        ));
    }

    #[test]
    fn pixel_lookup_and_bounds() {
        let buf = PixelBuffer::new(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 128]).unwrap();
        assert_eq!(buf.pixel(1, 0), Some([40, 50, 60, 128]));
        assert_eq!(buf.pixel(2, 0), None);
        assert_eq!(buf.pixel(0, 1), None);
    }

    #[test]
    fn to_rgb_drops_alpha() {
        let buf = PixelBuffer::new(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 128]).unwrap();
        assert_eq!(buf.to_rgb(), vec![255, 0, 0, 0, 255, 0]);
    }

    #[test]
    fn rgba_image_roundtrip_keeps_data() {
        let buf = PixelBuffer::filled(4, 3, [9, 8, 7, 6]).unwrap();
        let back = PixelBuffer::from_rgba_image(buf.to_rgba_image().unwrap());
        assert_eq!(back, buf);
    }
}
