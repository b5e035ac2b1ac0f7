//! Production codec, statically linked with no system libraries.
//!
//! ## Crate mapping
//!
//! | Format | Decode | Encode |
//! |---|---|---|
//! | JPEG | `image` | `image::codecs::jpeg::JpegEncoder` (RGB, quality 1–100) |
//! | PNG | `image` | `image::codecs::png::PngEncoder` (quality picks compression) |
//! | WebP | `image` | `webp` (bundled libwebp; lossy below q100, lossless at q100) |
//! | AVIF | `avif-parse` (container) + `rav1d` (AV1) + BT.601 YUV→RGB | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | QOI | `image` | `image::codecs::qoi::QoiEncoder` (lossless) |
//! | JXL | `jxl-oxide` | not supported |

use super::buffer::PixelBuffer;
use super::codec::Codec;
use super::params::Quality;
use crate::error::{Error, Result};
use crate::format::Format;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use std::io::Cursor;

/// AVIF encoder speed (0 slowest/best … 10 fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-format mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for RustCodec {
    fn decode(&self, format: Format, data: &[u8]) -> Result<PixelBuffer> {
        match format {
            Format::Jpeg => decode_with_image(data, ImageFormat::Jpeg),
            Format::Png => decode_with_image(data, ImageFormat::Png),
            Format::WebP => decode_with_image(data, ImageFormat::WebP),
            Format::Qoi => decode_with_image(data, ImageFormat::Qoi),
            Format::Avif => decode_avif(data),
            Format::Jxl => decode_jxl(data),
        }
    }

    fn encode(&self, format: Format, image: &PixelBuffer, quality: Quality) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        let mut buffer = Vec::new();
        let cursor = Cursor::new(&mut buffer);

        let written = match format {
            Format::Jpeg => {
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    cursor,
                    quality.value().max(1),
                );
                encoder.write_image(&image.to_rgb(), width, height, ExtendedColorType::Rgb8)
            }
            Format::Png => {
                use image::codecs::png::{CompressionType, FilterType, PngEncoder};
                let compression = match quality.value() {
                    90.. => CompressionType::Best,
                    50..=89 => CompressionType::Default,
                    _ => CompressionType::Fast,
                };
                PngEncoder::new_with_quality(cursor, compression, FilterType::Adaptive)
                    .write_image(image.pixels(), width, height, ExtendedColorType::Rgba8)
            }
            Format::WebP => return encode_webp(image, quality),
            Format::Avif => image::codecs::avif::AvifEncoder::new_with_speed_quality(
                cursor,
                AVIF_SPEED,
                quality.value().max(1),
            )
            .write_image(image.pixels(), width, height, ExtendedColorType::Rgba8),
            Format::Qoi => image::codecs::qoi::QoiEncoder::new(cursor).write_image(
                image.pixels(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            Format::Jxl => return Err(Error::EncodeUnsupported(Format::Jxl)),
        };

        written.map_err(|e| Error::Encode(format!("{format} encode failed: {e}")))?;
        Ok(buffer)
    }
}

/// Decode via the `image` crate and normalise to RGBA8.
fn decode_with_image(data: &[u8], format: ImageFormat) -> Result<PixelBuffer> {
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| Error::Decode(format!("{format:?} decode: {e}")))?;
    Ok(PixelBuffer::from_rgba_image(img.to_rgba8()))
}

/// Encode with libwebp. Quality 100 switches to lossless mode.
fn encode_webp(image: &PixelBuffer, quality: Quality) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    let lossless = quality.value() >= 100;
    let encoded = webp::Encoder::from_rgba(image.pixels(), width, height)
        .encode_simple(lossless, f32::from(quality.value()))
        .map_err(|e| Error::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(encoded.to_vec())
}

/// Decode a JPEG XL codestream or container with `jxl-oxide`.
fn decode_jxl(data: &[u8]) -> Result<PixelBuffer> {
    let image = jxl_oxide::JxlImage::builder()
        .read(Cursor::new(data))
        .map_err(|e| Error::Decode(format!("jxl decode: {e}")))?;
    let render = image
        .render_frame(0)
        .map_err(|e| Error::Decode(format!("jxl render: {e}")))?;

    let frame = render.image_all_channels();
    let rgba = interleaved_to_rgba(frame.buf(), frame.channels())?;
    PixelBuffer::new(frame.width() as u32, frame.height() as u32, rgba)
}

/// Expand interleaved float samples (0.0–1.0) to RGBA8.
///
/// One channel is grey, two are grey + alpha, three are RGB. From four on,
/// the first four are RGBA and the rest are dropped.
fn interleaved_to_rgba(samples: &[f32], channels: usize) -> Result<Vec<u8>> {
    if channels == 0 {
        return Err(Error::Decode("jxl image has no channels".to_string()));
    }

    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut rgba = Vec::with_capacity(samples.len() / channels * 4);
    for px in samples.chunks_exact(channels) {
        let pixel = match channels {
            1 => [to_u8(px[0]), to_u8(px[0]), to_u8(px[0]), 255],
            2 => [to_u8(px[0]), to_u8(px[0]), to_u8(px[0]), to_u8(px[1])],
            3 => [to_u8(px[0]), to_u8(px[1]), to_u8(px[2]), 255],
            _ => [to_u8(px[0]), to_u8(px[1]), to_u8(px[2]), to_u8(px[3])],
        };
        rgba.extend_from_slice(&pixel);
    }
    Ok(rgba)
}

/// Decode an AVIF file using avif-parse (container) + rav1d (AV1 decode).
///
/// The `image` crate's `"avif"` feature only provides the encoder (rav1e).
/// Decoding there requires `"avif-native"`, which links the C library dav1d;
/// `rav1d` is its pure Rust port. The colour item and, when present, the
/// alpha item are decoded separately and merged.
fn decode_avif(data: &[u8]) -> Result<PixelBuffer> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| Error::Decode(format!("Failed to parse AVIF container: {e:?}")))?;

    let (width, height, mut rgba) = decode_av1(&avif.primary_item, picture_to_rgba)?;
    if let Some(alpha_item) = avif.alpha_item.as_deref() {
        let (alpha_w, alpha_h, alpha) = decode_av1(alpha_item, picture_to_alpha)?;
        if (alpha_w, alpha_h) != (width, height) {
            return Err(Error::Decode(format!(
                "AVIF alpha plane is {alpha_w}x{alpha_h}, colour is {width}x{height}"
            )));
        }
        merge_alpha(&mut rgba, &alpha, avif.premultiplied_alpha);
    }

    PixelBuffer::new(width, height, rgba)
}

/// Run one AV1 payload through rav1d and hand the picture to `convert`.
///
/// The picture and decoder context are released on every path.
fn decode_av1<F>(av1_bytes: &[u8], convert: F) -> Result<(u32, u32, Vec<u8>)>
where
    F: FnOnce(&rav1d::include::dav1d::picture::Dav1dPicture) -> Result<(u32, u32, Vec<u8>)>,
{
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| Error::Decode("rav1d settings allocation failed".into()))?;
    unsafe { rav1d::src::lib::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(Error::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let mut input = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut input), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(Error::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut input)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut input));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(Error::Decode(format!("rav1d send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(Error::Decode(format!("rav1d get_picture failed ({})", rc.0)));
    }

    // Convert while the picture is alive
    let converted = convert(&pic);
    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }
    converted
}

/// Read the luma plane of a decoded alpha picture as 8-bit alpha.
///
/// AVIF alpha is always coded full range, so samples scale linearly.
fn picture_to_alpha(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<(u32, u32, Vec<u8>)> {
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let y_ptr = pic.data[0]
        .map(|p| p.as_ptr() as *const u8)
        .ok_or_else(|| Error::Decode("AVIF alpha picture has no plane".to_string()))?;

    let scale = 255.0 / ((1u32 << bpc) - 1) as f32;
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        for col in 0..width {
            let sample = read_sample(y_ptr, pic.stride[0], col, row, bpc);
            alpha.push((sample * scale).round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok((width, height, alpha))
}

/// Write `alpha` into channel 3 of `rgba`. Premultiplied colour is divided
/// back out.
fn merge_alpha(rgba: &mut [u8], alpha: &[u8], premultiplied: bool) {
    for (px, &a) in rgba.chunks_exact_mut(4).zip(alpha) {
        px[3] = a;
        if premultiplied && a > 0 && a < 255 {
            for channel in px.iter_mut().take(3) {
                let straight = (u32::from(*channel) * 255 + u32::from(a) / 2) / u32::from(a);
                *channel = straight.min(255) as u8;
            }
        }
    }
}

/// Read the planes of a decoded picture into interleaved RGBA8.
fn picture_to_rgba(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<(u32, u32, Vec<u8>)> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let layout = pic.p.layout;
    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| Error::Decode(format!("AVIF picture is missing plane {i}")))
    };
    let y_ptr = plane(0)?;

    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }
    } else {
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                return Err(Error::Decode(format!(
                    "Unsupported AVIF pixel layout: {layout}"
                )));
            }
        };
        YuvPlanes {
            y_ptr,
            u_ptr: plane(1)?,
            v_ptr: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x,
            ss_y,
            monochrome: false,
        }
    };

    Ok((width, height, planes.to_rgba()))
}

/// Decoded YUV plane data from rav1d, ready for RGB conversion.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (e.g. I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Convert to interleaved opaque RGBA8 using BT.601 coefficients.
    fn to_rgba(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);

        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);

                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb =
                        read_sample(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    let cr =
                        read_sample(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };

                rgba.extend_from_slice(&[r as u8, g as u8, b as u8, 255]);
            }
        }

        rgba
    }
}

/// Read one sample from a plane; 10/12-bit samples are stored as u16.
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}
