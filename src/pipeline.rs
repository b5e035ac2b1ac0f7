//! Decoding and the transform pipeline.
//!
//! Bytes come in, a [`DecodeResult`] comes out; [`convert`] runs the
//! geometry steps and encodes; [`optimize`] re-encodes in the source format.
//!
//! ## Step order
//!
//! [`convert`] always applies the steps present in [`PipelineOptions`] in the
//! same order, whatever order they were set in:
//!
//! ```text
//! resize → crop → extend (fill, default transparent) → encode
//! ```
//!
//! Every entry point has a `*_with` variant that takes an explicit
//! [`Codec`]; the plain variants use [`RustCodec`].

use crate::error::{Error, Result};
use crate::format::Format;
use crate::imaging::{
    Codec, CropMode, ExtendMode, FillColor, PixelBuffer, Quality, ResizeMode, RustCodec, operations,
};
use std::io::Read;
use std::path::Path;

pub use crate::imaging::{crop, extend, resize};

/// A decoded image and the format its bytes were detected as.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub image: PixelBuffer,
    pub format: Format,
}

/// Encoded output of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub data: Vec<u8>,
    pub format: Format,
}

impl PipelineResult {
    /// Write the encoded bytes to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// What [`convert`] should do. Unset steps are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub format: Format,
    /// 0–100; clamped when the encoder sees it.
    pub quality: u8,
    pub resize: Option<ResizeMode>,
    pub crop: Option<CropMode>,
    pub extend: Option<ExtendMode>,
    pub fill: Option<FillColor>,
}

impl PipelineOptions {
    pub fn new(format: Format, quality: u8) -> Self {
        Self {
            format,
            quality,
            resize: None,
            crop: None,
            extend: None,
            fill: None,
        }
    }

    pub fn with_resize(mut self, mode: ResizeMode) -> Self {
        self.resize = Some(mode);
        self
    }

    pub fn with_crop(mut self, mode: CropMode) -> Self {
        self.crop = Some(mode);
        self
    }

    pub fn with_extend(mut self, mode: ExtendMode) -> Self {
        self.extend = Some(mode);
        self
    }

    pub fn with_fill(mut self, fill: FillColor) -> Self {
        self.fill = Some(fill);
        self
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Detect the format from magic bytes and decode with [`RustCodec`].
pub fn decode(data: &[u8]) -> Result<DecodeResult> {
    decode_with(data, &RustCodec::new())
}

/// Detect the format from magic bytes and decode with `codec`.
pub fn decode_with(data: &[u8], codec: &impl Codec) -> Result<DecodeResult> {
    let format = Format::from_magic_bytes(data).ok_or_else(|| {
        let shown = data.len().min(8);
        Error::UnknownFormat(format!(
            "unrecognised signature {:02X?} ({} bytes)",
            &data[..shown],
            data.len()
        ))
    })?;

    let image = codec.decode(format, data)?;
    log::debug!(
        "decoded {} {}x{} from {} bytes",
        format,
        image.width(),
        image.height(),
        data.len()
    );
    Ok(DecodeResult { image, format })
}

/// Read a whole file and [`decode`] it. The file is closed before decoding.
pub fn decode_file(path: &Path) -> Result<DecodeResult> {
    decode_file_with(path, &RustCodec::new())
}

pub fn decode_file_with(path: &Path, codec: &impl Codec) -> Result<DecodeResult> {
    let data = std::fs::read(path)?;
    decode_with(&data, codec)
}

/// Drain `reader` and [`decode`] the collected bytes.
pub fn decode_reader(reader: impl Read) -> Result<DecodeResult> {
    decode_reader_with(reader, &RustCodec::new())
}

pub fn decode_reader_with(mut reader: impl Read, codec: &impl Codec) -> Result<DecodeResult> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode_with(&data, codec)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the geometry steps in `options` over `image`, then encode.
pub fn convert(image: &PixelBuffer, options: &PipelineOptions) -> Result<PipelineResult> {
    convert_with(image, options, &RustCodec::new())
}

pub fn convert_with(
    image: &PixelBuffer,
    options: &PipelineOptions,
    codec: &impl Codec,
) -> Result<PipelineResult> {
    // Fail before spending time on geometry that can never be written out
    if !options.format.can_encode() {
        return Err(Error::EncodeUnsupported(options.format));
    }

    let transformed = apply_geometry(image, options)?;
    let quality = Quality::new(options.quality);
    let data = codec.encode(options.format, &transformed, quality)?;
    log::info!(
        "encoded {} {}x{} at quality {} ({} bytes)",
        options.format,
        transformed.width(),
        transformed.height(),
        quality.value(),
        data.len()
    );

    Ok(PipelineResult {
        data,
        format: options.format,
    })
}

/// Resize, crop and extend per `options`, without encoding.
///
/// Returns a copy of `image` when no step is set.
pub fn apply_geometry(image: &PixelBuffer, options: &PipelineOptions) -> Result<PixelBuffer> {
    let mut current = image.clone();
    if let Some(mode) = &options.resize {
        current = operations::resize(&current, mode)?;
    }
    if let Some(mode) = &options.crop {
        current = operations::crop(&current, mode)?;
    }
    if let Some(mode) = &options.extend {
        current = operations::extend(&current, mode, options.fill.unwrap_or_default())?;
    }
    Ok(current)
}

/// Decode `data` and re-encode it in the detected format at `quality`.
pub fn optimize(data: &[u8], quality: u8) -> Result<PipelineResult> {
    optimize_with(data, quality, &RustCodec::new())
}

pub fn optimize_with(data: &[u8], quality: u8, codec: &impl Codec) -> Result<PipelineResult> {
    let format = Format::from_magic_bytes(data)
        .ok_or_else(|| Error::UnknownFormat("unrecognised signature".to_string()))?;
    if !format.can_encode() {
        return Err(Error::EncodeUnsupported(format));
    }

    let decoded = decode_with(data, codec)?;
    convert_with(&decoded.image, &PipelineOptions::new(format, quality), codec)
}
