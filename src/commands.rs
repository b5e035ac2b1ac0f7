//! Command surface for front ends (GUI, CLI).
//!
//! Each command works on file paths and returns serialisable results, so a
//! front end can hand them straight to its own transport.
//!
//! | Command | Returns |
//! |---|---|
//! | [`scan_directory`] | sorted image paths under a directory |
//! | [`load_image`] | [`ImageInfo`] with a base64 PNG thumbnail |
//! | [`process_image`] | [`ProcessResult`]; the output is written to disk |
//! | [`preview_image`] | [`PreviewResult`]; nothing is written |
//! | [`process_batch`] | a [`BatchReport`] plus progress events |
//!
//! ## Option mapping
//!
//! [`ProcessOptions`] carries an operation tag and loosely-typed parameters.
//! [`build_pipeline_options`] turns them into [`PipelineOptions`]:
//!
//! ```text
//! convert  → format/quality only
//! optimize → source format, quality only
//! resize   → resize_mode: width(width) | height(height) | exact(width, height)
//!                         | fit(width, height) | scale(scale)
//! crop     → crop_mode:   region(x=0, y=0, width, height) | aspect(width=1 : height=1)
//! extend   → extend_mode: aspect(width=1 : height=1) | size(width, height)
//! ```

use crate::batch::{BatchProgress, BatchReport, run_batch};
use crate::error::Error;
use crate::format::{self, Format};
use crate::imaging::{
    Codec, CropMode, ExtendMode, FillColor, PixelBuffer, Quality, ResizeMode, RustCodec,
};
use crate::pipeline::{self, PipelineOptions, PipelineResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Thumbnails fit within a square of this many pixels unless configured.
pub const THUMBNAIL_MAX_DIMENSION: u32 = 400;
const THUMBNAIL_PNG_QUALITY: u8 = 90;
/// Highest `_<n>` suffix tried before giving up on a unique output name.
const MAX_UNIQUE_ATTEMPTS: u32 = 9999;
const TEMP_SUFFIX: &str = ".imgpipe_tmp";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(PathBuf),
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
    #[error("Invalid hex color: {0}")]
    InvalidColor(String),
    #[error("Missing parameter for {operation}: {name}")]
    MissingParameter {
        operation: &'static str,
        name: &'static str,
    },
    #[error("No free output name for: {0}")]
    UniquePathExhausted(PathBuf),
    #[error(transparent)]
    Pipeline(#[from] Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Convert,
    Optimize,
    Resize,
    Crop,
    Extend,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Optimize => "optimize",
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Extend => "extend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeKind {
    #[default]
    Width,
    Height,
    Exact,
    Fit,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropKind {
    Region,
    #[default]
    Aspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtendKind {
    #[default]
    Aspect,
    Size,
}

/// Front-end request for a single image.
///
/// `width`/`height` double as ratio terms for the aspect modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub operation: Operation,
    /// Target format name; `None` keeps the source format.
    pub format: Option<String>,
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub scale: Option<f64>,
    pub resize_mode: ResizeKind,
    pub crop_mode: CropKind,
    pub extend_mode: ExtendKind,
    /// `#RRGGBB`, `#RRGGBBAA` or `transparent`.
    pub fill_color: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub overwrite: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            operation: Operation::Convert,
            format: None,
            quality: Quality::default().value(),
            width: None,
            height: None,
            x: None,
            y: None,
            scale: None,
            resize_mode: ResizeKind::default(),
            crop_mode: CropKind::default(),
            extend_mode: ExtendKind::default(),
            fill_color: None,
            output_dir: None,
            overwrite: false,
        }
    }
}

/// Map front-end options onto pipeline options for an image decoded as
/// `source_format`.
pub fn build_pipeline_options(
    options: &ProcessOptions,
    source_format: Format,
) -> Result<PipelineOptions> {
    let format = match (options.operation, &options.format) {
        (Operation::Optimize, _) | (_, None) => source_format,
        (_, Some(name)) => {
            Format::from_name(name).ok_or_else(|| CommandError::UnknownFormat(name.clone()))?
        }
    };
    let mut pipeline = PipelineOptions::new(format, options.quality);

    let op = options.operation.name();
    let require = |value: Option<u32>, name: &'static str| {
        value.ok_or(CommandError::MissingParameter {
            operation: op,
            name,
        })
    };

    match options.operation {
        Operation::Convert | Operation::Optimize => {}
        Operation::Resize => {
            let mode = match options.resize_mode {
                ResizeKind::Width => ResizeMode::Width(require(options.width, "width")?),
                ResizeKind::Height => ResizeMode::Height(require(options.height, "height")?),
                ResizeKind::Exact => ResizeMode::Exact(
                    require(options.width, "width")?,
                    require(options.height, "height")?,
                ),
                ResizeKind::Fit => ResizeMode::Fit(
                    require(options.width, "width")?,
                    require(options.height, "height")?,
                ),
                ResizeKind::Scale => {
                    ResizeMode::Scale(options.scale.ok_or(CommandError::MissingParameter {
                        operation: op,
                        name: "scale",
                    })?)
                }
            };
            pipeline = pipeline.with_resize(mode);
        }
        Operation::Crop => {
            let mode = match options.crop_mode {
                CropKind::Region => CropMode::Region {
                    x: options.x.unwrap_or(0),
                    y: options.y.unwrap_or(0),
                    width: require(options.width, "width")?,
                    height: require(options.height, "height")?,
                },
                CropKind::Aspect => CropMode::AspectRatio {
                    num: options.width.unwrap_or(1),
                    den: options.height.unwrap_or(1),
                },
            };
            pipeline = pipeline.with_crop(mode);
        }
        Operation::Extend => {
            let mode = match options.extend_mode {
                ExtendKind::Aspect => ExtendMode::AspectRatio {
                    num: options.width.unwrap_or(1),
                    den: options.height.unwrap_or(1),
                },
                ExtendKind::Size => ExtendMode::Size {
                    width: require(options.width, "width")?,
                    height: require(options.height, "height")?,
                },
            };
            pipeline = pipeline.with_extend(mode);
        }
    }

    if let Some(color) = &options.fill_color {
        pipeline = pipeline.with_fill(parse_fill_color(color)?);
    }

    Ok(pipeline)
}

/// Parse `transparent`, `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
/// Alpha defaults to 255.
pub fn parse_fill_color(value: &str) -> Result<FillColor> {
    if value.eq_ignore_ascii_case("transparent") {
        return Ok(FillColor::Transparent);
    }

    let invalid = || CommandError::InvalidColor(value.to_string());
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(FillColor::Solid([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub size_bytes: u64,
    /// Base64 PNG fitting within the thumbnail bound.
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResult {
    /// Where the output went; the input path itself when `skipped`.
    pub output_path: PathBuf,
    pub original_size: u64,
    pub new_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    /// An optimize that would not shrink the file wrote nothing.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    /// Base64 of the encoded output.
    pub data: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub format: Format,
}

// ============================================================================
// Commands
// ============================================================================

/// Every file under `dir` (recursively) with a recognised image extension,
/// sorted.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    collect_images(dir, true)
}

/// Image files under `dir`; descends into subdirectories only when
/// `recursive`.
pub fn collect_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CommandError::NotADirectory(dir.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() && Format::from_extension(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    log::debug!("found {} image(s) under {}", files.len(), dir.display());
    Ok(files)
}

/// Decode `path` and describe it, with a thumbnail no larger than
/// [`THUMBNAIL_MAX_DIMENSION`] on either side.
pub fn load_image(path: &Path) -> Result<ImageInfo> {
    load_image_with(path, THUMBNAIL_MAX_DIMENSION, &RustCodec::new())
}

pub fn load_image_with(path: &Path, thumbnail_size: u32, codec: &impl Codec) -> Result<ImageInfo> {
    if Format::from_extension(path).is_none() {
        return Err(CommandError::UnsupportedFile(path.to_path_buf()));
    }

    let data = fs::read(path)?;
    let decoded = pipeline::decode_with(&data, codec)?;
    let thumbnail = thumbnail(&decoded.image, thumbnail_size)?;
    let png = codec.encode(Format::Png, &thumbnail, Quality::new(THUMBNAIL_PNG_QUALITY))?;

    Ok(ImageInfo {
        width: decoded.image.width(),
        height: decoded.image.height(),
        format: decoded.format,
        size_bytes: data.len() as u64,
        thumbnail: BASE64.encode(&png),
    })
}

/// Fit within `max × max`; never upscales.
fn thumbnail(image: &PixelBuffer, max: u32) -> Result<PixelBuffer> {
    if image.width() <= max && image.height() <= max {
        return Ok(image.clone());
    }
    Ok(pipeline::resize(image, &ResizeMode::Fit(max, max))?)
}

/// Run the requested operation on `path` and write the result.
///
/// The output goes beside the input (or into `output_dir`) with the target
/// format's extension. An existing file is replaced only when `overwrite`
/// is set; otherwise the first free `<stem>_<n>.<ext>` is used.
///
/// `optimize` without `overwrite` writes nothing when the result is not
/// smaller than the input, and reports `skipped`.
pub fn process_image(path: &Path, options: &ProcessOptions) -> Result<ProcessResult> {
    process_image_with(path, options, &RustCodec::new())
}

pub fn process_image_with(
    path: &Path,
    options: &ProcessOptions,
    codec: &impl Codec,
) -> Result<ProcessResult> {
    let data = fs::read(path)?;
    let (result, (width, height)) = run_pipeline(&data, options, codec)?;
    let original_size = data.len() as u64;
    let new_size = result.data.len() as u64;

    let skipped = options.operation == Operation::Optimize
        && !options.overwrite
        && new_size >= original_size;
    let output_path = if skipped {
        log::info!(
            "{}: skipped, optimized size {} >= original {}",
            path.display(),
            new_size,
            original_size
        );
        path.to_path_buf()
    } else {
        if let Some(dir) = &options.output_dir {
            fs::create_dir_all(dir)?;
        }
        let target = format::output_path(path, result.format, options.output_dir.as_deref());
        let written = if options.overwrite {
            safe_write(&target, &result.data)?;
            target
        } else {
            write_unique(&target, &result.data)?
        };
        log::info!("{} -> {}", path.display(), written.display());
        written
    };

    Ok(ProcessResult {
        output_path,
        original_size,
        new_size,
        width,
        height,
        format: result.format,
        skipped,
    })
}

/// As [`process_image`], but nothing is written; the encoded bytes come back
/// as base64.
pub fn preview_image(path: &Path, options: &ProcessOptions) -> Result<PreviewResult> {
    preview_image_with(path, options, &RustCodec::new())
}

pub fn preview_image_with(
    path: &Path,
    options: &ProcessOptions,
    codec: &impl Codec,
) -> Result<PreviewResult> {
    let data = fs::read(path)?;
    let (result, (width, height)) = run_pipeline(&data, options, codec)?;

    Ok(PreviewResult {
        size_bytes: result.data.len() as u64,
        data: BASE64.encode(&result.data),
        width,
        height,
        format: result.format,
    })
}

/// [`process_image`] over every path with `workers` parallel workers.
pub fn process_batch(
    paths: &[PathBuf],
    options: &ProcessOptions,
    workers: usize,
    progress: Option<Sender<BatchProgress<ProcessResult>>>,
) -> BatchReport<ProcessResult> {
    process_batch_with(paths, options, workers, progress, &RustCodec::new())
}

pub fn process_batch_with(
    paths: &[PathBuf],
    options: &ProcessOptions,
    workers: usize,
    progress: Option<Sender<BatchProgress<ProcessResult>>>,
    codec: &impl Codec,
) -> BatchReport<ProcessResult> {
    run_batch(
        paths,
        workers,
        |path| process_image_with(path, options, codec),
        progress,
    )
}

// ============================================================================
// Helpers
// ============================================================================

/// Decode once, then encode per `options`. Returns the output dimensions.
///
/// `optimize` re-encodes the decoded image in its own format with no
/// geometry, which is what [`pipeline::optimize`] does without the second
/// decode.
fn run_pipeline(
    data: &[u8],
    options: &ProcessOptions,
    codec: &impl Codec,
) -> Result<(PipelineResult, (u32, u32))> {
    let decoded = pipeline::decode_with(data, codec)?;
    let pipeline_options = build_pipeline_options(options, decoded.format)?;
    if !pipeline_options.format.can_encode() {
        return Err(Error::EncodeUnsupported(pipeline_options.format).into());
    }

    let transformed = pipeline::apply_geometry(&decoded.image, &pipeline_options)?;
    let plain = PipelineOptions::new(pipeline_options.format, pipeline_options.quality);
    let result = pipeline::convert_with(&transformed, &plain, codec)?;
    Ok((result, transformed.dimensions()))
}

/// `path`, then `<stem>_1.<ext>` up to `<stem>_9999.<ext>` beside it.
fn unique_candidates(path: &Path) -> impl Iterator<Item = PathBuf> {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    let ext = path.extension().unwrap_or_default().to_string_lossy().into_owned();
    let parent = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    std::iter::once(path.to_path_buf()).chain(
        (1..=MAX_UNIQUE_ATTEMPTS).map(move |n| parent.join(format!("{stem}_{n}.{ext}"))),
    )
}

/// Write `data` to the first free candidate name and return it.
///
/// Names are claimed with `create_new`, so two writers racing for the same
/// target never end up sharing a file.
fn write_unique(path: &Path, data: &[u8]) -> Result<PathBuf> {
    create_parent(path)?;
    for candidate in unique_candidates(path) {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.write_all(data) {
            drop(file);
            fs::remove_file(&candidate).ok();
            return Err(e.into());
        }
        return Ok(candidate);
    }
    Err(CommandError::UniquePathExhausted(path.to_path_buf()))
}

/// Write `data` to `path`, replacing any existing file through a temp
/// sibling and a rename.
fn safe_write(path: &Path, data: &[u8]) -> Result<()> {
    create_parent(path)?;
    if !path.exists() {
        fs::write(path, data)?;
        return Ok(());
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(TEMP_SUFFIX);
    let tmp = PathBuf::from(tmp);
    if let Err(e) = fs::write(&tmp, data).and_then(|()| fs::rename(&tmp, path)) {
        fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
