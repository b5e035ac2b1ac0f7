//! # imgpipe
//!
//! Decode, transform and re-encode images in six formats with a statically
//! linked stack: JPEG, PNG, WebP, AVIF, JPEG XL (decode only) and QOI.
//!
//! # Architecture: Bytes In, Bytes Out
//!
//! ```text
//! bytes → decode (magic bytes → Format → Codec) → PixelBuffer
//!       → resize → crop → extend              (each optional, always this order)
//!       → Codec::encode(format, quality)      → bytes
//! ```
//!
//! A batch runs that pipeline once per file and reports per-item progress.
//! Geometry never touches encoded data and codecs never see geometry, so the
//! math is unit tested on plain buffers and the pipeline is tested against a
//! recording mock codec.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`format`] | Format registry: extensions, magic-byte detection, encode capability, output paths |
//! | [`imaging`] | Pixel buffers, geometry (resize/crop/extend), the [`Codec`](imaging::Codec) trait and [`RustCodec`](imaging::RustCodec) |
//! | [`pipeline`] | Decoding from bytes, files or readers; `convert` and `optimize` |
//! | [`batch`] | Runs one job per path with stable indices and failure isolation |
//! | [`commands`] | Path-based command surface for front ends: scan, load, process, preview, batch |
//! | [`config`] | `imgpipe.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//! | [`error`] | The shared [`Error`] type |
//!
//! # Design Decisions
//!
//! ## Rounding
//!
//! Derived dimensions round half up (`f64::round`): a 5×3 image resized to
//! width 2 becomes 2×1 (1.2 → 1), to width 3 becomes 3×2 (1.8 → 2). Centering
//! offsets split odd margins with the extra pixel on the right/bottom.
//!
//! ## JPEG XL Is Read-Only
//!
//! JXL files decode through `jxl-oxide`. No pure-Rust JXL encoder is mature
//! enough to ship, so [`Format::can_encode`] is false for JXL and every
//! encode path reports [`Error::EncodeUnsupported`] before doing any work.
//!
//! ## Statically Linked Codecs
//!
//! `image` handles JPEG/PNG/QOI and AVIF encoding (rav1e), `rav1d` decodes
//! AVIF, and `webp` encodes WebP with a bundled libwebp (lossy below quality
//! 100, lossless at 100). No system libraries are needed at runtime.

pub mod batch;
pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod imaging;
pub mod output;
pub mod pipeline;

pub use error::{Error, Result};
pub use format::Format;
pub use pipeline::{
    DecodeResult, PipelineOptions, PipelineResult, convert, decode, decode_file, decode_reader,
    optimize,
};
