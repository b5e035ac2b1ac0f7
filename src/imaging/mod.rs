//! Image processing in pure Rust, with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Resize** | `image::imageops::resize` (Lanczos3) |
//! | **Crop / Extend** | row copies over RGBA8 buffers |
//! | **Decode / Encode** | [`RustCodec`]: `image`, `rav1d`, `jxl-oxide` |
//!
//! The module is split into:
//! - **Buffer**: [`PixelBuffer`], the RGBA8 value every step passes along
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Codec**: [`Codec`] trait + [`RustCodec`]
//! - **Operations**: Geometry functions combining calculations + pixel work

pub mod buffer;
pub mod calculations;
pub mod codec;
pub mod operations;
mod params;
pub mod rust_codec;

pub use buffer::PixelBuffer;
pub use codec::Codec;
pub use operations::{crop, extend, resize};
pub use params::{CropMode, ExtendMode, FillColor, Quality, ResizeMode};
pub use rust_codec::RustCodec;
