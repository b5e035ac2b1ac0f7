//! Codec trait: the single seam between pixel buffers and encoded bytes.
//!
//! A [`Codec`] decodes and encodes every [`Format`], keyed by format, so the
//! geometry and pipeline code never depends on a particular encoder. The
//! production implementation is [`RustCodec`](super::rust_codec::RustCodec);
//! tests use a recording mock.

use super::buffer::PixelBuffer;
use super::params::Quality;
use crate::error::Result;
use crate::format::Format;

/// Format-keyed decode/encode capability.
///
/// Implementations must be `Sync` so one codec can serve a parallel batch.
pub trait Codec: Sync {
    /// Decode `data`, already identified as `format`, into RGBA8.
    fn decode(&self, format: Format, data: &[u8]) -> Result<PixelBuffer>;

    /// Encode `image` as `format` at `quality`.
    ///
    /// Returns [`Error::EncodeUnsupported`](crate::Error::EncodeUnsupported)
    /// for decode-only formats.
    fn encode(&self, format: Format, image: &PixelBuffer, quality: Quality) -> Result<Vec<u8>>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Mock codec that records operations instead of running real encoders.
    ///
    /// Encoded output is a tiny self-describing container: the format's magic
    /// bytes, then width and height as little-endian u32, then the raw RGBA
    /// pixels. `decode` reverses it, so round trips work without real codecs.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon.
    #[derive(Default)]
    pub struct MockCodec {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub fail_decode: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode {
            format: Format,
            len: usize,
        },
        Encode {
            format: Format,
            width: u32,
            height: u32,
            quality: u8,
        },
    }

    pub fn magic(format: Format) -> Vec<u8> {
        match format {
            Format::Jpeg => vec![0xFF, 0xD8, 0xFF, 0xE0],
            Format::Png => vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            Format::WebP => {
                let mut m = b"RIFF".to_vec();
                m.extend_from_slice(&[0; 4]);
                m.extend_from_slice(b"WEBP");
                m
            }
            Format::Avif => {
                let mut m = vec![0, 0, 0, 0x1C];
                m.extend_from_slice(b"ftypavif");
                m
            }
            Format::Jxl => vec![0xFF, 0x0A],
            Format::Qoi => b"qoif".to_vec(),
        }
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_decode() -> Self {
            Self {
                fail_decode: true,
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Produce bytes that `decode` accepts, without recording anything.
        pub fn container(format: Format, image: &PixelBuffer) -> Vec<u8> {
            let mut data = magic(format);
            data.extend_from_slice(&image.width().to_le_bytes());
            data.extend_from_slice(&image.height().to_le_bytes());
            data.extend_from_slice(image.pixels());
            data
        }
    }

    impl Codec for MockCodec {
        fn decode(&self, format: Format, data: &[u8]) -> Result<PixelBuffer> {
            self.operations.lock().unwrap().push(RecordedOp::Decode {
                format,
                len: data.len(),
            });
            if self.fail_decode {
                return Err(Error::Decode("mock decode failure".to_string()));
            }

            let header = magic(format).len();
            let dims = data
                .get(header..header + 8)
                .ok_or_else(|| Error::Decode("truncated mock container".to_string()))?;
            let width = u32::from_le_bytes([dims[0], dims[1], dims[2], dims[3]]);
            let height = u32::from_le_bytes([dims[4], dims[5], dims[6], dims[7]]);
            PixelBuffer::new(width, height, data[header + 8..].to_vec())
        }

        fn encode(&self, format: Format, image: &PixelBuffer, quality: Quality) -> Result<Vec<u8>> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                format,
                width: image.width(),
                height: image.height(),
                quality: quality.value(),
            });
            if !format.can_encode() {
                return Err(Error::EncodeUnsupported(format));
            }
            Ok(Self::container(format, image))
        }
    }

    #[test]
    fn mock_roundtrip_preserves_pixels() {
        let codec = MockCodec::new();
        let image = PixelBuffer::filled(3, 2, [1, 2, 3, 4]).unwrap();

        let bytes = codec.encode(Format::Qoi, &image, Quality::new(90)).unwrap();
        assert_eq!(Format::from_magic_bytes(&bytes), Some(Format::Qoi));
        let decoded = codec.decode(Format::Qoi, &bytes).unwrap();
        assert_eq!(decoded, image);

        let ops = codec.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode {
                format: Format::Qoi,
                width: 3,
                height: 2,
                quality: 90
            }
        ));
    }

    #[test]
    fn mock_refuses_decode_only_format() {
        let codec = MockCodec::new();
        let image = PixelBuffer::filled(1, 1, [0; 4]).unwrap();
        let result = codec.encode(Format::Jxl, &image, Quality::default());
        assert!(matches!(result, Err(Error::EncodeUnsupported(Format::Jxl))));
    }

    #[test]
    fn mock_magic_matches_registry() {
        for format in crate::format::ALL_FORMATS {
            assert_eq!(Format::from_magic_bytes(&magic(format)), Some(format));
        }
    }
}
