//! Format registry: the closed set of supported formats, detection by
//! extension and by magic bytes, and encode capability.
//!
//! All tables here are process-wide constants.
//!
//! ## Magic bytes
//!
//! | Format | Signature |
//! |---|---|
//! | JPEG | `FF D8 FF` |
//! | PNG | `89 50 4E 47 0D 0A 1A 0A` |
//! | WebP | `RIFF` at 0, `WEBP` at 8 |
//! | AVIF | `ftyp` at 4, brand `avif` or `avis` at 8 |
//! | JXL | bare codestream `FF 0A`, or ISOBMFF container `00 00 00 0C "JXL " 0D 0A 87 0A` |
//! | QOI | `qoif` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    WebP,
    Avif,
    Jxl,
    Qoi,
}

/// Every format, in registry order.
pub const ALL_FORMATS: [Format; 6] = [
    Format::Jpeg,
    Format::Png,
    Format::WebP,
    Format::Avif,
    Format::Jxl,
    Format::Qoi,
];

/// A byte signature: every `(offset, bytes)` part must match.
struct Signature {
    format: Format,
    parts: &'static [(usize, &'static [u8])],
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        self.parts
            .iter()
            .all(|&(offset, bytes)| data.get(offset..offset + bytes.len()) == Some(bytes))
    }
}

/// Checked in order; first match wins.
const SIGNATURES: &[Signature] = &[
    Signature {
        format: Format::Jpeg,
        parts: &[(0, &[0xFF, 0xD8, 0xFF])],
    },
    Signature {
        format: Format::Png,
        parts: &[(0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])],
    },
    Signature {
        format: Format::WebP,
        parts: &[(0, b"RIFF"), (8, b"WEBP")],
    },
    Signature {
        format: Format::Avif,
        parts: &[(4, b"ftyp"), (8, b"avif")],
    },
    Signature {
        format: Format::Avif,
        parts: &[(4, b"ftyp"), (8, b"avis")],
    },
    Signature {
        format: Format::Jxl,
        parts: &[(0, &[0xFF, 0x0A])],
    },
    Signature {
        format: Format::Jxl,
        parts: &[(
            0,
            &[
                0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
            ],
        )],
    },
    Signature {
        format: Format::Qoi,
        parts: &[(0, b"qoif")],
    },
];

impl Format {
    /// Detect format from a file extension (case-insensitive).
    ///
    /// Only the text after the final `.` of the file name is considered.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_name(ext)
    }

    /// Parse a format name or extension (`jpg`, `jpeg`, `png`, ...), case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            "jxl" => Some(Self::Jxl),
            "qoi" => Some(Self::Qoi),
            _ => None,
        }
    }

    /// Detect format from the leading bytes of encoded data.
    ///
    /// Never panics: input shorter than a signature simply fails to match it.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        SIGNATURES
            .iter()
            .find(|sig| sig.matches(data))
            .map(|sig| sig.format)
    }

    /// Canonical lowercase file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Jxl => "jxl",
            Self::Qoi => "qoi",
        }
    }

    /// Whether images can be encoded to this format.
    ///
    /// JXL is decode-only.
    pub fn can_encode(self) -> bool {
        !matches!(self, Self::Jxl)
    }

    /// Whether the encoder discards information at quality < 100.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP | Self::Avif)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
            Self::Avif => "AVIF",
            Self::Jxl => "JXL",
            Self::Qoi => "QOI",
        };
        f.write_str(name)
    }
}

/// Derive the output path for an encoded image.
///
/// - `output` given and an existing directory: `<output>/<input stem>.<ext>`.
/// - `output` given otherwise: used verbatim.
/// - `output` absent: the input path with its extension replaced.
pub fn output_path(input: &Path, format: Format, output: Option<&Path>) -> PathBuf {
    let ext = format.extension();
    match output {
        None => input.with_extension(ext),
        Some(out) if out.is_dir() => {
            let stem = input.file_stem().unwrap_or_default();
            out.join(stem).with_extension(ext)
        }
        Some(out) => out.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // from_extension
    // =========================================================================

    #[test]
    fn extension_jpg_and_jpeg() {
        assert_eq!(
            Format::from_extension(Path::new("a.jpg")),
            Some(Format::Jpeg)
        );
        assert_eq!(
            Format::from_extension(Path::new("a.jpeg")),
            Some(Format::Jpeg)
        );
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(
            Format::from_extension(Path::new("a.JpEg")),
            Some(Format::Jpeg)
        );
        assert_eq!(
            Format::from_extension(Path::new("a.PNG")),
            Some(Format::Png)
        );
        assert_eq!(
            Format::from_extension(Path::new("a.WebP")),
            Some(Format::WebP)
        );
    }

    #[test]
    fn extension_each_format() {
        for format in ALL_FORMATS {
            let name = format!("image.{}", format.extension());
            assert_eq!(Format::from_extension(Path::new(&name)), Some(format));
        }
    }

    #[test]
    fn extension_uses_final_dot() {
        assert_eq!(
            Format::from_extension(Path::new("archive.png.qoi")),
            Some(Format::Qoi)
        );
        assert_eq!(Format::from_extension(Path::new("photo.jpg.bak")), None);
    }

    #[test]
    fn extension_unknown_or_missing() {
        assert_eq!(Format::from_extension(Path::new("file.bmp")), None);
        assert_eq!(Format::from_extension(Path::new("noext")), None);
        assert_eq!(Format::from_extension(&PathBuf::new()), None);
    }

    // =========================================================================
    // from_magic_bytes
    // =========================================================================

    fn webp_header() -> Vec<u8> {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"WEBP");
        data
    }

    fn avif_header(brand: &[u8; 4]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x20];
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(brand);
        data
    }

    #[test]
    fn magic_each_signature() {
        let cases: Vec<(Vec<u8>, Format)> = vec![
            (vec![0xFF, 0xD8, 0xFF, 0xE0], Format::Jpeg),
            (
                vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                Format::Png,
            ),
            (webp_header(), Format::WebP),
            (avif_header(b"avif"), Format::Avif),
            (avif_header(b"avis"), Format::Avif),
            (vec![0xFF, 0x0A, 0x00, 0x00], Format::Jxl),
            (
                vec![
                    0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
                ],
                Format::Jxl,
            ),
            (b"qoif\x00\x00\x00\x10".to_vec(), Format::Qoi),
        ];
        for (data, expected) in cases {
            assert_eq!(Format::from_magic_bytes(&data), Some(expected), "{data:02X?}");
        }
    }

    #[test]
    fn magic_zero_bytes_unknown() {
        assert_eq!(Format::from_magic_bytes(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn magic_empty_input() {
        assert_eq!(Format::from_magic_bytes(&[]), None);
    }

    #[test]
    fn magic_truncated_signatures() {
        assert_eq!(Format::from_magic_bytes(&[0xFF, 0xD8]), None);
        assert_eq!(
            Format::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            None
        );
        assert_eq!(Format::from_magic_bytes(&webp_header()[..11]), None);
        assert_eq!(Format::from_magic_bytes(&avif_header(b"avif")[..10]), None);
        assert_eq!(Format::from_magic_bytes(b"qoi"), None);
    }

    #[test]
    fn magic_other_ftyp_brand_is_not_avif() {
        assert_eq!(Format::from_magic_bytes(&avif_header(b"heic")), None);
    }

    // =========================================================================
    // capabilities and naming
    // =========================================================================

    #[test]
    fn extension_strings() {
        assert_eq!(Format::Jpeg.extension(), "jpg");
        assert_eq!(Format::Png.extension(), "png");
        assert_eq!(Format::WebP.extension(), "webp");
        assert_eq!(Format::Avif.extension(), "avif");
        assert_eq!(Format::Jxl.extension(), "jxl");
        assert_eq!(Format::Qoi.extension(), "qoi");
    }

    #[test]
    fn only_jxl_is_decode_only() {
        for format in ALL_FORMATS {
            assert_eq!(format.can_encode(), format != Format::Jxl, "{format}");
        }
    }

    #[test]
    fn from_name_accepts_both_jpeg_spellings() {
        assert_eq!(Format::from_name("JPG"), Some(Format::Jpeg));
        assert_eq!(Format::from_name("jpeg"), Some(Format::Jpeg));
        assert_eq!(Format::from_name("gif"), None);
    }

    #[test]
    fn serde_lowercase_names() {
        assert_eq!(serde_json::to_string(&Format::WebP).unwrap(), "\"webp\"");
        let parsed: Format = serde_json::from_str("\"jpg\"").unwrap();
        assert_eq!(parsed, Format::Jpeg);
    }

    // =========================================================================
    // output_path
    // =========================================================================

    #[test]
    fn output_path_replaces_extension() {
        let out = output_path(Path::new("/tmp/photo.jpg"), Format::WebP, None);
        assert_eq!(out, PathBuf::from("/tmp/photo.webp"));
    }

    #[test]
    fn output_path_explicit_file_verbatim() {
        let out = output_path(
            Path::new("/tmp/photo.jpg"),
            Format::Png,
            Some(Path::new("/out/result.bin")),
        );
        assert_eq!(out, PathBuf::from("/out/result.bin"));
    }

    #[test]
    fn output_path_into_existing_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = output_path(Path::new("/src/photo.jpg"), Format::Avif, Some(tmp.path()));
        assert_eq!(out, tmp.path().join("photo.avif"));
    }
}
