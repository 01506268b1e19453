//! Input resolution: validate a user-supplied path and identify its format.
//!
//! The extension must be one the tool supports, and the magic bytes decide
//! what the file actually is. A `.jpg` that is really a PNG is accepted as a
//! PNG; a `.pdf` that holds an image, or an image extension on a PDF, is
//! rejected because whichever reading we picked could be wrong.

use crate::error::RedactError;
use crate::model::{ImageKind, SourceFormat};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated local input file.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub file_size: u64,
}

/// Identify a format from the first bytes of a file.
pub fn sniff_format(magic: &[u8]) -> Option<SourceFormat> {
    if magic.starts_with(b"%PDF") {
        Some(SourceFormat::Pdf)
    } else if magic.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(SourceFormat::Image(ImageKind::Png))
    } else if magic.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(SourceFormat::Image(ImageKind::Jpeg))
    } else if magic.starts_with(b"II*\0") || magic.starts_with(b"MM\0*") {
        Some(SourceFormat::Image(ImageKind::Tiff))
    } else if magic.starts_with(b"BM") {
        Some(SourceFormat::Image(ImageKind::Bmp))
    } else {
        None
    }
}

/// Format implied by a file extension.
pub fn format_from_extension(path: &Path) -> Option<SourceFormat> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("pdf") {
        return Some(SourceFormat::Pdf);
    }
    ImageKind::from_extension(ext).map(SourceFormat::Image)
}

/// Resolve and validate a local input path.
pub fn resolve_input(path_str: impl AsRef<Path>) -> Result<ResolvedInput, RedactError> {
    let path = path_str.as_ref().to_path_buf();

    if !path.exists() {
        return Err(RedactError::FileNotFound { path });
    }

    let by_extension =
        format_from_extension(&path).ok_or_else(|| RedactError::UnsupportedFormat {
            path: path.clone(),
            detail: "unrecognised file extension".into(),
        })?;

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RedactError::PermissionDenied { path });
        }
        Err(_) => return Err(RedactError::FileNotFound { path }),
    };

    let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
    if file_size == 0 {
        return Err(RedactError::UnsupportedFormat {
            path,
            detail: "file is empty".into(),
        });
    }

    let mut magic = [0u8; 8];
    let read = file
        .read(&mut magic)
        .map_err(|e| RedactError::UnsupportedFormat {
            path: path.clone(),
            detail: format!("cannot read header: {e}"),
        })?;

    let by_magic = sniff_format(&magic[..read]).ok_or_else(|| RedactError::UnsupportedFormat {
        path: path.clone(),
        detail: format!(
            "content is not a supported image or PDF (first bytes {:?})",
            &magic[..read]
        ),
    })?;

    let is_pdf = |f: SourceFormat| f == SourceFormat::Pdf;
    if is_pdf(by_extension) != is_pdf(by_magic) {
        return Err(RedactError::UnsupportedFormat {
            path,
            detail: format!("extension says {by_extension:?} but content is {by_magic:?}"),
        });
    }

    debug!("Resolved input {} as {:?}", path.display(), by_magic);
    Ok(ResolvedInput {
        path,
        format: by_magic,
        file_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(bytes).unwrap();
        f
    }

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(sniff_format(b"%PDF-1.7"), Some(SourceFormat::Pdf));
        assert_eq!(
            sniff_format(b"\x89PNG\r\n\x1a\n"),
            Some(SourceFormat::Image(ImageKind::Png))
        );
        assert_eq!(
            sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(SourceFormat::Image(ImageKind::Jpeg))
        );
        assert_eq!(
            sniff_format(b"II*\0"),
            Some(SourceFormat::Image(ImageKind::Tiff))
        );
        assert_eq!(
            sniff_format(b"BM\0\0"),
            Some(SourceFormat::Image(ImageKind::Bmp))
        );
        assert_eq!(sniff_format(b"PK\x03\x04"), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, RedactError::FileNotFound { .. }));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let f = write_temp(".docx", b"PK\x03\x04rest");
        let err = resolve_input(f.path()).unwrap_err();
        assert!(matches!(err, RedactError::UnsupportedFormat { .. }));
    }

    #[test]
    fn empty_file_is_unsupported() {
        let f = write_temp(".png", b"");
        let err = resolve_input(f.path()).unwrap_err();
        let RedactError::UnsupportedFormat { detail, .. } = err else {
            panic!("expected UnsupportedFormat, got {err:?}");
        };
        assert!(detail.contains("empty"));
    }

    #[test]
    fn magic_decides_between_image_kinds() {
        let f = write_temp(".jpg", b"\x89PNG\r\n\x1a\nrest-of-file");
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(resolved.format, SourceFormat::Image(ImageKind::Png));
    }

    #[test]
    fn pdf_extension_on_image_is_rejected() {
        let f = write_temp(".pdf", b"\x89PNG\r\n\x1a\nrest-of-file");
        assert!(matches!(
            resolve_input(f.path()),
            Err(RedactError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn garbage_content_is_rejected() {
        let f = write_temp(".png", b"hello world");
        assert!(matches!(
            resolve_input(f.path()),
            Err(RedactError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn pdf_resolves() {
        let f = write_temp(".PDF", b"%PDF-1.4\n%...");
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(resolved.format, SourceFormat::Pdf);
        assert!(resolved.file_size > 0);
    }
}
