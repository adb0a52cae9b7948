//! Input resolution: validate the user-supplied path or URL and classify it.
//!
//! Local files are checked for existence and read permission, then
//! classified: PDFs by their `%PDF` magic bytes, images by extension. The
//! envelope title is derived here too, from the base name without extension.
//!
//! URLs are never downloaded. The OCR service fetches them itself, so a URL
//! is only accepted by the PDF OCR pipeline.

use crate::config::Pipeline;
use crate::error::Ocr2MdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMAGE_WARN_BYTES: u64 = 10 * 1024 * 1024;
const PDF_WARN_BYTES: u64 = 20 * 1024 * 1024;

/// Format of a local input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Png,
    Jpeg,
}

impl InputKind {
    /// Classify an image by extension (case-insensitive).
    pub fn image_from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(InputKind::Png),
            "jpg" | "jpeg" => Some(InputKind::Jpeg),
            _ => None,
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, InputKind::Png | InputKind::Jpeg)
    }
}

/// A validated input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// Local file of a known kind.
    Local {
        path: PathBuf,
        kind: InputKind,
        size_bytes: u64,
    },
    /// Remote PDF handed to the OCR service as-is.
    Url(String),
}

impl ResolvedInput {
    /// Base name without extension, used as the envelope title.
    pub fn title(&self) -> String {
        match self {
            ResolvedInput::Local { path, .. } => file_stem(path),
            ResolvedInput::Url(url) => url_stem(url),
        }
    }

    /// File name sent to the Files API.
    pub fn upload_name(&self) -> String {
        format!("{}.pdf", self.title())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve and validate `input` for `pipeline`.
pub fn resolve_input(input: &str, pipeline: Pipeline) -> Result<ResolvedInput, Ocr2MdError> {
    if is_url(input) {
        if pipeline != Pipeline::PdfOcr {
            return Err(Ocr2MdError::UnsupportedInputFormat {
                input: input.to_string(),
                format: "url".into(),
                hint: "Only the PDF OCR pipeline accepts URLs; download the file first.".into(),
            });
        }
        info!("Passing URL to OCR service: {}", input);
        return Ok(ResolvedInput::Url(input.to_string()));
    }

    let path = PathBuf::from(input);
    let size_bytes = check_readable(&path)?;

    let kind = match pipeline {
        Pipeline::ImageOcr => classify_image(&path)?,
        Pipeline::PdfOcr | Pipeline::PdfText => {
            verify_pdf_magic(&path)?;
            InputKind::Pdf
        }
    };

    let mb = size_bytes as f64 / (1024.0 * 1024.0);
    let limit = if kind.is_image() {
        IMAGE_WARN_BYTES
    } else {
        PDF_WARN_BYTES
    };
    if size_bytes > limit {
        warn!(
            "Input is large ({:.2} MB); processing may take a while",
            mb
        );
    } else {
        debug!("Input size: {:.2} MB", mb);
    }

    Ok(ResolvedInput::Local {
        path,
        kind,
        size_bytes,
    })
}

/// Confirm the file exists and can be opened; return its size.
fn check_readable(path: &Path) -> Result<u64, Ocr2MdError> {
    if !path.exists() {
        return Err(Ocr2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(f) => Ok(f.metadata().map(|m| m.len()).unwrap_or(0)),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Ocr2MdError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(Ocr2MdError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

fn classify_image(path: &Path) -> Result<InputKind, Ocr2MdError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    InputKind::image_from_extension(ext).ok_or_else(|| Ocr2MdError::UnsupportedInputFormat {
        input: path.display().to_string(),
        format: if ext.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{}", ext.to_ascii_lowercase())
        },
        hint: "Supported image formats: .png, .jpg, .jpeg".into(),
    })
}

fn verify_pdf_magic(path: &Path) -> Result<(), Ocr2MdError> {
    let mut f = std::fs::File::open(path).map_err(|_| Ocr2MdError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(Ocr2MdError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Last path segment of a URL with a `.pdf` suffix removed; `document` when
/// the URL has no path segment.
fn url_stem(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let path = rest.split_once('/').map_or("", |(_, path)| path);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

    let stem = match last.len().checked_sub(4).and_then(|i| last.get(i..).map(|ext| (i, ext))) {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".pdf") => &last[..i],
        _ => last,
    };
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem.to_string()
    }
}

/// Default output location: `output/<stem><suffix>.md` under `base`.
pub fn default_output_path(base: &Path, title: &str, pipeline: Pipeline) -> PathBuf {
    base.join("output")
        .join(format!("{}{}.md", title, pipeline.output_suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_image_extensions() {
        assert_eq!(InputKind::image_from_extension("PNG"), Some(InputKind::Png));
        assert_eq!(InputKind::image_from_extension("jpg"), Some(InputKind::Jpeg));
        assert_eq!(InputKind::image_from_extension("JPEG"), Some(InputKind::Jpeg));
        assert_eq!(InputKind::image_from_extension("gif"), None);
    }

    #[test]
    fn test_missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", Pipeline::PdfOcr).unwrap_err();
        assert!(matches!(err, Ocr2MdError::FileNotFound { .. }));
    }

    #[test]
    fn test_unsupported_image_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.gif");
        std::fs::write(&path, b"GIF89a").unwrap();
        let err = resolve_input(path.to_str().unwrap(), Pipeline::ImageOcr).unwrap_err();
        match err {
            Ocr2MdError::UnsupportedInputFormat { format, .. } => assert_eq!(format, ".gif"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_a_pdf() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), Pipeline::PdfText).unwrap_err();
        assert!(matches!(err, Ocr2MdError::NotAPdf { .. }));
    }

    #[test]
    fn test_valid_pdf_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide-2022.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(path.to_str().unwrap(), Pipeline::PdfOcr).unwrap();
        assert_eq!(resolved.title(), "guide-2022");
        assert_eq!(resolved.upload_name(), "guide-2022.pdf");
        match resolved {
            ResolvedInput::Local { kind, size_bytes, .. } => {
                assert_eq!(kind, InputKind::Pdf);
                assert_eq!(size_bytes, 9);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_url_only_for_pdf_ocr() {
        let url = "https://example.com/files/report.pdf?dl=1";
        let resolved = resolve_input(url, Pipeline::PdfOcr).unwrap();
        assert_eq!(resolved.title(), "report");
        assert!(matches!(
            resolve_input(url, Pipeline::ImageOcr),
            Err(Ocr2MdError::UnsupportedInputFormat { .. })
        ));
    }

    #[test]
    fn test_url_without_file_name() {
        assert_eq!(ResolvedInput::Url("https://example.com/".into()).title(), "document");
        assert_eq!(ResolvedInput::Url("https://example.com".into()).title(), "document");
        assert_eq!(ResolvedInput::Url("https://example.com?x=1".into()).title(), "document");
        assert_eq!(ResolvedInput::Url("https://example.com/.pdf".into()).title(), "document");
    }

    #[test]
    fn test_url_title_keeps_dotted_ids() {
        let title = |u: &str| ResolvedInput::Url(u.to_string()).title();
        assert_eq!(title("https://arxiv.org/pdf/1706.03762"), "1706.03762");
        assert_eq!(title("https://arxiv.org/pdf/1706.03762v7.PDF"), "1706.03762v7");
        assert_eq!(title("https://example.com/docs/guide/"), "guide");
        assert_eq!(title("https://example.com/a/report.tar.pdf#page=2"), "report.tar");
    }

    #[test]
    fn test_default_output_path() {
        let base = Path::new("/work");
        assert_eq!(
            default_output_path(base, "scan", Pipeline::ImageOcr),
            PathBuf::from("/work/output/scan_ocr.md")
        );
        assert_eq!(
            default_output_path(base, "book", Pipeline::PdfText),
            PathBuf::from("/work/output/book.md")
        );
    }
}
