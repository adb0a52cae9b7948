//! Local PDF work via pdfium: image → one-page PDF, and text extraction.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Every entry point here moves its work onto the blocking thread pool.
//!
//! ## Why convert images at all?
//!
//! The OCR pipeline uploads a document to the Files API, which expects a
//! PDF. An image is embedded at its pixel size (one pixel = one point) on a
//! page of exactly that size, so the OCR service sees the image unscaled.

use crate::error::Ocr2MdError;
use crate::pipeline::input::InputKind;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Ocr2MdError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            let path = PathBuf::from(path);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            return Pdfium::bind_to_library(&lib)
                .map(Pdfium::new)
                .map_err(|e| Ocr2MdError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e)));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| Ocr2MdError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Convert a PNG/JPEG file into a single-page PDF.
pub async fn image_to_pdf(path: &Path, kind: InputKind) -> Result<Vec<u8>, Ocr2MdError> {
    let path = path.to_path_buf();
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| Ocr2MdError::FileNotFound { path: path.clone() })?;

    tokio::task::spawn_blocking(move || image_to_pdf_blocking(&path, &bytes, kind))
        .await
        .map_err(|e| Ocr2MdError::Internal(format!("Image conversion task panicked: {}", e)))?
}

fn image_to_pdf_blocking(
    path: &Path,
    bytes: &[u8],
    kind: InputKind,
) -> Result<Vec<u8>, Ocr2MdError> {
    info!("Converting image to PDF: {}", path.display());

    let format = match kind {
        InputKind::Png => image::ImageFormat::Png,
        InputKind::Jpeg => image::ImageFormat::Jpeg,
        InputKind::Pdf => {
            return Err(Ocr2MdError::UnsupportedInputFormat {
                input: path.display().to_string(),
                format: ".pdf".into(),
                hint: "Use the PDF pipeline for PDF input.".into(),
            })
        }
    };

    let conversion_failed = |detail: String| Ocr2MdError::ImageConversionFailed {
        path: path.to_path_buf(),
        detail,
    };

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| conversion_failed(e.to_string()))?;
    let width = PdfPoints::new(image.width() as f32);
    let height = PdfPoints::new(image.height() as f32);

    let pdfium = bind_pdfium()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| conversion_failed(format!("{:?}", e)))?;

    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(width, height))
            .map_err(|e| conversion_failed(format!("{:?}", e)))?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::ZERO,
                PdfPoints::ZERO,
                &image,
                Some(width),
                Some(height),
            )
            .map_err(|e| conversion_failed(format!("{:?}", e)))?;
    }

    let pdf = document
        .save_to_bytes()
        .map_err(|e| conversion_failed(format!("{:?}", e)))?;

    info!(
        "Image {}x{} px converted to a {} byte PDF",
        image.width(),
        image.height(),
        pdf.len()
    );
    Ok(pdf)
}

/// Text extracted from a PDF, with its page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

/// Extract the text layer of every page, joined in page order.
pub async fn extract_text(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<ExtractedText, Ocr2MdError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_text_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Ocr2MdError::Internal(format!("Text extraction task panicked: {}", e)))?
}

fn extract_text_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<ExtractedText, Ocr2MdError> {
    info!("Reading PDF text: {}", pdf_path.display());
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Ocr2MdError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Ocr2MdError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Ocr2MdError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let mut texts = Vec::with_capacity(page_count);

    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| Ocr2MdError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        texts.push(text.all());
    }

    let text = texts.join("\n\n");
    debug!("Extracted {} chars from {} pages", text.len(), page_count);

    Ok(ExtractedText { text, page_count })
}
