//! Error types for the ocr2md library.
//!
//! Every failure is fatal for the single document being converted, so there
//! is one error enum, [`Ocr2MdError`]. The variants fall into the same groups
//! as the pipeline stages: input resolution, local PDF work, remote calls,
//! content collection and output.
//!
//! [`Ocr2MdError::NoExtractableContent`] is the only error raised by the pure
//! core (the collector). Everything else comes from the collaborators that
//! feed it or consume its output.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the ocr2md library.
#[derive(Debug, Error)]
pub enum Ocr2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input cannot be handled by the selected pipeline.
    #[error("Unsupported input format '{format}' for '{input}'\n{hint}")]
    UnsupportedInputFormat {
        input: String,
        format: String,
        hint: String,
    },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The image could not be decoded or embedded into a PDF page.
    #[error("Failed to convert image '{path}' to PDF: {detail}")]
    ImageConversionFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The remote provider is not configured (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The Mistral Files or OCR endpoint returned a non-retryable error.
    #[error("Mistral OCR API error ({status}): {message}")]
    OcrApiError { status: u16, message: String },

    /// The chat-completion API returned an error after all retries.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The remote API returned HTTP 429 on every attempt.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// A remote call did not answer within the configured timeout.
    #[error("{stage} timed out after {secs}s")]
    ApiTimeout { stage: String, secs: u64 },

    /// The remote API rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The OCR response contained no pages at all.
    #[error("OCR returned no pages for '{input}'")]
    NoPages { input: String },

    // ── Content errors ────────────────────────────────────────────────────
    /// No page contributed usable text; nothing is written.
    #[error("No extractable content: none of the {pages} page(s) carried usable text")]
    NoExtractableContent { pages: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
