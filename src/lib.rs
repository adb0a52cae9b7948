//! # ocr2md
//!
//! Convert images and PDF documents to Markdown through the Mistral OCR API,
//! or through an LLM that reformats text extracted from a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF / URL
//!  │
//!  ├─ 1. Input     validate path or URL, classify by extension and magic bytes
//!  ├─ 2. Render    image → one-page PDF, or PDF → raw text (pdfium)
//!  ├─ 3. Remote    Mistral OCR (upload → signed URL → /ocr) or chat completion
//!  ├─ 4. Collect   fold page results into one candidate document
//!  ├─ 5. Normalize strip stray `%`, collapse blank lines, trim trailing spaces
//!  └─ 6. Envelope  front-matter header, phrase repair, final `%` sweep
//! ```
//!
//! Steps 4–6 are pure and exposed as [`render_document`], so the assembly
//! logic can be driven without network access.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2md::{convert, ConversionConfig, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MISTRAL_API_KEY from the environment
//!     let config = ConversionConfig::default();
//!     let output = convert("scan.png", Pipeline::ImageOcr, &config).await?;
//!     println!("{}", output.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, Pipeline, RepairPhrase};
pub use convert::{
    chat, convert, convert_sync, convert_to_file, render_document, write_markdown,
};
pub use error::Ocr2MdError;
pub use output::{ConversionOutput, ConversionStats, PageResult, TextBlock};
pub use pipeline::collect::collect_pages;
pub use pipeline::envelope::MetadataEnvelope;
pub use pipeline::llm::Completion;
pub use pipeline::postprocess::{finalize, normalize, CleanupRule};
