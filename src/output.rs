//! Output types: per-page OCR results and the assembled conversion output.

use serde::{Deserialize, Serialize};

/// One page of OCR output, as returned by the remote service.
///
/// Any of the three content fields may be missing. The collector prefers
/// `markdown`, then `text`, then `blocks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// Zero-based page position.
    pub index: usize,

    /// Page content as Markdown.
    #[serde(default)]
    pub markdown: Option<String>,

    /// Page content as plain text.
    #[serde(default)]
    pub text: Option<String>,

    /// Block-level fragments in reading order.
    #[serde(default)]
    pub blocks: Option<Vec<TextBlock>>,
}

impl PageResult {
    /// A page carrying only Markdown.
    pub fn from_markdown(index: usize, markdown: impl Into<String>) -> Self {
        Self {
            index,
            markdown: Some(markdown.into()),
            ..Default::default()
        }
    }

    /// A page carrying only plain text.
    pub fn from_text(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A block-level text fragment inside a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Block type reported by the service (e.g. `"text"`, `"title"`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub text: Option<String>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: None,
            text: Some(text.into()),
        }
    }
}

/// Complete result of converting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final Markdown, header included.
    pub markdown: String,

    /// Raw page results the document was assembled from.
    pub pages: Vec<PageResult>,

    pub stats: ConversionStats,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages returned by the remote call (or read from the PDF for the text variant).
    pub total_pages: usize,

    /// Tokens consumed by the completion call; zero for the OCR variants.
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,

    /// Wall-clock time spent in the remote call.
    pub remote_duration_ms: u64,

    /// Wall-clock time for the whole conversion.
    pub total_duration_ms: u64,

    /// Length of the final Markdown in characters.
    pub output_chars: usize,
}
