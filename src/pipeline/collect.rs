//! Collection: fold per-page OCR results into one candidate document.
//!
//! Each page contributes at most one of its three representations, in
//! preference order Markdown → plain text → blocks. The fallbacks (text and
//! blocks) are gated on a document-wide flag: once *any* page has contributed,
//! no later page may fall back. A page whose Markdown is only an image
//! reference therefore contributes nothing if an earlier page already did.

use crate::error::Ocr2MdError;
use crate::output::PageResult;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Accumulator threaded through the fold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub has_content: bool,
}

impl Candidate {
    /// Absorb one page, returning the updated accumulator.
    pub fn absorb(mut self, page: &PageResult) -> Self {
        if let Some(md) = usable_markdown(page) {
            debug!("Page {}: using Markdown ({} chars)", page.index, md.len());
            self.push(md);
            return self;
        }

        if self.has_content {
            return self;
        }

        if let Some(text) = page.text.as_deref().filter(|t| !t.trim().is_empty()) {
            debug!("Page {}: falling back to plain text", page.index);
            self.push(text);
            return self;
        }

        if let Some(blocks) = page.blocks.as_deref().filter(|b| !b.is_empty()) {
            let joined: String = blocks
                .iter()
                .filter_map(|b| b.text.as_deref())
                .map(|t| format!("{t}\n"))
                .collect();
            if !joined.trim().is_empty() {
                debug!("Page {}: falling back to {} blocks", page.index, blocks.len());
                self.push(&joined);
            }
        }

        self
    }

    fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.text.push_str("\n\n");
        self.has_content = true;
    }
}

static RE_IMAGE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\[.*\]\(.*\)$").unwrap());

/// True when the trimmed string is a single `![alt](url)` and nothing else.
pub fn is_image_reference_only(markdown: &str) -> bool {
    RE_IMAGE_ONLY.is_match(markdown.trim())
}

fn usable_markdown(page: &PageResult) -> Option<&str> {
    page.markdown
        .as_deref()
        .filter(|md| !md.trim().is_empty() && !is_image_reference_only(md))
}

/// Fold the pages into a single candidate string.
///
/// # Errors
/// [`Ocr2MdError::NoExtractableContent`] when no page contributed.
pub fn collect_pages(pages: &[PageResult]) -> Result<String, Ocr2MdError> {
    let candidate = pages.iter().fold(Candidate::default(), Candidate::absorb);

    if !candidate.has_content {
        return Err(Ocr2MdError::NoExtractableContent { pages: pages.len() });
    }

    debug!(
        "Collected {} chars from {} pages",
        candidate.text.len(),
        pages.len()
    );
    Ok(candidate.text)
}
