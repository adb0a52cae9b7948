//! Pipeline stages for image/PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one step. The remote stages
//! ([`ocr`], [`llm`]) and the pdfium stage ([`render`]) produce page results;
//! the pure core ([`collect`], [`postprocess`], [`envelope`]) turns them into
//! the final document.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr | llm ──▶ collect ──▶ postprocess ──▶ envelope ──▶ postprocess
//! (path/URL) (pdfium)   (remote)     (fold)      (normalize)     (header)      (finalize)
//! ```
//!
//! 1. [`input`]       — validate and classify the path or URL
//! 2. [`render`]      — image → one-page PDF, or PDF → text; `spawn_blocking`
//! 3. [`ocr`]         — Mistral Files + OCR calls with retry/backoff
//! 4. [`llm`]         — chat completion for the text variant
//! 5. [`collect`]     — fold page results into one candidate document
//! 6. [`postprocess`] — `%` stripping, blank-line and whitespace cleanup
//! 7. [`envelope`]    — front-matter header

pub mod collect;
pub mod envelope;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;

/// Upper bound on a single retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Wait before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`, capped
/// at [`MAX_BACKOFF_MS`]. Never overflows, whatever the retry count.
pub fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1_000);
        assert_eq!(backoff_ms(500, 3), 2_000);
    }

    #[test]
    fn backoff_is_capped_and_never_overflows() {
        assert_eq!(backoff_ms(500, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(500, 65), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(u64::MAX, 2), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(0, u32::MAX), 0);
    }
}
