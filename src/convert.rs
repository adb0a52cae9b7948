//! Conversion entry points.
//!
//! [`convert`] runs one document through one [`Pipeline`] and returns the
//! final Markdown. [`convert_to_file`] does the same and writes the result.
//! [`render_document`] is the pure core shared by every variant: it needs no
//! network, no pdfium and no file system.

use crate::config::{ConversionConfig, Pipeline, RepairPhrase, DEFAULT_CHAT_MODEL};
use crate::error::Ocr2MdError;
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::envelope::MetadataEnvelope;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{self, Completion};
use crate::pipeline::ocr::MistralOcrClient;
use crate::pipeline::{collect, postprocess, render};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Assemble the final Markdown from page results.
///
/// collect → repair phrases → normalize → prepend header → finalize.
///
/// # Errors
/// [`Ocr2MdError::NoExtractableContent`] when no page carries usable text.
pub fn render_document(
    pages: &[PageResult],
    envelope: &MetadataEnvelope,
    repair_phrases: &[RepairPhrase],
) -> Result<String, Ocr2MdError> {
    let candidate = collect::collect_pages(pages)?;
    let repaired = postprocess::repair(candidate.trim(), repair_phrases);
    let body = postprocess::normalize(&repaired);
    let document = envelope.wrap(body.trim());
    // Phrases were already applied to the body; the header holds none.
    Ok(postprocess::finalize(&document, &[]))
}

/// Convert an image or PDF to Markdown.
///
/// # Arguments
/// * `input_str` — local file path, or an HTTP/HTTPS URL for [`Pipeline::PdfOcr`]
/// * `pipeline`  — which remote pipeline produces the content
/// * `config`    — conversion configuration
///
/// # Errors
/// Input validation errors, remote API errors, or
/// [`Ocr2MdError::NoExtractableContent`].
pub async fn convert(
    input_str: impl AsRef<str>,
    pipeline: Pipeline,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting {:?} conversion: {}", pipeline, input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, pipeline)?;

    // ── Step 2: Produce page results ─────────────────────────────────────
    let remote_start = Instant::now();
    let (pages, page_count, tokens) = match pipeline {
        Pipeline::ImageOcr | Pipeline::PdfOcr => {
            let pages = run_ocr(&resolved, config).await?;
            (pages, None, (0, 0))
        }
        Pipeline::PdfText => {
            let (page, count, completion) = run_text(&resolved, config).await?;
            let tokens = (
                completion.input_tokens as u64,
                completion.output_tokens as u64,
            );
            (vec![page], Some(count), tokens)
        }
    };
    let remote_duration_ms = remote_start.elapsed().as_millis() as u64;

    // ── Step 3: Assemble ─────────────────────────────────────────────────
    let envelope = build_envelope(&resolved, pipeline, page_count, config);
    let markdown = render_document(&pages, &envelope, &config.repair_phrases)?;

    let stats = ConversionStats {
        total_pages: page_count.unwrap_or(pages.len()),
        total_input_tokens: tokens.0,
        total_output_tokens: tokens.1,
        remote_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        output_chars: markdown.chars().count(),
    };

    info!(
        "Conversion complete: {} pages, {} chars, {}ms total",
        stats.total_pages, stats.output_chars, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        markdown,
        pages,
        stats,
    })
}

/// Convert and write the result to `output_path`.
///
/// Nothing is written when the conversion fails.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    pipeline: Pipeline,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    let output = convert(input_str, pipeline, config).await?;
    write_markdown(output_path.as_ref(), &output.markdown).await?;
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    pipeline: Pipeline,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Ocr2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ocr2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, pipeline, config))
}

/// Write `markdown` to `path` as UTF-8, creating parent directories.
///
/// Uses atomic write (temp file + rename) so an existing file is either
/// fully replaced or left untouched.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<(), Ocr2MdError> {
    let write_failed = |e| Ocr2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    info!("Wrote Markdown file: {}", path.display());
    debug!(
        "Written file holds unescaped %: {}",
        postprocess::has_unescaped_percent(markdown)
    );
    Ok(())
}

/// Send a free-form prompt to the configured LLM and return its reply.
///
/// Uses [`DEFAULT_CHAT_MODEL`] when neither a provider nor a model is set.
pub async fn chat(prompt: &str, config: &ConversionConfig) -> Result<Completion, Ocr2MdError> {
    let provider = if config.provider.is_none() && config.model.is_none() {
        let mut chat_config = config.clone();
        chat_config.model = Some(DEFAULT_CHAT_MODEL.to_string());
        llm::resolve_provider(&chat_config)?
    } else {
        llm::resolve_provider(config)?
    };
    llm::complete(&provider, prompt, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_ocr(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<Vec<PageResult>, Ocr2MdError> {
    let client = MistralOcrClient::from_config(config)?;

    let response = match resolved {
        ResolvedInput::Url(url) => client.process_url(url).await?,
        ResolvedInput::Local { path, kind, .. } => {
            let pdf = if kind.is_image() {
                render::image_to_pdf(path, *kind).await?
            } else {
                tokio::fs::read(path)
                    .await
                    .map_err(|_| Ocr2MdError::FileNotFound { path: path.clone() })?
            };
            client.process_pdf_bytes(&resolved.upload_name(), pdf).await?
        }
    };

    if response.pages.is_empty() {
        return Err(Ocr2MdError::NoPages {
            input: resolved.title(),
        });
    }
    Ok(response.pages)
}

async fn run_text(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<(PageResult, usize, Completion), Ocr2MdError> {
    let ResolvedInput::Local { path, .. } = resolved else {
        return Err(Ocr2MdError::UnsupportedInputFormat {
            input: resolved.title(),
            format: "url".into(),
            hint: "The text pipeline needs a local PDF.".into(),
        });
    };

    let extracted = render::extract_text(path, config.password.as_deref()).await?;
    info!(
        "Extracted {} chars from {} pages",
        extracted.text.len(),
        extracted.page_count
    );

    let provider = llm::resolve_provider(config)?;
    let completion =
        llm::format_as_markdown(&provider, &resolved.title(), &extracted.text, config).await?;

    let page = PageResult::from_markdown(0, completion.content.clone());
    Ok((page, extracted.page_count, completion))
}

fn build_envelope(
    resolved: &ResolvedInput,
    pipeline: Pipeline,
    page_count: Option<usize>,
    config: &ConversionConfig,
) -> MetadataEnvelope {
    let title = config.title.clone().unwrap_or_else(|| resolved.title());
    let source = config
        .source_label
        .clone()
        .unwrap_or_else(|| pipeline.source_label().to_string());

    let mut envelope = MetadataEnvelope::new(title, source);
    if let Some(date) = config.date {
        envelope = envelope.with_date(date);
    }
    if pipeline.reports_pages() {
        if let Some(count) = page_count {
            envelope = envelope.with_pages(count);
        }
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn fixed_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn envelope_uses_overrides() {
        let resolved = ResolvedInput::Local {
            path: PathBuf::from("/in/scan.png"),
            kind: input::InputKind::Png,
            size_bytes: 1,
        };
        let config = ConversionConfig::builder()
            .title("Custom")
            .source_label("lab")
            .date(fixed_date())
            .build()
            .unwrap();
        let env = build_envelope(&resolved, Pipeline::ImageOcr, None, &config);
        assert_eq!(env.title, "Custom");
        assert_eq!(env.source, "lab");
        assert_eq!(env.date, fixed_date());
        assert_eq!(env.pages, None);
    }

    #[test]
    fn envelope_pages_only_for_text_pipeline() {
        let resolved = ResolvedInput::Local {
            path: PathBuf::from("/in/book.pdf"),
            kind: input::InputKind::Pdf,
            size_bytes: 1,
        };
        let config = ConversionConfig::default();
        let text = build_envelope(&resolved, Pipeline::PdfText, Some(7), &config);
        assert_eq!(text.pages, Some(7));
        assert_eq!(text.title, "book");
        assert_eq!(text.source, "PDF conversion (Mistral AI)");
        let ocr = build_envelope(&resolved, Pipeline::PdfOcr, Some(7), &config);
        assert_eq!(ocr.pages, None);
    }

    #[test]
    fn render_document_rejects_empty_pages() {
        let env = MetadataEnvelope::new("doc", "test").with_date(fixed_date());
        let err = render_document(&[PageResult::default()], &env, &[]).unwrap_err();
        assert!(matches!(err, Ocr2MdError::NoExtractableContent { .. }));
    }

    #[tokio::test]
    async fn write_markdown_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.md");
        write_markdown(&path, "first").await.unwrap();
        write_markdown(&path, "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
