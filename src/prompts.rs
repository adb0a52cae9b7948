//! Prompts for the text-extraction pipeline.
//!
//! The OCR pipelines send no prompt at all; only the text variant asks an LLM
//! to turn raw extracted PDF text into Markdown. Callers can override the
//! template via [`crate::config::ConversionConfig::system_prompt`].

/// Default formatting template. `{file_name}` and `{text}` are substituted.
pub const DEFAULT_MARKDOWN_PROMPT: &str = r#"Below is text extracted from a PDF. Reformat it as Markdown.
- Identify headings and sub-headings and mark them with # and ##
- Normalise bulleted lists to - or * style
- Split paragraphs where appropriate
- Convert any tables into Markdown tables
- Format a table of contents, if present
- Output only Markdown, with no additional explanation
- Do not change the content of the original text; change only its formatting

PDF file name: {file_name}

Extracted text:
{text}
"#;

/// Fill the prompt template for one document.
pub fn markdown_prompt(template: Option<&str>, file_name: &str, text: &str) -> String {
    template
        .unwrap_or(DEFAULT_MARKDOWN_PROMPT)
        .replace("{file_name}", file_name)
        .replace("{text}", text)
}
