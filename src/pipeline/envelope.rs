//! Metadata envelope: the front-matter header prepended to every document.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Header fields written above the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    pub title: String,
    pub date: NaiveDate,
    pub source: String,
    /// Only set by the text-extraction pipeline.
    pub pages: Option<usize>,
}

impl MetadataEnvelope {
    /// Envelope dated today (UTC).
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: Utc::now().date_naive(),
            source: source.into(),
            pages: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    /// The header block, ending with the mandatory blank line.
    pub fn header(&self) -> String {
        let mut header = String::from("---\n");
        header.push_str(&format!("title: {}\n", self.title));
        header.push_str(&format!("date: {}\n", self.date.format("%Y-%m-%d")));
        header.push_str(&format!("source: {}\n", self.source));
        if let Some(pages) = self.pages {
            header.push_str(&format!("pages: {}\n", pages));
        }
        header.push_str("---\n\n");
        header
    }

    /// Header followed by `body`.
    pub fn wrap(&self, body: &str) -> String {
        let mut out = self.header();
        out.push_str(body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn header_without_pages() {
        let env = MetadataEnvelope::new("doc", "test").with_date(date());
        assert_eq!(
            env.wrap("body"),
            "---\ntitle: doc\ndate: 2024-01-01\nsource: test\n---\n\nbody"
        );
    }

    #[test]
    fn header_with_pages() {
        let env = MetadataEnvelope::new("report", "PDF conversion (Mistral AI)")
            .with_date(date())
            .with_pages(12);
        assert_eq!(
            env.header(),
            "---\ntitle: report\ndate: 2024-01-01\nsource: PDF conversion (Mistral AI)\npages: 12\n---\n\n"
        );
    }

    #[test]
    fn default_date_is_iso_formatted() {
        let header = MetadataEnvelope::new("t", "s").header();
        let line = header.lines().nth(2).unwrap();
        let value = line.strip_prefix("date: ").unwrap();
        assert!(NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(), "got {line}");
    }
}
