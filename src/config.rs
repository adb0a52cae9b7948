//! Configuration types for image/PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob for all
//! three pipeline variants; fields a variant does not use are ignored.

use crate::error::Ocr2MdError;
use chrono::NaiveDate;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Mistral OCR model.
pub const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";

/// Default Mistral REST base URL.
pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Default chat-completion provider for the text variant.
pub const DEFAULT_LLM_PROVIDER: &str = "openrouter";

/// Default chat-completion model for the text variant.
pub const DEFAULT_LLM_MODEL: &str = "mistralai/mistral-large";

/// Default model for free-form chat prompts.
pub const DEFAULT_CHAT_MODEL: &str = "mistralai/mistral-7b-instruct";

/// Configuration for a single conversion.
///
/// # Example
/// ```rust
/// use ocr2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .ocr_model("mistral-ocr-latest")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Mistral OCR model identifier. Default: `mistral-ocr-latest`.
    pub ocr_model: String,

    /// Base URL of the Mistral REST API. Default: `https://api.mistral.ai/v1`.
    pub mistral_base_url: String,

    /// Mistral API key. If None, `MISTRAL_API_KEY` is read at call time.
    pub mistral_api_key: Option<String>,

    /// Lifetime of the signed document URL, in hours. Default: 24.
    pub signed_url_expiry_hours: u32,

    /// Ask the OCR service to embed extracted images as base64. Default: false.
    pub include_image_base64: bool,

    /// LLM provider name for the text variant. Default: `openrouter`.
    pub provider_name: Option<String>,

    /// LLM model for the text variant. Default: `mistralai/mistral-large`.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Maximum completion tokens. None leaves the provider default in place.
    pub max_tokens: Option<usize>,

    /// Custom formatting prompt. `{file_name}` and `{text}` are substituted.
    pub system_prompt: Option<String>,

    /// Maximum retry attempts on a transient remote failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// PDF user password for local text extraction.
    pub password: Option<String>,

    /// Envelope title override. Default: input base name without extension.
    pub title: Option<String>,

    /// Envelope date override. Default: today (UTC).
    pub date: Option<NaiveDate>,

    /// Envelope source label override. Default: the pipeline's own label.
    pub source_label: Option<String>,

    /// Literal repairs applied to the final output before the last `%` sweep.
    pub repair_phrases: Vec<RepairPhrase>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            mistral_base_url: DEFAULT_MISTRAL_BASE_URL.to_string(),
            mistral_api_key: None,
            signed_url_expiry_hours: 24,
            include_image_base64: false,
            provider_name: None,
            model: None,
            provider: None,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            password: None,
            title: None,
            date: None,
            source_label: None,
            repair_phrases: RepairPhrase::defaults(),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("ocr_model", &self.ocr_model)
            .field("mistral_base_url", &self.mistral_base_url)
            .field(
                "mistral_api_key",
                &self.mistral_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("title", &self.title)
            .field("date", &self.date)
            .field("source_label", &self.source_label)
            .field("repair_phrases", &self.repair_phrases.len())
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn mistral_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.mistral_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn mistral_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.mistral_api_key = Some(key.into());
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours.max(1);
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.config.date = Some(date);
        self
    }

    pub fn source_label(mut self, label: impl Into<String>) -> Self {
        self.config.source_label = Some(label.into());
        self
    }

    pub fn repair_phrases(mut self, phrases: Vec<RepairPhrase>) -> Self {
        self.config.repair_phrases = phrases;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Ocr2MdError> {
        let c = &self.config;
        if c.ocr_model.trim().is_empty() {
            return Err(Ocr2MdError::InvalidConfig("OCR model must not be empty".into()));
        }
        if !c.mistral_base_url.starts_with("http://") && !c.mistral_base_url.starts_with("https://")
        {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "Mistral base URL must be http(s), got '{}'",
                c.mistral_base_url
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(Ocr2MdError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(p) = c.repair_phrases.iter().find(|p| p.find.is_empty()) {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "Repair phrase with replacement '{}' has an empty search string",
                p.replace
            )));
        }
        Ok(self.config)
    }
}

// ── Pipeline variants ────────────────────────────────────────────────────

/// Which remote pipeline produces the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pipeline {
    /// PNG/JPEG → one-page PDF → Mistral OCR.
    ImageOcr,
    /// PDF (file or URL) → Mistral OCR.
    PdfOcr,
    /// PDF → local text extraction → chat completion.
    PdfText,
}

impl Pipeline {
    /// Label written to the envelope's `source` field.
    pub fn source_label(self) -> &'static str {
        match self {
            Pipeline::ImageOcr => "Image OCR (Mistral OCR)",
            Pipeline::PdfOcr => "PDF conversion (Mistral OCR)",
            Pipeline::PdfText => "PDF conversion (Mistral AI)",
        }
    }

    /// Suffix appended to the input stem for the default output file name.
    pub fn output_suffix(self) -> &'static str {
        match self {
            Pipeline::ImageOcr | Pipeline::PdfOcr => "_ocr",
            Pipeline::PdfText => "",
        }
    }

    /// Whether the envelope carries a `pages:` line.
    pub fn reports_pages(self) -> bool {
        matches!(self, Pipeline::PdfText)
    }
}

/// A literal fragment known to come back corrupted, and its repair.
///
/// Phrases are matched before any `%` is stripped, so `find` may contain `%`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPhrase {
    pub find: String,
    pub replace: String,
}

impl RepairPhrase {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }

    /// Fragments observed in Mistral OCR output.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("bodies can be extracted%", "bodies can be extracted"),
            Self::new(
                "English existing bodies can be extracted%",
                "English existing bodies can be extracted",
            ),
        ]
    }
}
