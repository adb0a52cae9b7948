//! Mistral OCR client: upload a PDF, sign its URL, run OCR.
//!
//! The OCR endpoint reads documents by URL, so a local PDF takes three
//! requests: `POST /files` (multipart, `purpose=ocr`), `GET
//! /files/{id}/url` for a signed download URL, and `POST /ocr` with that URL
//! as a `document_url`. A remote PDF skips straight to the last step.
//!
//! ## Retry Strategy
//!
//! Timeouts, connection failures, HTTP 429 and 5xx are retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`, capped at one
//! minute). Authentication
//! failures and other 4xx responses are returned immediately.

use crate::config::ConversionConfig;
use crate::error::Ocr2MdError;
use crate::output::PageResult;
use crate::pipeline::backoff_ms;
use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const PROVIDER: &str = "mistral";

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: DocumentSource<'a>,
    include_image_base64: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum DocumentSource<'a> {
    #[serde(rename = "document_url")]
    Url { document_url: &'a str },
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

/// Parsed body of a successful `POST /ocr`.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    pub pages: Vec<PageResult>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage_info: Option<UsageInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub pages_processed: u64,
    #[serde(default)]
    pub doc_size_bytes: Option<u64>,
}

// ── Client ──────────────────────────────────────────────────────────────────

pub struct MistralOcrClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    expiry_hours: u32,
    include_image_base64: bool,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl MistralOcrClient {
    /// Build a client from the conversion config.
    ///
    /// The API key comes from `config.mistral_api_key`, else `MISTRAL_API_KEY`.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Ocr2MdError> {
        let api_key = resolve_api_key(
            config.mistral_api_key.as_deref(),
            std::env::var("MISTRAL_API_KEY").ok(),
        )?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Ocr2MdError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.mistral_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.ocr_model.clone(),
            expiry_hours: config.signed_url_expiry_hours,
            include_image_base64: config.include_image_base64,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        })
    }

    /// Upload PDF bytes and OCR them.
    pub async fn process_pdf_bytes(
        &self,
        file_name: &str,
        pdf: Vec<u8>,
    ) -> Result<OcrResponse, Ocr2MdError> {
        let file_id = self.upload(file_name, pdf).await?;
        let url = self.signed_url(&file_id).await?;
        self.process_url(&url).await
    }

    /// Upload a PDF to the Files API, returning its id.
    pub async fn upload(&self, file_name: &str, pdf: Vec<u8>) -> Result<String, Ocr2MdError> {
        info!("Uploading {} ({} bytes) to Mistral Files API", file_name, pdf.len());

        let url = format!("{}/files", self.base_url);
        let resp = self
            .send_with_retry("file upload", || {
                let part = Part::bytes(pdf.clone())
                    .file_name(file_name.to_string())
                    .mime_str("application/pdf")
                    .map_err(|e| Ocr2MdError::Internal(format!("multipart: {e}")))?;
                let form = Form::new().part("file", part).text("purpose", "ocr");
                Ok(self.client.post(&url).bearer_auth(&self.api_key).multipart(form))
            })
            .await?;

        let upload: FileUploadResponse = parse_json(resp, "file upload").await?;
        info!("Uploaded file: id={}", upload.id);
        Ok(upload.id)
    }

    /// Fetch a signed download URL for an uploaded file.
    pub async fn signed_url(&self, file_id: &str) -> Result<String, Ocr2MdError> {
        let url = format!("{}/files/{}/url", self.base_url, file_id);
        let expiry = self.expiry_hours.to_string();
        let resp = self
            .send_with_retry("signed URL", || {
                Ok(self
                    .client
                    .get(&url)
                    .bearer_auth(&self.api_key)
                    .query(&[("expiry", expiry.as_str())]))
            })
            .await?;

        let signed: SignedUrlResponse = parse_json(resp, "signed URL").await?;
        debug!("Obtained signed URL for file {}", file_id);
        Ok(signed.url)
    }

    /// Run OCR on a document reachable at `document_url`.
    pub async fn process_url(&self, document_url: &str) -> Result<OcrResponse, Ocr2MdError> {
        info!("Requesting OCR with model {}", self.model);
        let start = Instant::now();

        let url = format!("{}/ocr", self.base_url);
        let body = OcrRequest {
            model: &self.model,
            document: DocumentSource::Url { document_url },
            include_image_base64: self.include_image_base64,
        };

        let resp = self
            .send_with_retry("OCR request", || {
                Ok(self.client.post(&url).bearer_auth(&self.api_key).json(&body))
            })
            .await?;

        let ocr: OcrResponse = parse_json(resp, "OCR request").await?;
        info!(
            "OCR complete: {} pages in {}ms",
            ocr.pages.len(),
            start.elapsed().as_millis()
        );
        if let Some(ref usage) = ocr.usage_info {
            debug!(
                "OCR usage: {} pages processed, {:?} bytes",
                usage.pages_processed, usage.doc_size_bytes
            );
        }
        for page in &ocr.pages {
            debug!(
                "Page {}: markdown {} chars, text {}, blocks {}",
                page.index,
                page.markdown.as_deref().map(str::len).unwrap_or(0),
                page.text.is_some(),
                page.blocks.as_ref().map(Vec::len).unwrap_or(0)
            );
        }
        Ok(ocr)
    }

    async fn send_with_retry<F>(&self, stage: &str, build: F) -> Result<Response, Ocr2MdError>
    where
        F: Fn() -> Result<RequestBuilder, Ocr2MdError>,
    {
        let mut last_err: Option<Ocr2MdError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    stage, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let err = match build()?.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let err = status_error(resp).await;
                    if !is_retryable(&err) {
                        return Err(err);
                    }
                    err
                }
                Err(e) if e.is_timeout() => Ocr2MdError::ApiTimeout {
                    stage: stage.to_string(),
                    secs: self.timeout_secs,
                },
                Err(e) => Ocr2MdError::OcrApiError {
                    status: 0,
                    message: e.to_string(),
                },
            };

            warn!("{}: attempt {} failed — {}", stage, attempt + 1, err);
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| Ocr2MdError::Internal(format!("{stage}: no attempt made"))))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn resolve_api_key(explicit: Option<&str>, env: Option<String>) -> Result<String, Ocr2MdError> {
    explicit
        .map(str::to_string)
        .or(env)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Ocr2MdError::ProviderNotConfigured {
            provider: PROVIDER.to_string(),
            hint: "Set MISTRAL_API_KEY (environment or .env file) or pass --mistral-api-key."
                .into(),
        })
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    resp: Response,
    stage: &str,
) -> Result<T, Ocr2MdError> {
    let status = resp.status().as_u16();
    let raw = resp.text().await.map_err(|e| Ocr2MdError::OcrApiError {
        status,
        message: format!("{stage}: failed to read body: {e}"),
    })?;
    debug!(
        "{}: raw response ({} bytes): {}",
        stage,
        raw.len(),
        raw.chars().take(500).collect::<String>()
    );
    serde_json::from_str(&raw).map_err(|e| Ocr2MdError::OcrApiError {
        status,
        message: format!("{stage}: unexpected response shape: {e}"),
    })
}

async fn status_error(resp: Response) -> Ocr2MdError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());
    let body = resp.text().await.unwrap_or_default();
    classify_status(status, retry_after, body)
}

/// Map a non-success HTTP status to an error.
fn classify_status(status: u16, retry_after_secs: Option<u64>, body: String) -> Ocr2MdError {
    match status {
        401 | 403 => Ocr2MdError::AuthError {
            provider: PROVIDER.to_string(),
            detail: body,
        },
        429 => Ocr2MdError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after_secs,
        },
        _ => Ocr2MdError::OcrApiError {
            status,
            message: body,
        },
    }
}

fn is_retryable(err: &Ocr2MdError) -> bool {
    match err {
        Ocr2MdError::RateLimitExceeded { .. } | Ocr2MdError::ApiTimeout { .. } => true,
        Ocr2MdError::OcrApiError { status, .. } => *status == 0 || *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn ocr_response_parses_pages() {
        let raw = r##"{
            "pages": [
                {
                    "index": 0,
                    "markdown": "# Title\n\nBody% text.",
                    "images": [],
                    "dimensions": {"dpi": 200, "height": 2200, "width": 1700}
                },
                {
                    "index": 1,
                    "markdown": "![img-0.jpeg](img-0.jpeg)",
                    "text": "caption",
                    "blocks": [{"type": "text", "text": "caption", "confidence": 0.9}]
                }
            ],
            "model": "mistral-ocr-2505",
            "usage_info": {"pages_processed": 2, "doc_size_bytes": 12345}
        }"##;
        let resp: OcrResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.pages.len(), 2);
        assert_eq!(resp.pages[0].markdown.as_deref(), Some("# Title\n\nBody% text."));
        assert!(resp.pages[0].text.is_none());
        assert_eq!(resp.pages[1].index, 1);
        let blocks = resp.pages[1].blocks.as_ref().unwrap();
        assert_eq!(blocks[0].kind.as_deref(), Some("text"));
        assert_eq!(blocks[0].text.as_deref(), Some("caption"));
        assert_eq!(resp.usage_info.unwrap().pages_processed, 2);
    }

    #[test]
    fn ocr_request_serialises_document_url() {
        let body = OcrRequest {
            model: "mistral-ocr-latest",
            document: DocumentSource::Url {
                document_url: "https://signed.example/doc",
            },
            include_image_base64: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "mistral-ocr-latest");
        assert_eq!(json["document"]["type"], "document_url");
        assert_eq!(json["document"]["document_url"], "https://signed.example/doc");
        assert_eq!(json["include_image_base64"], false);
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(401, None, "bad key".into()),
            Ocr2MdError::AuthError { .. }
        ));
        assert!(matches!(
            classify_status(429, Some(30), String::new()),
            Ocr2MdError::RateLimitExceeded {
                retry_after_secs: Some(30),
                ..
            }
        ));
        assert!(matches!(
            classify_status(422, None, "bad doc".into()),
            Ocr2MdError::OcrApiError { status: 422, .. }
        ));
    }

    #[test]
    fn retryable_errors() {
        assert!(is_retryable(&classify_status(503, None, String::new())));
        assert!(is_retryable(&classify_status(429, None, String::new())));
        assert!(!is_retryable(&classify_status(400, None, String::new())));
        assert!(!is_retryable(&classify_status(403, None, String::new())));
    }

    #[test]
    fn api_key_resolution() {
        assert_eq!(resolve_api_key(Some("k1"), Some("k2".into())).unwrap(), "k1");
        assert_eq!(resolve_api_key(None, Some("k2".into())).unwrap(), "k2");
        assert!(matches!(
            resolve_api_key(None, None),
            Err(Ocr2MdError::ProviderNotConfigured { .. })
        ));
        assert!(resolve_api_key(Some("  "), None).is_err());
    }

    #[test]
    fn client_trims_base_url() {
        let config = ConversionConfig::builder()
            .mistral_api_key("test-key")
            .mistral_base_url("http://localhost:9/v1/")
            .build()
            .unwrap();
        let client = MistralOcrClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/v1");
        assert_eq!(client.model, "mistral-ocr-latest");
    }

    fn unreachable_client(max_retries: u32) -> MistralOcrClient {
        let config = ConversionConfig::builder()
            .mistral_api_key("test-key")
            .mistral_base_url("http://127.0.0.1:1/v1")
            .max_retries(max_retries)
            .retry_backoff_ms(0)
            .api_timeout_secs(5)
            .build()
            .unwrap();
        MistralOcrClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn many_retries_against_unreachable_host_fail_cleanly() {
        let client = unreachable_client(70);
        let err = client
            .process_url("https://example.com/doc.pdf")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Ocr2MdError::OcrApiError { status: 0, .. }),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn connection_errors_use_every_attempt() {
        let client = unreachable_client(3);
        let attempts = Cell::new(0u32);
        let err = client
            .send_with_retry("test", || {
                attempts.set(attempts.get() + 1);
                Ok(client.client.get("http://127.0.0.1:1/"))
            })
            .await
            .unwrap_err();
        assert_eq!(attempts.get(), 4);
        assert!(matches!(err, Ocr2MdError::OcrApiError { status: 0, .. }));
    }

    #[tokio::test]
    async fn request_build_error_is_not_retried() {
        let client = unreachable_client(3);
        let attempts = Cell::new(0u32);
        let err = client
            .send_with_retry("test", || {
                attempts.set(attempts.get() + 1);
                Err(Ocr2MdError::Internal("multipart".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(attempts.get(), 1);
        assert!(matches!(err, Ocr2MdError::Internal(_)));
    }
}
