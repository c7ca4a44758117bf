//! Document-to-Markdown conversion through a Docling sidecar service.
//!
//! Office formats and plain text are uploaded as-is; the service answers with the
//! document rendered as Markdown, which downstream extraction treats as the
//! canonical text form.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced while converting a document to Markdown.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Conversion service could not be reached.
    #[error("Docling service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Source file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        /// Path as supplied by the caller.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// Service rejected the document or returned an error status.
    #[error("Docling conversion failed: {0}")]
    ConversionFailed(String),
    /// Service response could not be parsed.
    #[error("Malformed Docling response: {0}")]
    InvalidResponse(String),
}

/// HTTP client for the Docling conversion service.
pub struct DoclingClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DoclingResponse {
    status: String,
    #[serde(default)]
    markdown: Option<String>,
}

impl DoclingClient {
    /// Build a client for the given service URL with a per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("tenderbrief/convert")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for document conversion");
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Probe the service health endpoint.
    pub async fn health(&self) -> Result<(), ConvertError> {
        let response = self
            .http
            .get(self.endpoint("health"))
            .send()
            .await
            .map_err(|error| {
                ConvertError::ServiceUnavailable(format!(
                    "failed to reach Docling at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            return Err(ConvertError::ServiceUnavailable(format!(
                "Docling health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Upload a document and return its Markdown rendition.
    pub async fn convert_to_markdown(&self, path: &Path) -> Result<String, ConvertError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ConvertError::FileRead {
                path: path.display().to_string(),
                source,
            })?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))
            .map_err(|error| {
                ConvertError::ConversionFailed(format!("failed to build upload part: {error}"))
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("parse"))
            .multipart(form)
            .send()
            .await
            .map_err(|error| {
                ConvertError::ServiceUnavailable(format!(
                    "failed to reach Docling at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConvertError::ConversionFailed(format!(
                "Docling returned {status}: {body}"
            )));
        }

        let body: DoclingResponse = response.json().await.map_err(|error| {
            ConvertError::InvalidResponse(format!("failed to decode Docling response: {error}"))
        })?;

        if body.status != "success" {
            return Err(ConvertError::ConversionFailed(format!(
                "Docling reported status {:?}",
                body.status
            )));
        }

        // An empty string is a valid rendition of an empty document; only an
        // absent field makes the response malformed.
        body.markdown.ok_or_else(|| {
            ConvertError::InvalidResponse("Docling response missing markdown".into())
        })
    }
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), contents).expect("write temp file");
        file
    }

    #[tokio::test]
    async fn converts_document_to_markdown() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));
        let file = write_temp("plain contents", ".txt");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200).json_body(json!({
                    "status": "success",
                    "markdown": "# Tender\n\nplain contents"
                }));
            })
            .await;

        let markdown = client
            .convert_to_markdown(file.path())
            .await
            .expect("markdown");

        mock.assert();
        assert_eq!(markdown, "# Tender\n\nplain contents");
    }

    #[tokio::test]
    async fn empty_markdown_is_a_valid_empty_document() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));
        let file = write_temp("", ".txt");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200)
                    .json_body(json!({ "status": "success", "markdown": "" }));
            })
            .await;

        let markdown = client
            .convert_to_markdown(file.path())
            .await
            .expect("empty document");
        assert_eq!(markdown, "");
    }

    #[tokio::test]
    async fn missing_markdown_field_is_malformed() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));
        let file = write_temp("contents", ".txt");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200).json_body(json!({ "status": "success" }));
            })
            .await;

        let error = client
            .convert_to_markdown(file.path())
            .await
            .expect_err("missing markdown");
        assert!(matches!(error, ConvertError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn reports_service_side_failure_status() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));
        let file = write_temp("contents", ".docx");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200)
                    .json_body(json!({ "status": "failure", "markdown": null }));
            })
            .await;

        let error = client
            .convert_to_markdown(file.path())
            .await
            .expect_err("failure status");
        assert!(matches!(error, ConvertError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn reports_http_error_with_status_and_body() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));
        let file = write_temp("contents", ".txt");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(500).body("conversion backend crashed");
            })
            .await;

        let error = client
            .convert_to_markdown(file.path())
            .await
            .expect_err("http error");
        match error {
            ConvertError::ConversionFailed(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("conversion backend crashed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported_with_path() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));

        let error = client
            .convert_to_markdown(Path::new("/nonexistent/tender.docx"))
            .await
            .expect_err("missing file");
        match error {
            ConvertError::FileRead { path, .. } => {
                assert_eq!(path, "/nonexistent/tender.docx");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_probe_accepts_success() {
        let server = MockServer::start_async().await;
        let client = DoclingClient::new(server.base_url(), Duration::from_secs(5));

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200).body("ok");
            })
            .await;

        client.health().await.expect("healthy");
        mock.assert();
    }
}
