//! Chunk-map-reduce backend over a local Ollama runtime.
//!
//! Office documents and plain text go through Docling conversion, unit
//! splitting, per-unit extraction, and batched merge reduction. Scanned PDFs
//! are OCR'd page by page and folded deterministically, page order first.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::extract::extract_from_units;
use super::merge::{fold_records, merge_across_documents, reduce_records};
use super::narrative::narrate;
use super::splitting::split_into_units;
use super::types::{AnalyzeResult, AnalyzerInitError, FileError};
use super::{DocumentsAnalyzer, extension_of};
use crate::config::{Config, ConfigError};
use crate::convert::DoclingClient;
use crate::llm::{MistralClient, OllamaChatClient};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::schema::{TenderRecord, record_schema};

/// Analyzer backed by a local Ollama runtime for extraction and narration.
pub struct LocalAnalyzer {
    chat: OllamaChatClient,
    docling: DoclingClient,
    ocr: MistralClient,
    schema: Value,
    chunk_capacity: usize,
    chunk_overlap: usize,
    metrics: PipelineMetrics,
}

impl LocalAnalyzer {
    /// Build the analyzer and probe the Ollama runtime.
    ///
    /// An unreachable runtime fails construction; Docling and the OCR service
    /// are only contacted per file, where their failures stay file-scoped.
    pub async fn from_config(config: &Config) -> Result<Self, AnalyzerInitError> {
        let model = config.ollama_model.clone().ok_or_else(|| {
            AnalyzerInitError::Config(ConfigError::MissingVariable("OLLAMA_MODEL".to_string()))
        })?;
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        let chat = OllamaChatClient::new(config.ollama_url.clone(), model, timeout);
        chat.check_connection()
            .await
            .map_err(|error| AnalyzerInitError::ConnectivityCheck(error.to_string()))?;

        Ok(Self {
            chat,
            docling: DoclingClient::new(config.docling_url.clone(), timeout),
            ocr: MistralClient::new(
                config.mistral_base_url.clone(),
                config.mistral_api_key.clone(),
                None,
                config.mistral_ocr_model.clone(),
                timeout,
            ),
            schema: record_schema(),
            chunk_capacity: config.chunk_capacity,
            chunk_overlap: config.chunk_overlap,
            metrics: PipelineMetrics::default(),
        })
    }

    async fn analyze_file(&self, path: &str) -> Result<TenderRecord, FileError> {
        match extension_of(path).as_deref() {
            Some("docx") | Some("txt") => self.analyze_text_document(path).await,
            Some("pdf") => self.analyze_scanned_document(path).await,
            _ => Err(FileError::UnsupportedFileType {
                path: path.to_string(),
            }),
        }
    }

    async fn analyze_text_document(&self, path: &str) -> Result<TenderRecord, FileError> {
        let markdown = self
            .docling
            .convert_to_markdown(Path::new(path))
            .await
            .map_err(|error| FileError::ConversionFailure {
                path: path.to_string(),
                reason: error.to_string(),
            })?;
        let units = split_into_units(&markdown, self.chunk_capacity, self.chunk_overlap);

        info!(path, unit_count = units.len(), "Extracting from chunked document");
        let records = extract_from_units(&self.chat, &self.schema, &units, &self.metrics).await;
        // Zero surviving records reduce to the all-empty record; the file still succeeds.
        Ok(reduce_records(&self.chat, &self.schema, records, &self.metrics).await)
    }

    async fn analyze_scanned_document(&self, path: &str) -> Result<TenderRecord, FileError> {
        let ocr = self
            .ocr
            .ocr_document(Path::new(path), None)
            .await
            .map_err(|error| FileError::ConversionFailure {
                path: path.to_string(),
                reason: error.to_string(),
            })?;
        let units: Vec<String> = ocr
            .pages
            .into_iter()
            .map(|page| page.markdown)
            .filter(|markdown| !markdown.trim().is_empty())
            .collect();

        info!(path, page_count = units.len(), "Extracting from OCR pages");
        let records = extract_from_units(&self.chat, &self.schema, &units, &self.metrics).await;
        // Page records carry disjoint facts; the fill rule keeps earlier pages
        // authoritative, and zero surviving records fold to the all-empty record.
        Ok(fold_records(records))
    }
}

#[async_trait]
impl DocumentsAnalyzer for LocalAnalyzer {
    async fn analyze(&self, file_paths: &[String]) -> AnalyzeResult {
        let mut records = Vec::new();
        let mut file_errors = Vec::new();
        for path in file_paths {
            match self.analyze_file(path).await {
                Ok(record) => {
                    self.metrics.record_file(true);
                    records.push(record);
                }
                Err(error) => {
                    self.metrics.record_file(false);
                    warn!(path = error.path(), error = %error, "File dropped from analysis");
                    file_errors.push(error.path().to_string());
                }
            }
        }

        if records.is_empty() {
            return AnalyzeResult {
                summary: None,
                file_errors,
            };
        }

        let record =
            merge_across_documents(&self.chat, &self.schema, records, &self.metrics).await;
        let summary = narrate(&self.chat, &record).await;
        AnalyzeResult {
            summary,
            file_errors,
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn analyzer_with(ollama_url: String, docling_url: String, ocr_url: String) -> LocalAnalyzer {
        let timeout = Duration::from_secs(5);
        LocalAnalyzer {
            chat: OllamaChatClient::new(ollama_url, "gemma3:12b".into(), timeout),
            docling: DoclingClient::new(docling_url, timeout),
            ocr: MistralClient::new(
                ocr_url,
                "unused".into(),
                None,
                "mistral-ocr-latest".into(),
                timeout,
            ),
            schema: record_schema(),
            chunk_capacity: 750,
            chunk_overlap: 0,
            metrics: PipelineMetrics::default(),
        }
    }

    fn offline_analyzer() -> LocalAnalyzer {
        let dead = "http://127.0.0.1:9".to_string();
        analyzer_with(dead.clone(), dead.clone(), dead)
    }

    #[tokio::test]
    async fn unsupported_extensions_fail_without_any_network_call() {
        let analyzer = offline_analyzer();
        let error = analyzer
            .analyze_file("tender.xls")
            .await
            .expect_err("unsupported");
        assert!(matches!(error, FileError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_result() {
        let analyzer = offline_analyzer();
        let result = analyzer.analyze(&[]).await;
        assert_eq!(result, AnalyzeResult::default());
    }

    #[tokio::test]
    async fn all_failed_files_yield_absent_summary() {
        let analyzer = offline_analyzer();
        let paths = vec!["a.xls".to_string(), "b.unknown".to_string()];
        let result = analyzer.analyze(&paths).await;
        assert!(result.summary.is_none());
        assert_eq!(result.file_errors, paths);
        assert_eq!(analyzer.metrics_snapshot().files_failed, 2);
    }

    #[tokio::test]
    async fn text_document_flows_through_convert_extract_and_narrate() {
        let server = MockServer::start_async().await;
        let analyzer = analyzer_with(
            server.base_url(),
            server.base_url(),
            "http://127.0.0.1:9".into(),
        );
        let file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), "tender text").expect("write");
        let path = file.path().display().to_string();

        let convert = server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200).json_body(json!({
                    "status": "success",
                    "markdown": "Procurement of laptops, notice N-1."
                }));
            })
            .await;
        // One extraction call, then two narration calls; all hit the same endpoint.
        let chat = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": {
                        "role": "assistant",
                        "content": "{\"procurement_name\":\"Laptops\"}"
                    },
                    "done": true
                }));
            })
            .await;

        let result = analyzer.analyze(std::slice::from_ref(&path)).await;

        convert.assert();
        chat.assert_hits(3);
        assert!(result.file_errors.is_empty());
        assert!(
            result
                .summary
                .as_deref()
                .is_some_and(|summary| summary.contains("Laptops"))
        );
        let snapshot = analyzer.metrics_snapshot();
        assert_eq!(snapshot.files_analyzed, 1);
        assert_eq!(snapshot.units_extracted, 1);
        assert_eq!(snapshot.merge_calls, 0);
    }

    #[tokio::test]
    async fn conversion_failure_drops_the_file_only() {
        let server = MockServer::start_async().await;
        let analyzer = analyzer_with(
            server.base_url(),
            server.base_url(),
            "http://127.0.0.1:9".into(),
        );
        let file = tempfile::Builder::new()
            .suffix(".docx")
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), "doc").expect("write");
        let path = file.path().display().to_string();

        server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(500).body("converter down");
            })
            .await;

        let result = analyzer.analyze(std::slice::from_ref(&path)).await;

        assert!(result.summary.is_none());
        assert_eq!(result.file_errors, vec![path]);
    }

    #[tokio::test]
    async fn file_whose_every_unit_fails_is_not_reported_as_failed() {
        let server = MockServer::start_async().await;
        let analyzer = analyzer_with(
            server.base_url(),
            server.base_url(),
            "http://127.0.0.1:9".into(),
        );
        let file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), "tender text").expect("write");
        let path = file.path().display().to_string();

        let convert = server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200).json_body(json!({
                    "status": "success",
                    "markdown": "Procurement of laptops, notice N-1."
                }));
            })
            .await;
        let chat = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("model exploded");
            })
            .await;

        let result = analyzer.analyze(std::slice::from_ref(&path)).await;

        convert.assert();
        // The failed extraction call, then the failed first narration pass.
        chat.assert_hits(2);
        assert!(result.file_errors.is_empty());
        assert!(result.summary.is_none());
        let snapshot = analyzer.metrics_snapshot();
        assert_eq!(snapshot.files_analyzed, 1);
        assert_eq!(snapshot.files_failed, 0);
        assert_eq!(snapshot.units_dropped, 1);
    }

    #[tokio::test]
    async fn empty_document_yields_the_empty_record_without_extraction_calls() {
        let server = MockServer::start_async().await;
        let analyzer = analyzer_with(
            server.base_url(),
            server.base_url(),
            "http://127.0.0.1:9".into(),
        );
        let file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), "").expect("write");
        let path = file.path().display().to_string();

        let convert = server
            .mock_async(|when, then| {
                when.method(POST).path("/parse");
                then.status(200)
                    .json_body(json!({ "status": "success", "markdown": "" }));
            })
            .await;
        let chat = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("model exploded");
            })
            .await;

        let result = analyzer.analyze(std::slice::from_ref(&path)).await;

        convert.assert();
        // Only the failed first narration pass reaches the model.
        chat.assert_hits(1);
        assert!(result.file_errors.is_empty());
        assert!(result.summary.is_none());
        assert_eq!(analyzer.metrics_snapshot().files_analyzed, 1);
    }

    #[tokio::test]
    async fn scanned_document_folds_page_records_without_merge_calls() {
        let server = MockServer::start_async().await;
        let analyzer = analyzer_with(
            server.base_url(),
            "http://127.0.0.1:9".into(),
            server.base_url(),
        );
        let file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .expect("temp file");
        std::fs::write(file.path(), b"%PDF-1.4 scan").expect("write");
        let path = file.path().display().to_string();

        let ocr = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/ocr");
                then.status(200).json_body(json!({
                    "pages": [
                        { "index": 0, "markdown": "First page of the scan", "images": [] },
                        { "index": 1, "markdown": "Second page of the scan", "images": [] },
                        { "index": 2, "markdown": "   ", "images": [] }
                    ]
                }));
            })
            .await;
        let first_page = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .body_contains("First page of the scan");
                then.status(200).json_body(json!({
                    "message": {
                        "role": "assistant",
                        "content": "{\"procurement_name\":\"Street lighting\",\"customer_company_name\":\"City of Kazan\"}"
                    },
                    "done": true
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .body_contains("Second page of the scan");
                then.status(200).json_body(json!({
                    "message": {
                        "role": "assistant",
                        "content": "{\"procurement_name\":\"Cable works\",\"notice_number\":\"0123-77\"}"
                    },
                    "done": true
                }));
            })
            .await;
        let merges = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .body_contains("You merge partial JSON records");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "{}" },
                    "done": true
                }));
            })
            .await;

        let record = analyzer.analyze_file(&path).await.expect("scanned analysis");

        ocr.assert();
        first_page.assert();
        second_page.assert();
        merges.assert_hits(0);
        // The blank page is skipped and the first page wins the conflicting name.
        assert_eq!(record.procurement_name, "Street lighting");
        assert_eq!(record.customer_company_name, "City of Kazan");
        assert_eq!(record.notice_number, "0123-77");
        let snapshot = analyzer.metrics_snapshot();
        assert_eq!(snapshot.units_extracted, 2);
        assert_eq!(snapshot.merge_calls, 0);
    }
}
