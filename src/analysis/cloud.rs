//! Whole-document backend over the Mistral platform.
//!
//! Each file becomes a single schema-constrained completion against its
//! uploaded document, so there is no unit splitting or batched reduction here.
//! The final record is rendered with the fixed channel template rather than
//! narrated by the model.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::merge::merge_across_documents;
use super::narrative::render_channel_message;
use super::types::{AnalyzeResult, AnalyzerInitError, FileError};
use super::{DocumentsAnalyzer, extension_of};
use crate::config::{Config, ConfigError};
use crate::llm::MistralClient;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::prompts::build_document_extraction_prompt;
use crate::schema::{TenderRecord, record_schema};

/// Analyzer backed by Mistral document completions.
pub struct MistralAnalyzer {
    client: MistralClient,
    schema: Value,
    metrics: PipelineMetrics,
}

impl MistralAnalyzer {
    /// Build the analyzer from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AnalyzerInitError> {
        let model = config.mistral_model.clone().ok_or_else(|| {
            AnalyzerInitError::Config(ConfigError::MissingVariable("MISTRAL_MODEL".to_string()))
        })?;
        Ok(Self {
            client: MistralClient::new(
                config.mistral_base_url.clone(),
                config.mistral_api_key.clone(),
                Some(model),
                config.mistral_ocr_model.clone(),
                Duration::from_secs(config.llm_timeout_secs),
            ),
            schema: record_schema(),
            metrics: PipelineMetrics::default(),
        })
    }

    async fn analyze_file(&self, path: &str) -> Result<TenderRecord, FileError> {
        if !matches!(
            extension_of(path).as_deref(),
            Some("pdf" | "doc" | "docx" | "txt")
        ) {
            return Err(FileError::UnsupportedFileType {
                path: path.to_string(),
            });
        }

        info!(path, "Extracting record from uploaded document");
        let raw = self
            .client
            .extract_from_document(
                Path::new(path),
                &build_document_extraction_prompt(),
                &self.schema,
            )
            .await
            .map_err(|error| FileError::ExtractionFailure {
                path: path.to_string(),
                reason: error.to_string(),
            })?;
        let record = serde_json::from_str(&raw).map_err(|error| {
            self.metrics.record_unit(false);
            FileError::ExtractionFailure {
                path: path.to_string(),
                reason: format!("record validation failed: {error}"),
            }
        })?;
        self.metrics.record_unit(true);
        Ok(record)
    }
}

#[async_trait]
impl DocumentsAnalyzer for MistralAnalyzer {
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
            merge_across_documents(&self.client, &self.schema, records, &self.metrics).await;
        AnalyzeResult {
            summary: Some(render_channel_message(&record)),
            file_errors,
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
