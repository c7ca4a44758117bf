//! Result and error types shared across the analysis pipeline.
//!
//! Failures are scoped deliberately: a [`FileError`] removes one input file from
//! the run, an [`ExtractError`] drops one unit or merge batch, and a
//! [`ChatError`] during narration only degrades the summary. Nothing here
//! aborts a run once an analyzer has been constructed.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::ChatError;

/// Outcome of one analysis run over a set of input files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyzeResult {
    /// Channel-ready narrative, absent when no file yielded a record.
    pub summary: Option<String>,
    /// Paths of the input files that dropped out of the run, as supplied by the caller.
    pub file_errors: Vec<String>,
}

/// Reasons a single input file drops out of a run.
#[derive(Debug, Error)]
pub enum FileError {
    /// Extension is not handled by the active backend.
    #[error("Unsupported file type: {path}")]
    UnsupportedFileType {
        /// Path as supplied by the caller.
        path: String,
    },
    /// Document could not be converted to analyzable text.
    #[error("Conversion failed for {path}: {reason}")]
    ConversionFailure {
        /// Path as supplied by the caller.
        path: String,
        /// Converter or OCR error description.
        reason: String,
    },
    /// No record could be extracted from the converted document.
    #[error("Extraction failed for {path}: {reason}")]
    ExtractionFailure {
        /// Path as supplied by the caller.
        path: String,
        /// Extraction error description.
        reason: String,
    },
}

impl FileError {
    /// Path of the affected file, as supplied by the caller.
    pub fn path(&self) -> &str {
        match self {
            FileError::UnsupportedFileType { path }
            | FileError::ConversionFailure { path, .. }
            | FileError::ExtractionFailure { path, .. } => path,
        }
    }
}

/// Errors from one schema-constrained extraction or merge call.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Provider call failed.
    #[error(transparent)]
    Chat(#[from] ChatError),
    /// Provider output did not match the record schema.
    #[error("Record validation failed: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

/// Errors that abort analyzer construction.
#[derive(Debug, Error)]
pub enum AnalyzerInitError {
    /// Environment configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A required backing service failed its connectivity probe.
    #[error("Backend connectivity check failed: {0}")]
    ConnectivityCheck(String),
}
