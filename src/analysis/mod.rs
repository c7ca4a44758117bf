//! The analysis pipeline: routing, extraction, merging, and narration.
//!
//! Two backends implement the same contract. [`LocalAnalyzer`] converts
//! documents through Docling, extracts per chunk with Ollama, and reduces via
//! batched merge calls; [`MistralAnalyzer`] sends each whole document through
//! the Mistral platform. Both collect per-file failures instead of propagating
//! them, so `analyze` always hands back a result.

pub mod cloud;
pub(crate) mod extract;
pub mod local;
pub(crate) mod merge;
pub(crate) mod narrative;
pub(crate) mod splitting;
pub mod types;

pub use cloud::MistralAnalyzer;
pub use local::LocalAnalyzer;
pub use types::{AnalyzeResult, AnalyzerInitError, FileError};

use std::path::Path;

use async_trait::async_trait;

use crate::config::{AnalyzerBackend, get_config};
use crate::metrics::MetricsSnapshot;

/// Interface implemented by both analysis backends.
#[async_trait]
pub trait DocumentsAnalyzer: Send + Sync {
    /// Analyze a batch of documents describing one tender.
    ///
    /// Always returns a result; per-file failures land in
    /// [`AnalyzeResult::file_errors`] instead of propagating.
    async fn analyze(&self, file_paths: &[String]) -> AnalyzeResult;

    /// Snapshot of the pipeline counters accumulated so far.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Build the analyzer selected by the loaded configuration.
///
/// Construction probes the backend's provider and is the only place a
/// configuration problem may surface as an error; later `analyze` calls
/// absorb all failures into their result.
pub async fn analyzer_for_backend()
-> Result<Box<dyn DocumentsAnalyzer + Send + Sync>, AnalyzerInitError> {
    let config = get_config();
    match config.analyzer_backend {
        AnalyzerBackend::Local => Ok(Box::new(LocalAnalyzer::from_config(config).await?)),
        AnalyzerBackend::Mistral => Ok(Box::new(MistralAnalyzer::from_config(config)?)),
    }
}

pub(crate) fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
}
