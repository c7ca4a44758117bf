//! Per-unit record extraction.

use serde_json::Value;
use tracing::{debug, warn};

use super::types::ExtractError;
use crate::llm::ChatClient;
use crate::metrics::PipelineMetrics;
use crate::prompts::build_extraction_prompt;
use crate::schema::TenderRecord;

/// Extract one record from one unit of document text.
pub(crate) async fn extract_record(
    chat: &dyn ChatClient,
    schema: &Value,
    unit: &str,
) -> Result<TenderRecord, ExtractError> {
    let raw = chat
        .complete_structured(&build_extraction_prompt(unit), schema)
        .await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Extract records from every unit in order, dropping units whose call fails.
///
/// Units are processed strictly one at a time; a failed unit contributes
/// nothing and the remaining units still run.
pub(crate) async fn extract_from_units(
    chat: &dyn ChatClient,
    schema: &Value,
    units: &[String],
    metrics: &PipelineMetrics,
) -> Vec<TenderRecord> {
    let mut records = Vec::with_capacity(units.len());
    for (index, unit) in units.iter().enumerate() {
        match extract_record(chat, schema, unit).await {
            Ok(record) => {
                metrics.record_unit(true);
                records.push(record);
            }
            Err(error) => {
                metrics.record_unit(false);
                warn!(unit_index = index, error = %error, "Dropping unit after failed extraction");
            }
        }
    }
    debug!(
        unit_count = units.len(),
        record_count = records.len(),
        "Finished per-unit extraction"
    );
    records
}
