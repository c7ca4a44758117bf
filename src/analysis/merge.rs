//! Deterministic and model-assisted merging of partial records.
//!
//! Two merge primitives cover every pipeline: a fill-if-empty fold for OCR
//! pages, and batched model-mediated reduction for chunked documents. The
//! cross-document step reuses both, preferring the model and falling back to
//! the deterministic fold when the call fails.

use serde_json::Value;
use tracing::{debug, warn};

use super::types::ExtractError;
use crate::llm::ChatClient;
use crate::metrics::PipelineMetrics;
use crate::prompts::{build_cross_document_prompt, build_merge_prompt};
use crate::schema::{SCALAR_FIELDS, TenderRecord};

/// Records merged per model call during reduction.
pub(crate) const MERGE_BATCH_SIZE: usize = 5;

/// Copy values from `other` into the empty scalar fields of `base`.
///
/// A field already holding a value is never overwritten. List fields accumulate
/// entries from `other` that are non-empty and not already present.
pub(crate) fn fill_merge(base: &mut TenderRecord, other: TenderRecord) {
    for field in SCALAR_FIELDS.iter() {
        if (field.get)(base).is_empty() && !(field.get)(&other).is_empty() {
            (field.set)(base, (field.get)(&other).to_string());
        }
    }
    for lot in other.lots {
        if !lot.is_empty() && !base.lots.contains(&lot) {
            base.lots.push(lot);
        }
    }
    for person in other.contact_persons {
        if !person.is_empty() && !base.contact_persons.contains(&person) {
            base.contact_persons.push(person);
        }
    }
}

/// Fold a list of records into one with [`fill_merge`], left to right.
pub(crate) fn fold_records(records: Vec<TenderRecord>) -> TenderRecord {
    let mut iter = records.into_iter();
    let mut base = iter.next().unwrap_or_default();
    for record in iter {
        fill_merge(&mut base, record);
    }
    base
}

async fn merge_batch(
    chat: &dyn ChatClient,
    schema: &Value,
    batch: &[TenderRecord],
) -> Result<TenderRecord, ExtractError> {
    let records_json = serde_json::to_string(batch).unwrap_or_else(|_| "[]".to_string());
    let raw = chat
        .complete_structured(&build_merge_prompt(&records_json), schema)
        .await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Reduce per-unit records to a single record via batched merge calls.
///
/// Each round partitions the list into batches of [`MERGE_BATCH_SIZE`] and
/// issues one merge call per batch, single-record batches included. A batch
/// whose call fails is dropped whole; rounds repeat until one record remains.
/// Returns the default record when every batch of the final round failed.
pub(crate) async fn reduce_records(
    chat: &dyn ChatClient,
    schema: &Value,
    mut records: Vec<TenderRecord>,
    metrics: &PipelineMetrics,
) -> TenderRecord {
    while records.len() > 1 {
        let mut merged = Vec::with_capacity(records.len().div_ceil(MERGE_BATCH_SIZE));
        for batch in records.chunks(MERGE_BATCH_SIZE) {
            metrics.record_merge_call();
            match merge_batch(chat, schema, batch).await {
                Ok(record) => merged.push(record),
                Err(error) => {
                    warn!(
                        batch_len = batch.len(),
                        error = %error,
                        "Dropping batch after failed merge call"
                    );
                }
            }
        }
        debug!(
            before = records.len(),
            after = merged.len(),
            "Finished merge round"
        );
        records = merged;
    }
    records.pop().unwrap_or_default()
}

/// Merge one record per document into the global record.
///
/// A single record passes through untouched without any model call. With more
/// records, one merge call combines them; if it fails, the records are folded
/// deterministically instead so no extracted value is lost.
pub(crate) async fn merge_across_documents(
    chat: &dyn ChatClient,
    schema: &Value,
    mut records: Vec<TenderRecord>,
    metrics: &PipelineMetrics,
) -> TenderRecord {
    if records.len() <= 1 {
        return records.pop().unwrap_or_default();
    }

    let records_json = serde_json::to_string(&records).unwrap_or_else(|_| "[]".to_string());
    metrics.record_merge_call();
    let call = async {
        let raw = chat
            .complete_structured(&build_cross_document_prompt(&records_json), schema)
            .await?;
        Ok::<TenderRecord, ExtractError>(serde_json::from_str(&raw)?)
    };
    match call.await {
        Ok(record) => record,
        Err(error) => {
            warn!(
                record_count = records.len(),
                error = %error,
                "Cross-document merge call failed; folding records deterministically"
            );
            fold_records(records)
        }
    }
}
