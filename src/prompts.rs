//! Prompt builders for extraction, merging, and narration.
//!
//! Every builder embeds the caller-supplied material after a `'Content':` marker
//! so instructions and document text stay separable in provider logs.

/// Build the per-unit extraction prompt.
pub(crate) fn build_extraction_prompt(unit: &str) -> String {
    format!(
        "System: You extract procurement tender facts into the provided JSON schema. \
         Fill each field from the text only; use an empty string for anything the text \
         does not state. Keep extracted values in the language of the document. \
         Answer with JSON only.\n\n'Content': {unit}"
    )
}

/// Build the extraction prompt for a document attached to the request.
pub(crate) fn build_document_extraction_prompt() -> String {
    "System: You extract procurement tender facts into the provided JSON schema. \
     Read the attached document and fill each field from it only; use an empty \
     string for anything the document does not state. Keep extracted values in \
     the language of the document. Answer with JSON only."
        .to_string()
}

/// Build the batch merge prompt over partial records from one document.
pub(crate) fn build_merge_prompt(records_json: &str) -> String {
    format!(
        "System: You merge partial JSON records describing the same procurement tender \
         into one record matching the provided schema. Prefer concrete values over empty \
         strings, keep every distinct lot and contact person, and never invent facts \
         absent from the inputs. Answer with JSON only.\n\n'Content': {records_json}"
    )
}

/// Build the cross-document merge prompt over per-document records.
pub(crate) fn build_cross_document_prompt(records_json: &str) -> String {
    format!(
        "System: The following JSON records were extracted from different documents of \
         one procurement tender. Combine them into a single record matching the provided \
         schema. Resolve conflicts in favor of the most specific value and keep every \
         distinct lot and contact person. Answer with JSON only.\n\n'Content': {records_json}"
    )
}

/// Build the record-to-prose summary prompt.
pub(crate) fn build_summary_prompt(record_json: &str) -> String {
    format!(
        "System: You describe procurement tenders for a business audience. Write a short \
         factual prose summary of the tender described by the JSON below. Mention only \
         fields that carry values and do not use markdown.\n\n'Content': {record_json}"
    )
}

/// Build the prose-to-channel-message prompt.
pub(crate) fn build_channel_prompt(summary: &str) -> String {
    format!(
        "System: Rewrite the tender summary below as a compact announcement for a team \
         messaging channel. Keep every fact, lead with the procurement name, and stay \
         under 200 words.\n\n'Content': {summary}"
    )
}
