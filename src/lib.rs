#![deny(missing_docs)]

//! Core library for the tenderbrief procurement-document analyzer.
//!
//! Documents submitted together are converted to text, mined unit by unit for
//! the fields of a fixed tender schema, merged into one record, and turned into
//! a channel-ready summary. Two interchangeable backends implement the
//! pipeline: a local chunk-map-reduce flow over Ollama and a cloud flow over
//! the Mistral platform.

/// Backend orchestration: routing, extraction, merging, and narration.
pub mod analysis;
/// Environment-driven configuration management.
pub mod config;
/// Document-to-Markdown conversion client.
pub mod convert;
/// Chat-completion and OCR provider clients.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics counters.
pub mod metrics;
mod prompts;
/// The tender record schema and derived output contracts.
pub mod schema;
