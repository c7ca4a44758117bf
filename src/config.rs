use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while assembling configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// A variable held a value that does not parse.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the tenderbrief pipeline.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Analyzer backend servicing incoming document batches.
    pub analyzer_backend: AnalyzerBackend,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Chat model identifier used by the local backend.
    pub ollama_model: Option<String>,
    /// Base URL of the document conversion service.
    pub docling_url: String,
    /// API key for the Mistral platform. Both backends need it: the
    /// local backend routes PDFs through Mistral OCR.
    pub mistral_api_key: String,
    /// Chat model identifier used by the cloud backend.
    pub mistral_model: Option<String>,
    /// OCR model identifier.
    pub mistral_ocr_model: String,
    /// Base URL of the Mistral API.
    pub mistral_base_url: String,
    /// Token budget for one extraction unit.
    pub chunk_capacity: usize,
    /// Token overlap between adjacent units.
    pub chunk_overlap: usize,
    /// Per-request timeout for provider calls, in seconds.
    pub llm_timeout_secs: u64,
}

/// Analyzer backends able to service a document batch.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerBackend {
    /// Local pipeline: conversion service + chunking + Ollama extraction.
    Local,
    /// Cloud pipeline: Mistral document chat over uploaded files.
    Mistral,
}

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_DOCLING_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_CHUNK_CAPACITY: usize = 750;
const DEFAULT_CHUNK_OVERLAP: usize = 0;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

impl Config {
    /// Read and validate every variable.
    ///
    /// The model variable for the selected backend is required; the other backend's model
    /// may stay unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let analyzer_backend: AnalyzerBackend = load_env("ANALYZER_BACKEND")?
            .parse()
            .map_err(|()| ConfigError::InvalidValue("ANALYZER_BACKEND".to_string()))?;
        let ollama_model = load_env_optional("OLLAMA_MODEL");
        let mistral_model = load_env_optional("MISTRAL_MODEL");
        match analyzer_backend {
            AnalyzerBackend::Local if ollama_model.is_none() => {
                return Err(ConfigError::MissingVariable("OLLAMA_MODEL".to_string()));
            }
            AnalyzerBackend::Mistral if mistral_model.is_none() => {
                return Err(ConfigError::MissingVariable("MISTRAL_MODEL".to_string()));
            }
            _ => {}
        }

        let chunk_capacity: usize = parse_env_or("CHUNK_CAPACITY", DEFAULT_CHUNK_CAPACITY)?;
        if chunk_capacity == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_CAPACITY".to_string()));
        }

        Ok(Self {
            analyzer_backend,
            ollama_url: load_env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            ollama_model,
            docling_url: load_env_or("DOCLING_URL", DEFAULT_DOCLING_URL),
            mistral_api_key: load_env("MISTRAL_API_KEY")?,
            mistral_model,
            mistral_ocr_model: load_env_or("MISTRAL_OCR_MODEL", DEFAULT_MISTRAL_OCR_MODEL),
            mistral_base_url: load_env_or("MISTRAL_BASE_URL", DEFAULT_MISTRAL_BASE_URL),
            chunk_capacity,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            llm_timeout_secs: parse_env_or("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for AnalyzerBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "mistral" => Ok(Self::Mistral),
            _ => Err(()),
        }
    }
}

/// Process-wide configuration cell, set once at startup.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the installed configuration. Panics when [`init_config`] has not run.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load the environment configuration (honoring a `.env` file) and install it.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        backend = ?config.analyzer_backend,
        ollama_url = %config.ollama_url,
        docling_url = %config.docling_url,
        chunk_capacity = config.chunk_capacity,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
