//! Chat adapter for a local Ollama runtime.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ChatClient, ChatError};

/// Chat-completion client backed by Ollama's `/api/chat` endpoint.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaChatClient {
    /// Build a client targeting `base_url` with a fixed model and request timeout.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("tenderbrief/ollama")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for Ollama");
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Probe the runtime by listing installed models.
    pub async fn check_connection(&self) -> Result<(), ChatError> {
        let endpoint = self.endpoint("api/tags");
        let response = self.http.get(&endpoint).send().await.map_err(|error| {
            ChatError::ProviderUnavailable(format!(
                "failed to reach Ollama at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            return Err(ChatError::ProviderUnavailable(format!(
                "Ollama returned {} for {endpoint}",
                response.status()
            )));
        }
        Ok(())
    }

    fn payload(&self, prompt: &str, format: Option<&Value>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": {
                "temperature": 0.0,
                "top_p": 0.9,
            }
        });
        if let Some(schema) = format {
            body["format"] = schema.clone();
        }
        body
    }

    async fn chat(&self, payload: Value) -> Result<String, ChatError> {
        let response = self
            .http
            .post(self.endpoint("api/chat"))
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint("api/chat")
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            ChatError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ChatError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, ChatError> {
        self.chat(self.payload(prompt, Some(schema))).await
    }

    async fn complete_text(&self, prompt: &str) -> Result<String, ChatError> {
        self.chat(self.payload(prompt, None)).await
    }
}
