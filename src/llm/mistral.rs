//! Client for the Mistral platform: document chat completions and OCR.
//!
//! The cloud extraction path uploads each document, runs one schema-constrained
//! completion against its signed URL, and deletes the upload afterwards whether
//! or not the completion succeeded. The OCR path renders scanned PDFs to
//! per-page Markdown with inline image annotations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::{ChatClient, ChatError};
use crate::schema::{QuestionSet, document_annotation_schema, image_annotation_schema};

// OCR requests cover at most the first eight pages of a document.
const OCR_PAGE_LIMIT: usize = 8;

/// Errors surfaced by the Mistral API client.
#[derive(Debug, Error)]
pub enum MistralError {
    /// API could not be reached.
    #[error("Mistral API unavailable: {0}")]
    ServiceUnavailable(String),
    /// Source file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        /// Path as supplied by the caller.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// API answered with a non-success status.
    #[error("Mistral returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: StatusCode,
        /// Raw response body, if any.
        body: String,
    },
    /// API response could not be parsed.
    #[error("Malformed Mistral response: {0}")]
    InvalidResponse(String),
    /// No chat model was configured for this client.
    #[error("Mistral chat model not configured")]
    ModelNotConfigured,
}

impl From<MistralError> for ChatError {
    fn from(error: MistralError) -> Self {
        match error {
            MistralError::ServiceUnavailable(message) => ChatError::ProviderUnavailable(message),
            MistralError::ModelNotConfigured => {
                ChatError::ProviderUnavailable(MistralError::ModelNotConfigured.to_string())
            }
            MistralError::UnexpectedStatus { status, body } => {
                ChatError::GenerationFailed(format!("Mistral returned {status}: {body}"))
            }
            MistralError::InvalidResponse(message) => ChatError::InvalidResponse(message),
            other @ MistralError::FileRead { .. } => ChatError::GenerationFailed(other.to_string()),
        }
    }
}

/// HTTP client for the Mistral platform API.
pub struct MistralClient {
    http: Client,
    base_url: String,
    api_key: String,
    chat_model: Option<String>,
    ocr_model: String,
}

/// One OCR page rendered to Markdown with image placeholders resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrPage {
    /// Zero-based page index.
    pub index: usize,
    /// Markdown with inline base64 images and their annotations.
    pub markdown: String,
}

/// OCR output for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResult {
    /// Pages in document order.
    pub pages: Vec<OcrPage>,
    /// Raw document-level annotation JSON, when the model produced one.
    pub document_annotation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    pages: Vec<OcrResponsePage>,
    #[serde(default)]
    document_annotation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrResponsePage {
    index: usize,
    markdown: String,
    #[serde(default)]
    images: Vec<OcrImage>,
}

#[derive(Debug, Deserialize)]
struct OcrImage {
    id: String,
    #[serde(default)]
    image_base64: Option<String>,
    #[serde(default)]
    image_annotation: Option<String>,
}

impl MistralClient {
    /// Build a client for the platform API.
    ///
    /// `chat_model` may be absent when the client is only used for OCR.
    pub fn new(
        base_url: String,
        api_key: String,
        chat_model: Option<String>,
        ocr_model: String,
        timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .user_agent("tenderbrief/mistral")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for Mistral");
        Self {
            http,
            base_url,
            api_key,
            chat_model,
            ocr_model,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        self.http.request(method, url).bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, MistralError> {
        let response = builder.send().await.map_err(|error| {
            MistralError::ServiceUnavailable(format!(
                "failed to reach Mistral at {}: {error}",
                self.base_url
            ))
        })?;
        ensure_success(response).await
    }

    fn chat_model(&self) -> Result<&str, MistralError> {
        self.chat_model
            .as_deref()
            .ok_or(MistralError::ModelNotConfigured)
    }

    /// Upload a document for OCR-purpose processing and return its file id.
    async fn upload_for_ocr(&self, path: &Path) -> Result<String, MistralError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| MistralError::FileRead {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        let form = Form::new()
            .text("purpose", "ocr")
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .send(self.request(Method::POST, "/v1/files").multipart(form))
            .await?;
        let uploaded: UploadedFile = decode(response).await?;
        debug!(file_id = %uploaded.id, "Uploaded document to Mistral");
        Ok(uploaded.id)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String, MistralError> {
        let response = self
            .send(self.request(Method::GET, &format!("/v1/files/{file_id}/url")))
            .await?;
        let signed: SignedUrl = decode(response).await?;
        Ok(signed.url)
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), MistralError> {
        self.send(self.request(Method::DELETE, &format!("/v1/files/{file_id}")))
            .await?;
        Ok(())
    }

    fn chat_payload(&self, model: &str, content: Value, schema: Option<&Value>) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": 0.0,
            "top_p": 0.9,
        });
        if let Some(schema) = schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name(schema),
                    "schema": schema,
                    "strict": true,
                }
            });
        }
        body
    }

    async fn chat(&self, payload: Value) -> Result<String, MistralError> {
        let response = self
            .send(
                self.request(Method::POST, "/v1/chat/completions")
                    .json(&payload),
            )
            .await?;
        let completion: ChatCompletion = decode(response).await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| {
                MistralError::InvalidResponse("Mistral response contained no choices".into())
            })
    }

    /// Run one schema-constrained completion over an uploaded document.
    ///
    /// The upload is deleted afterwards regardless of the completion outcome.
    pub async fn extract_from_document(
        &self,
        path: &Path,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, MistralError> {
        let model = self.chat_model()?.to_string();
        let file_id = self.upload_for_ocr(path).await?;
        let result = self
            .document_completion(&model, &file_id, prompt, schema)
            .await;
        if let Err(error) = self.delete_file(&file_id).await {
            warn!(file_id = %file_id, error = %error, "Failed to delete uploaded Mistral file");
        }
        result
    }

    async fn document_completion(
        &self,
        model: &str,
        file_id: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, MistralError> {
        let url = self.signed_url(file_id).await?;
        let content = json!([
            { "type": "text", "text": prompt },
            { "type": "document_url", "document_url": url },
        ]);
        self.chat(self.chat_payload(model, content, Some(schema)))
            .await
    }

    /// OCR a PDF into per-page Markdown with image and document annotations.
    ///
    /// `questions`, when given, replaces the default document annotation schema
    /// with a runtime question set.
    pub async fn ocr_document(
        &self,
        path: &Path,
        questions: Option<&QuestionSet>,
    ) -> Result<OcrResult, MistralError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| MistralError::FileRead {
                path: path.display().to_string(),
                source,
            })?;
        let document_url = format!("data:application/pdf;base64,{}", BASE64.encode(&bytes));
        let document_schema = match questions {
            Some(questions) if !questions.is_empty() => questions.schema(),
            _ => document_annotation_schema(),
        };
        let pages: Vec<usize> = (0..OCR_PAGE_LIMIT).collect();
        let payload = json!({
            "model": self.ocr_model,
            "pages": pages,
            "document": {
                "type": "document_url",
                "document_url": document_url,
            },
            "bbox_annotation_format": annotation_format(&image_annotation_schema()),
            "document_annotation_format": annotation_format(&document_schema),
            "include_image_base64": true,
        });

        let response = self
            .send(self.request(Method::POST, "/v1/ocr").json(&payload))
            .await?;
        let body: OcrResponse = decode(response).await?;

        let pages = body
            .pages
            .into_iter()
            .map(|page| OcrPage {
                index: page.index,
                markdown: resolve_image_placeholders(page.markdown, &page.images),
            })
            .collect();
        Ok(OcrResult {
            pages,
            document_annotation: body.document_annotation,
        })
    }
}

#[async_trait]
impl ChatClient for MistralClient {
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, ChatError> {
        let model = self.chat_model()?.to_string();
        let payload = self.chat_payload(&model, Value::String(prompt.to_string()), Some(schema));
        Ok(self.chat(payload).await?)
    }

    async fn complete_text(&self, prompt: &str) -> Result<String, ChatError> {
        let model = self.chat_model()?.to_string();
        let payload = self.chat_payload(&model, Value::String(prompt.to_string()), None);
        Ok(self.chat(payload).await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, MistralError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MistralError::UnexpectedStatus { status, body })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, MistralError> {
    response.json::<T>().await.map_err(|error| {
        MistralError::InvalidResponse(format!("failed to decode Mistral response: {error}"))
    })
}

fn schema_name(schema: &Value) -> &str {
    schema
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("response")
}

fn annotation_format(schema: &Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema_name(schema),
            "schema": schema,
            "strict": true,
        }
    })
}

/// Swap `![id](id)` placeholders for inline base64 images, appending the image
/// annotation in bold when one was produced.
fn resolve_image_placeholders(markdown: String, images: &[OcrImage]) -> String {
    let mut resolved = markdown;
    for image in images {
        let Some(base64_data) = image.image_base64.as_deref() else {
            continue;
        };
        let placeholder = format!("![{id}]({id})", id = image.id);
        let replacement = match image.image_annotation.as_deref() {
            Some(annotation) if !annotation.is_empty() => {
                format!(
                    "![{id}]({base64_data})\n\n**{annotation}**",
                    id = image.id
                )
            }
            _ => format!("![{id}]({base64_data})", id = image.id),
        };
        resolved = resolved.replace(&placeholder, &replacement);
    }
    resolved
}
