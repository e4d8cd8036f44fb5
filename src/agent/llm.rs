//! LLM client for the Gemini `generateContent` API

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::agent::scenario::AUDIO_INSTRUCTION;
use crate::types::{Payload, Role, Turn};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Why a single model call failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited or quota exceeded: {0}")]
    RateLimited(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Classify a non-success HTTP status
pub fn classify_status(status: StatusCode, body: String) -> ModelError {
    match status.as_u16() {
        429 => ModelError::RateLimited(body),
        404 => ModelError::ModelNotFound(body),
        401 | 403 => ModelError::Unauthorized(body),
        code => ModelError::Api { status: code, body },
    }
}

/// One history entry as the model sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

/// Everything a model call needs apart from the model name
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub history: Vec<HistoryEntry>,
    pub payload: Payload,
}

impl ModelRequest {
    pub fn new(system_instruction: impl Into<String>, payload: Payload) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
            payload,
        }
    }

    /// Attach prior turns, in conversation order. Failure turns are not
    /// model output and are left out.
    pub fn with_history<'a>(mut self, turns: impl IntoIterator<Item = &'a Turn>) -> Self {
        self.history = turns
            .into_iter()
            .filter(|t| !t.failed && !t.content.trim().is_empty())
            .map(|t| HistoryEntry {
                role: t.role,
                text: t.content.clone(),
            })
            .collect();
        self
    }
}

/// A remote chat model that answers one request with raw text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, model: &str, request: &ModelRequest) -> Result<String, ModelError>;
}

// ============ Wire format ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Parts of the first candidate, if any
    pub fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }
}

/// Build the `generateContent` body for a request
pub fn build_request_body(request: &ModelRequest) -> serde_json::Value {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|entry| Content {
            role: Some(entry.role.to_gemini_string().to_string()),
            parts: vec![Part::text(entry.text.clone())],
        })
        .collect();

    let parts = match &request.payload {
        Payload::Text(text) => vec![Part::text(text.clone())],
        Payload::Audio(clip) => vec![
            Part::text(AUDIO_INSTRUCTION),
            Part::inline(clip.mime_type.clone(), &clip.bytes),
        ],
    };
    contents.push(Content {
        role: Some("user".to_string()),
        parts,
    });

    let body = GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::text(request.system_instruction.clone())],
        },
        contents,
        generation_config: serde_json::json!({
            "responseMimeType": "application/json"
        }),
    };

    serde_json::to_value(body).unwrap_or_default()
}

/// Join the text parts of a `generateContent` response body
pub fn extract_reply_text(body: &str) -> Result<String, ModelError> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        ModelError::MalformedResponse(format!(
            "{} (body: {})",
            e,
            crate::truncate_safe(body, 300)
        ))
    })?;

    let text: String = response
        .first_parts()
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err(ModelError::MalformedResponse("no text in first candidate".to_string()));
    }
    Ok(text)
}

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client against the public endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL, None)
    }

    /// Create a client with a custom base URL and optional request timeout
    pub fn with_base_url(api_key: impl Into<String>, base_url: &str, timeout: Option<Duration>) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            client: Arc::new(builder.build().unwrap_or_else(|_| Client::new())),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Create from config and a resolved key
    pub fn from_config(config: &crate::config::Config, api_key: &crate::security::ApiKey) -> Self {
        Self::with_base_url(
            api_key.expose(),
            &config.api.base_url,
            Some(Duration::from_secs(config.api.timeout_secs)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the `generateContent` method for a model
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// POST a body to a model and return the raw response text
    pub(crate) async fn post_generate(&self, model: &str, body: &serde_json::Value) -> Result<String, ModelError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, crate::truncate_safe(&text, 500).to_string()));
        }

        if std::env::var("DEBUG_LLM_RESPONSES").is_ok() {
            eprintln!("DEBUG LLM Response:\n{}", crate::truncate_safe(&text, 2000));
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, model: &str, request: &ModelRequest) -> Result<String, ModelError> {
        debug!("Requesting {} ({} history entries)", model, request.history.len());
        let body = build_request_body(request);
        let raw = self.post_generate(model, &body).await?;
        extract_reply_text(&raw)
    }
}
