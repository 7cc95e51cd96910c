//! Language-model backend
//!
//! The autopilot consumes a [`LanguageModel`]: one call for a complete
//! response and one for a stream of text fragments. [`OpenAiClient`] talks to
//! any OpenAI-compatible `/chat/completions` endpoint.

pub mod openai;
pub mod scripted;
pub mod sse;

pub use openai::OpenAiClient;
pub use scripted::ScriptedModel;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the backend for a single JSON object
    JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the client's configured model
    pub model: Option<String>,
    pub response_format: ResponseFormat,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            response_format: ResponseFormat::Text,
            temperature: None,
        }
    }

    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::JsonObject;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Stream failed: {0}")]
    Stream(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

/// Ordered text fragments; ends when the backend signals completion
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError>;
}
