//! OpenAI-compatible chat completions client

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{future, stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::sse::{SseDecoder, SseEvent};
use super::{CompletionRequest, LanguageModel, LlmError, ResponseFormat, TextStream};
use crate::config::LlmConfig;

/// Longest error body kept in [`LlmError::Status`]
const ERROR_BODY_PREVIEW: usize = 500;

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        info!("[llm] using {} at {}", config.model, config.base_url);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": request.messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: preview(&text),
            });
        }
        Ok(response)
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = self.body(&request, false);
        debug!("[llm] completion request ({} messages)", request.messages.len());

        let response = self.send(&body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let completion: ChatCompletion =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError> {
        let body = self.body(&request, true);
        debug!("[llm] streaming request ({} messages)", request.messages.len());

        let response = self.send(&body).await?;
        Ok(text_stream(response.bytes_stream()))
    }
}

/// Decode a raw SSE byte stream into content deltas. Ends at `[DONE]`; a
/// final line without a line break is still decoded.
fn text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = Some((Box::pin(bytes), SseDecoder::default()));
    let events = stream::unfold(state, |state| async move {
        let (mut bytes, mut decoder) = state?;
        match bytes.next().await {
            Some(Ok(chunk)) => {
                let events = decoder.feed(chunk.as_ref());
                Some((events, Some((bytes, decoder))))
            }
            Some(Err(e)) => Some((vec![SseEvent::Error(e.to_string())], Some((bytes, decoder)))),
            None => Some((decoder.finish().into_iter().collect(), None)),
        }
    })
    .flat_map(stream::iter);

    events
        .take_while(|event| future::ready(*event != SseEvent::Done))
        .filter_map(|event| {
            future::ready(match event {
                SseEvent::Text(text) => Some(Ok(text)),
                SseEvent::Error(message) => Some(Err(LlmError::Stream(message))),
                SseEvent::Done => None,
            })
        })
        .boxed()
}
