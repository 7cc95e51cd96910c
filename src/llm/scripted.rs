//! Language model that replays canned responses
//!
//! Lets the autopilot run without a network backend: completions are served
//! from a queue, streams from a separate queue, and every request is kept
//! for inspection.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;

use super::{CompletionRequest, LanguageModel, LlmError, TextStream};

enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    streams: Mutex<VecDeque<Vec<Result<String, String>>>>,
    completions: Mutex<Vec<CompletionRequest>>,
    stream_requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Text(text.into()));
        self
    }

    /// Queue a failing completion
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Fail(message.into()));
        self
    }

    /// Queue a stream of fragments
    pub fn stream<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams
            .lock()
            .push_back(chunks.into_iter().map(|c| Ok(c.into())).collect());
        self
    }

    /// Queue a stream that yields `chunks` and then fails
    pub fn stream_then_fail<I, S>(self, chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<Result<String, String>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        items.push(Err(message.into()));
        self.streams.lock().push_back(items);
        self
    }

    /// Requests seen by `complete`, in order
    pub fn completions(&self) -> Vec<CompletionRequest> {
        self.completions.lock().clone()
    }

    /// Requests seen by `complete_stream`, in order
    pub fn stream_requests(&self) -> Vec<CompletionRequest> {
        self.stream_requests.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.completions.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(LlmError::Request(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError> {
        self.stream_requests.lock().push(request);
        let items = self
            .streams
            .lock()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(stream::iter(items.into_iter().map(|item| item.map_err(LlmError::Stream))).boxed())
    }
}
