//! Bounded conversation history for one run
//!
//! Index 0 is the system prompt and survives every compaction. Everything
//! after it is trimmed oldest-first so the history never holds more than
//! `2 * max_memory_messages + 1` messages.

use crate::llm::ChatMessage;

/// Limit for a single command's output in the history
pub const MAX_OUTPUT_CHARS: usize = 6000;

/// Limit for each message carried in from a previous conversation
pub const MAX_CONTEXT_CHARS: usize = 4000;

pub const TRUNCATION_MARKER: &str = "\n...[output truncated]";

/// First `limit` characters of `text`, or `None` if it already fits.
fn clip(text: &str, limit: usize) -> Option<&str> {
    text.char_indices().nth(limit).map(|(idx, _)| &text[..idx])
}

/// Truncate command output to [`MAX_OUTPUT_CHARS`], appending
/// [`TRUNCATION_MARKER`] once. Shorter output is returned unchanged.
pub fn truncate_output(output: &str) -> String {
    match clip(output, MAX_OUTPUT_CHARS) {
        Some(head) => format!("{}{}", head, TRUNCATION_MARKER),
        None => output.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AgentHistory {
    messages: Vec<ChatMessage>,
    max_memory_messages: usize,
}

impl AgentHistory {
    pub fn new(system_prompt: impl Into<String>, max_memory_messages: usize) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            max_memory_messages: max_memory_messages.max(1),
        }
    }

    /// Insert prior conversation messages, each clipped to
    /// [`MAX_CONTEXT_CHARS`].
    pub fn extend_context(&mut self, prior: &[ChatMessage]) {
        for message in prior {
            let content = clip(&message.content, MAX_CONTEXT_CHARS)
                .unwrap_or(&message.content)
                .to_string();
            self.messages.push(ChatMessage {
                role: message.role,
                content,
            });
        }
        self.compact();
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.compact();
    }

    fn compact(&mut self) {
        let keep = 2 * self.max_memory_messages;
        if self.messages.len() > keep + 1 {
            let drop_to = self.messages.len() - keep;
            self.messages.drain(1..drop_to);
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Upper bound on [`len`](Self::len)
    pub fn capacity(&self) -> usize {
        2 * self.max_memory_messages + 1
    }
}
