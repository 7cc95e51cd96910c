//! Incremental decoder for chat-completion SSE streams
//!
//! Bytes are buffered until a full line is available so multi-byte
//! characters split across network chunks decode correctly.

use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Text(String),
    /// `data: [DONE]`
    Done,
    /// Error object sent inside the stream
    Error(String),
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes and drain every complete event.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that arrived without a line break.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&line))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("[llm] skipping malformed stream chunk: {}", e);
            return None;
        }
    };

    if let Some(message) = value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
    {
        return Some(SseEvent::Error(message));
    }

    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| SseEvent::Text(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::default();
        let input = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        let events = decoder.feed(input.as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent::Text("Hel".to_string()),
                SseEvent::Text("lo".to_string()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let input = chunk("héllo");
        let bytes = input.as_bytes();
        // Split inside the multi-byte character
        let cut = input.find('é').unwrap() + 1;

        assert!(decoder.feed(&bytes[..cut]).is_empty());
        assert_eq!(
            decoder.feed(&bytes[cut..]),
            vec![SseEvent::Text("héllo".to_string())]
        );
    }

    #[test]
    fn test_ignores_comments_roles_and_garbage() {
        let mut decoder = SseDecoder::default();
        let input = ": keep-alive\n\
                     data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
                     data: not json\n\n";
        assert!(decoder.feed(input.as_bytes()).is_empty());
    }

    #[test]
    fn test_error_object() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b"data: {\"error\":{\"message\":\"rate limited\"}}\n");
        assert_eq!(events, vec![SseEvent::Error("rate limited".to_string())]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Done));
    }
}
