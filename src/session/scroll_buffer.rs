//! Per-session scroll buffer
//!
//! Keeps the last `max_lines` lines of a session's output with ANSI escape
//! sequences removed. Output arrives in arbitrary chunks, so the unterminated
//! tail is carried until its line break shows up.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::search::{search_lines, SearchOptions, SearchResult};

/// One line of terminal output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub text: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl TerminalLine {
    pub fn new(text: String) -> Self {
        Self {
            text,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferStats {
    pub current_lines: usize,
    pub total_lines: u64,
    pub max_lines: usize,
    pub memory_usage_mb: f64,
}

#[derive(Debug, Default)]
struct BufferInner {
    lines: VecDeque<TerminalLine>,
    /// Text after the last line break
    partial: String,
    total_lines: u64,
}

#[derive(Debug)]
pub struct ScrollBuffer {
    inner: RwLock<BufferInner>,
    max_lines: usize,
}

impl ScrollBuffer {
    pub fn with_capacity(max_lines: usize) -> Self {
        Self {
            inner: RwLock::new(BufferInner::default()),
            max_lines: max_lines.max(1),
        }
    }

    /// Append a complete line
    pub fn append(&self, line: TerminalLine) {
        let mut inner = self.inner.write();
        self.push_line(&mut inner, line);
    }

    /// Feed raw shell output: strips ANSI sequences, splits on line breaks and
    /// carries the unterminated tail over to the next call.
    pub fn append_output(&self, data: &str) {
        let cleaned = strip_ansi_escapes::strip_str(data);
        let mut inner = self.inner.write();

        let mut pending = std::mem::take(&mut inner.partial);
        pending.push_str(&cleaned);

        let mut rest = pending.as_str();
        while let Some(pos) = rest.find('\n') {
            let line = rest[..pos].trim_end_matches('\r').replace('\r', "");
            self.push_line(&mut inner, TerminalLine::new(line));
            rest = &rest[pos + 1..];
        }
        inner.partial = rest.to_string();
    }

    fn push_line(&self, inner: &mut BufferInner, line: TerminalLine) {
        if inner.lines.len() >= self.max_lines {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line);
        inner.total_lines += 1;
    }

    /// Number of complete lines held
    pub fn len(&self) -> usize {
        self.inner.read().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.lines.is_empty() && inner.partial.is_empty()
    }

    /// The unterminated tail (usually the shell prompt)
    pub fn partial_line(&self) -> String {
        self.inner.read().partial.clone()
    }

    pub fn get_range(&self, start: usize, count: usize) -> Vec<TerminalLine> {
        self.inner
            .read()
            .lines
            .iter()
            .skip(start)
            .take(count)
            .cloned()
            .collect()
    }

    pub fn get_all(&self) -> Vec<TerminalLine> {
        self.inner.read().lines.iter().cloned().collect()
    }

    /// Complete lines plus the unterminated tail, if any. This is what
    /// searches run against.
    pub fn snapshot(&self) -> Vec<TerminalLine> {
        let inner = self.inner.read();
        let mut lines: Vec<TerminalLine> = inner.lines.iter().cloned().collect();
        if !inner.partial.is_empty() {
            lines.push(TerminalLine::new(inner.partial.clone()));
        }
        lines
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.lines.clear();
        inner.partial.clear();
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.read();
        let bytes: usize = inner
            .lines
            .iter()
            .map(|l| l.text.capacity() + std::mem::size_of::<TerminalLine>())
            .sum::<usize>()
            + inner.partial.capacity();

        BufferStats {
            current_lines: inner.lines.len(),
            total_lines: inner.total_lines,
            max_lines: self.max_lines,
            memory_usage_mb: bytes as f64 / (1024.0 * 1024.0),
        }
    }

    pub fn search(&self, options: &SearchOptions) -> SearchResult {
        search_lines(&self.snapshot(), options)
    }
}
