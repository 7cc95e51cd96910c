//! Scroll buffer search
//!
//! Literal or regex matching over terminal lines:
//! - Case-sensitive/insensitive matching
//! - Whole word matching (literal queries)
//! - Match cap with an exact total count
//!
//! An invalid pattern is reported in [`SearchResult::error`], never panics.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::scroll_buffer::TerminalLine;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchOptions {
    pub query: String,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Treat `query` as a regular expression
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub whole_word: bool,
    /// 0 = unlimited
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
}

fn default_max_matches() -> usize {
    1000
}

impl SearchOptions {
    /// Case-insensitive literal search with the default cap
    pub fn literal(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            case_sensitive: false,
            regex: false,
            whole_word: false,
            max_matches: default_max_matches(),
        }
    }

    /// Build the matcher for these options
    pub fn compile(&self) -> Result<Regex, String> {
        let pattern = if self.regex {
            self.query.clone()
        } else {
            let escaped = regex::escape(&self.query);
            if self.whole_word {
                format!(r"\b{}\b", escaped)
            } else {
                escaped
            }
        };

        RegexBuilder::new(&pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| format!("Invalid regex: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// 0-indexed line in the searched slice
    pub line_number: usize,
    /// Byte offsets within the line
    pub column_start: usize,
    pub column_end: usize,
    pub matched_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
    pub duration_ms: u64,
    /// More matches exist than were returned
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every match of `regex` in `lines`, in buffer order
pub fn find_matches<'a>(
    lines: &'a [TerminalLine],
    regex: &Regex,
) -> impl Iterator<Item = SearchMatch> + 'a {
    let regex = regex.clone();
    lines.iter().enumerate().flat_map(move |(line_number, line)| {
        regex
            .find_iter(&line.text)
            .filter(|m| !m.as_str().is_empty())
            .map(|m| SearchMatch {
                line_number,
                column_start: m.start(),
                column_end: m.end(),
                matched_text: m.as_str().to_string(),
            })
            .collect::<Vec<_>>()
    })
}

pub fn search_lines(lines: &[TerminalLine], options: &SearchOptions) -> SearchResult {
    let start = Instant::now();

    let regex = match options.compile() {
        Ok(re) => re,
        Err(e) => {
            return SearchResult {
                matches: vec![],
                total_matches: 0,
                duration_ms: start.elapsed().as_millis() as u64,
                truncated: false,
                error: Some(e),
            };
        }
    };

    let limit = if options.max_matches == 0 {
        usize::MAX
    } else {
        options.max_matches
    };

    let mut matches = Vec::new();
    let mut total_matches = 0usize;
    for found in find_matches(lines, &regex) {
        total_matches += 1;
        if matches.len() < limit {
            matches.push(found);
        }
    }

    SearchResult {
        truncated: total_matches > matches.len(),
        total_matches,
        matches,
        duration_ms: start.elapsed().as_millis() as u64,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<TerminalLine> {
        texts.iter().map(|t| TerminalLine::new(t.to_string())).collect()
    }

    fn options(query: &str) -> SearchOptions {
        SearchOptions {
            query: query.to_string(),
            case_sensitive: true,
            regex: false,
            whole_word: false,
            max_matches: 0,
        }
    }

    #[test]
    fn test_literal_search() {
        let buf = lines(&["Hello world", "Hello Rust", "Goodbye world"]);
        let result = search_lines(&buf, &options("Hello"));
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.matches[0].line_number, 0);
        assert_eq!(result.matches[1].line_number, 1);
    }

    #[test]
    fn test_case_insensitive_default() {
        let buf = lines(&["Hello World", "hello world", "HELLO WORLD"]);
        let result = search_lines(&buf, &SearchOptions::literal("hello"));
        assert_eq!(result.total_matches, 3);
    }

    #[test]
    fn test_whole_word() {
        let buf = lines(&["hello world", "helloworld", "say hello please"]);
        let mut opts = options("hello");
        opts.whole_word = true;

        let result = search_lines(&buf, &opts);
        let found: Vec<usize> = result.matches.iter().map(|m| m.line_number).collect();
        assert_eq!(found, vec![0, 2]);
    }

    #[test]
    fn test_regex_search() {
        let buf = lines(&[
            "Error: file not found",
            "Warning: deprecated API",
            "Error: connection timeout",
        ]);
        let mut opts = options(r"^Error:");
        opts.regex = true;

        let result = search_lines(&buf, &opts);
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.matches[1].line_number, 2);
    }

    #[test]
    fn test_cap_keeps_exact_total() {
        let buf = lines(&["test test test", "test"]);
        let mut opts = options("test");
        opts.max_matches = 2;

        let result = search_lines(&buf, &opts);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.total_matches, 4);
        assert!(result.truncated);
    }

    #[test]
    fn test_invalid_regex_reports_error() {
        let buf = lines(&["test"]);
        let mut opts = options("[invalid(");
        opts.regex = true;

        let result = search_lines(&buf, &opts);
        assert_eq!(result.total_matches, 0);
        assert!(result.error.unwrap().contains("Invalid regex"));
    }

    #[test]
    fn test_special_characters_are_literal() {
        let buf = lines(&["file.txt", "fileXtxt"]);
        let result = search_lines(&buf, &options("file.txt"));
        assert_eq!(result.total_matches, 1);
        assert_eq!(result.matches[0].column_end, 8);
    }
}
