//! Terminal surfaces the coordinator searches through
//!
//! A [`TerminalSurface`] is whatever renders one session (an emulator widget
//! in a GUI host). [`BufferSurface`] is the headless implementation backed by
//! a session's scroll buffer; [`RegistryWorkspace`] exposes the registry's
//! sessions through [`SessionWorkspace`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::{find_matches, ScrollBuffer, SearchMatch, SearchOptions, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindOptions {
    /// Live typing: keep the current match if it still matches
    pub incremental: bool,
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub regex: bool,
}

pub trait TerminalSurface: Send + Sync {
    /// Move to the next match in `direction`; `false` when nothing matches.
    fn search(&self, text: &str, direction: SearchDirection, options: &FindOptions) -> bool;

    /// Give the surface input focus
    fn focus(&self);

    /// Forget the current match so the next search starts at the top
    /// (forward) or bottom (backward).
    fn reset(&self) {}
}

/// Open sessions and their surfaces, as seen by the coordinator
pub trait SessionWorkspace: Send + Sync {
    /// Open session ids in display order
    fn open_sessions(&self) -> Vec<String>;
    fn focused_session(&self) -> Option<String>;
    fn focus_session(&self, session_id: &str);
    fn surface(&self, session_id: &str) -> Option<Arc<dyn TerminalSurface>>;
}

/// Headless surface over a scroll buffer with a wrapping match cursor
pub struct BufferSurface {
    buffer: Arc<ScrollBuffer>,
    cursor: Mutex<Option<SearchMatch>>,
    focus_requests: AtomicU64,
}

impl BufferSurface {
    pub fn new(buffer: Arc<ScrollBuffer>) -> Self {
        Self {
            buffer,
            cursor: Mutex::new(None),
            focus_requests: AtomicU64::new(0),
        }
    }

    pub fn buffer(&self) -> &Arc<ScrollBuffer> {
        &self.buffer
    }

    pub fn current_match(&self) -> Option<SearchMatch> {
        self.cursor.lock().clone()
    }

    pub fn focus_requests(&self) -> u64 {
        self.focus_requests.load(Ordering::Relaxed)
    }
}

impl TerminalSurface for BufferSurface {
    fn search(&self, text: &str, direction: SearchDirection, options: &FindOptions) -> bool {
        let mut cursor = self.cursor.lock();
        if text.is_empty() {
            *cursor = None;
            return false;
        }

        let query = SearchOptions {
            query: text.to_string(),
            case_sensitive: options.case_sensitive,
            regex: options.regex,
            whole_word: options.whole_word,
            max_matches: 0,
        };
        let regex = match query.compile() {
            Ok(regex) => regex,
            Err(e) => {
                debug!("[search] {}", e);
                *cursor = None;
                return false;
            }
        };

        let lines = self.buffer.snapshot();
        let matches: Vec<SearchMatch> = find_matches(&lines, &regex).collect();
        if matches.is_empty() {
            *cursor = None;
            return false;
        }

        let pos = |m: &SearchMatch| (m.line_number, m.column_start);
        let at = cursor.as_ref().map(pos);
        let next = match (at, direction) {
            (None, SearchDirection::Forward) => matches.first(),
            (None, SearchDirection::Backward) => matches.last(),
            (Some(at), SearchDirection::Forward) => matches
                .iter()
                .find(|m| if options.incremental { pos(m) >= at } else { pos(m) > at })
                .or_else(|| matches.first()),
            (Some(at), SearchDirection::Backward) => matches
                .iter()
                .rev()
                .find(|m| if options.incremental { pos(m) <= at } else { pos(m) < at })
                .or_else(|| matches.last()),
        };

        *cursor = next.cloned();
        true
    }

    fn focus(&self) {
        self.focus_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        *self.cursor.lock() = None;
    }
}

/// Registry sessions backed by [`BufferSurface`]s, created on demand
pub struct RegistryWorkspace {
    registry: Arc<SessionRegistry>,
    surfaces: DashMap<String, Arc<BufferSurface>>,
}

impl RegistryWorkspace {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            surfaces: DashMap::new(),
        }
    }

    pub fn buffer_surface(&self, session_id: &str) -> Option<Arc<BufferSurface>> {
        let buffer = self.registry.scroll_buffer(session_id)?;
        self.surfaces.retain(|id, _| self.registry.contains(id));

        if let Some(existing) = self.surfaces.get(session_id) {
            if Arc::ptr_eq(existing.buffer(), &buffer) {
                return Some(existing.clone());
            }
        }

        let surface = Arc::new(BufferSurface::new(buffer));
        self.surfaces.insert(session_id.to_string(), surface.clone());
        Some(surface)
    }
}

impl SessionWorkspace for RegistryWorkspace {
    fn open_sessions(&self) -> Vec<String> {
        self.registry.session_ids()
    }

    fn focused_session(&self) -> Option<String> {
        self.registry.focused()
    }

    fn focus_session(&self, session_id: &str) {
        self.registry.focus(session_id);
    }

    fn surface(&self, session_id: &str) -> Option<Arc<dyn TerminalSurface>> {
        self.buffer_surface(session_id)
            .map(|surface| surface as Arc<dyn TerminalSurface>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(text: &str) -> BufferSurface {
        let buffer = Arc::new(ScrollBuffer::with_capacity(100));
        buffer.append_output(text);
        BufferSurface::new(buffer)
    }

    fn at(surface: &BufferSurface) -> (usize, usize) {
        let m = surface.current_match().unwrap();
        (m.line_number, m.column_start)
    }

    #[test]
    fn test_forward_wraps_within_buffer() {
        let s = surface("error one\nok\nerror two\n");
        let opts = FindOptions::default();

        assert!(s.search("error", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (0, 0));
        assert!(s.search("error", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (2, 0));
        assert!(s.search("error", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (0, 0));
    }

    #[test]
    fn test_backward_starts_at_bottom() {
        let s = surface("error one\nok\nerror two\n");
        let opts = FindOptions::default();

        assert!(s.search("error", SearchDirection::Backward, &opts));
        assert_eq!(at(&s), (2, 0));
        assert!(s.search("error", SearchDirection::Backward, &opts));
        assert_eq!(at(&s), (0, 0));
    }

    #[test]
    fn test_incremental_keeps_current_match() {
        let s = surface("alpha\nalphabet\n");
        let opts = FindOptions {
            incremental: true,
            ..Default::default()
        };

        assert!(s.search("alp", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (0, 0));
        assert!(s.search("alph", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (0, 0));
        assert!(s.search("alphab", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (1, 0));
    }

    #[test]
    fn test_reset_restarts_from_the_edge() {
        let s = surface("error one\nok\nerror two\n");
        let opts = FindOptions::default();

        assert!(s.search("error", SearchDirection::Forward, &opts));
        s.reset();
        assert!(s.current_match().is_none());
        assert!(s.search("error", SearchDirection::Forward, &opts));
        assert_eq!(at(&s), (0, 0));

        s.reset();
        assert!(s.search("error", SearchDirection::Backward, &opts));
        assert_eq!(at(&s), (2, 0));
    }

    #[test]
    fn test_miss_clears_cursor() {
        let s = surface("hello\n");
        let opts = FindOptions::default();
        assert!(s.search("hello", SearchDirection::Forward, &opts));
        assert!(!s.search("absent", SearchDirection::Forward, &opts));
        assert!(s.current_match().is_none());
    }
}
