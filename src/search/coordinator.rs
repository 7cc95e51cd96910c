//! Cross-session search
//!
//! The focused session is searched first. A non-incremental miss then walks
//! the other open sessions in the requested direction, starting next to the
//! focused one and wrapping once. Each candidate is searched from its top
//! (forward) or bottom (backward). The first hit takes focus, and input
//! focus is handed to its surface after a short delay.
//!
//! Incremental searches (live typing) never leave the focused session.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::surface::{FindOptions, SearchDirection, SessionWorkspace, TerminalSurface};

/// Delay before the matched surface receives input focus
pub const FOCUS_HANDOFF_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Matched { session_id: String, switched: bool },
    NoMatch,
}

impl SearchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

pub struct SearchCoordinator {
    workspace: Arc<dyn SessionWorkspace>,
    options: FindOptions,
    handoff_delay: Duration,
}

impl SearchCoordinator {
    pub fn new(workspace: Arc<dyn SessionWorkspace>) -> Self {
        Self {
            workspace,
            options: FindOptions::default(),
            handoff_delay: FOCUS_HANDOFF_DELAY,
        }
    }

    /// Matching flags applied to every search (`incremental` is per call)
    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn search(&self, text: &str, direction: SearchDirection, incremental: bool) -> SearchOutcome {
        let sessions = self.workspace.open_sessions();
        if text.is_empty() || sessions.is_empty() {
            return SearchOutcome::NoMatch;
        }

        let start = self
            .workspace
            .focused_session()
            .and_then(|id| sessions.iter().position(|s| *s == id))
            .unwrap_or(0);
        let current = &sessions[start];

        let mut options = self.options;
        options.incremental = incremental;
        if let Some(surface) = self.workspace.surface(current) {
            if surface.search(text, direction, &options) {
                return SearchOutcome::Matched {
                    session_id: current.clone(),
                    switched: false,
                };
            }
        }

        if incremental {
            return SearchOutcome::NoMatch;
        }

        let count = sessions.len();
        for step in 1..count {
            let index = match direction {
                SearchDirection::Forward => (start + step) % count,
                SearchDirection::Backward => (start + count - step) % count,
            };
            let candidate = &sessions[index];
            let Some(surface) = self.workspace.surface(candidate) else {
                continue;
            };

            // A cursor left over from an earlier search would skip matches
            surface.reset();
            if surface.search(text, direction, &options) {
                debug!("[search] '{}' found in {}, switching from {}", text, candidate, current);
                self.workspace.focus_session(candidate);
                self.hand_off_focus(surface);
                return SearchOutcome::Matched {
                    session_id: candidate.clone(),
                    switched: true,
                };
            }
        }

        SearchOutcome::NoMatch
    }

    fn hand_off_focus(&self, surface: Arc<dyn TerminalSurface>) {
        let delay = self.handoff_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    surface.focus();
                });
            }
            Err(_) => surface.focus(),
        }
    }
}
