//! Session Status
//!
//! Lifecycle of one logical remote shell:
//!
//! ```text
//! ┌──────────────┐     connect()     ┌──────────────┐
//! │ Disconnected │ ─────────────────► │  Connecting  │
//! └──────────────┘                    └──────┬───────┘
//!        ▲                                   │
//!        │                       ssh-status / ssh-error
//!        │                                   │
//!        │ link lost        ┌────────────────┴────────────────┐
//!        │                  ▼                                  ▼
//!        │          ┌──────────────┐                  ┌──────────────┐
//!        └──────────│  Connected   │                  │    Error     │
//!                   └──────────────┘                  └──────────────┘
//! ```
//!
//! The backend owns the real shell, so transitions are driven by inbound
//! frames rather than enforced locally. [`SessionState`] only validates the
//! status strings and records when the status last changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session status as reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Connected or on the way there
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown session status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnected" | "closed" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" | "ready" => Ok(Self::Connected),
            "error" | "failed" => Ok(Self::Error),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Current status of a session plus its last error
#[derive(Debug, Clone)]
pub struct SessionState {
    status: SessionStatus,
    error_message: Option<String>,
    changed_at: DateTime<Utc>,
    transition_count: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            error_message: None,
            changed_at: Utc::now(),
            transition_count: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Last error message, kept only while in `Error`
    pub fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }

    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }

    /// Apply a status. Returns `false` when nothing changed.
    pub fn set(&mut self, status: SessionStatus, message: Option<&str>) -> bool {
        let error_message = if status == SessionStatus::Error {
            message.map(str::to_string)
        } else {
            None
        };

        if status == self.status && error_message == self.error_message {
            return false;
        }

        tracing::debug!(
            "Session status transition: {} -> {} (count: {})",
            self.status,
            status,
            self.transition_count + 1
        );
        self.status = status;
        self.error_message = error_message;
        self.changed_at = Utc::now();
        self.transition_count += 1;
        true
    }
}
