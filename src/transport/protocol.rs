//! Wire Protocol for the backend execution service
//!
//! Every frame is a JSON text message:
//! ```text
//! { "event": "<name>", "payload": { ...camelCase fields... } }
//! ```
//!
//! Client → backend:
//! - `ssh-connect`    open a remote shell for a session
//! - `ssh-input`      raw keystrokes / typed commands
//! - `ssh-resize`     terminal size change
//! - `ssh-disconnect` close a session
//! - `ssh-exec`       correlated one-shot command (carries `id`)
//!
//! Backend → client:
//! - `ssh-data`        shell output
//! - `ssh-error`       session-level failure
//! - `ssh-status`      session status change
//! - `ssh-exec-result` response to `ssh-exec` with the same `id`

use serde::{Deserialize, Serialize};

use super::TransportError;

/// Reserved session id for system/global messages
pub const SYSTEM_SESSION_ID: &str = "__system__";

/// Authentication material forwarded to the backend as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    pub session_id: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// Frame sent from the client to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientFrame {
    #[serde(rename = "ssh-connect")]
    Connect(ConnectPayload),

    #[serde(rename = "ssh-input", rename_all = "camelCase")]
    Input { session_id: String, data: String },

    #[serde(rename = "ssh-resize", rename_all = "camelCase")]
    Resize {
        session_id: String,
        cols: u32,
        rows: u32,
    },

    #[serde(rename = "ssh-disconnect", rename_all = "camelCase")]
    Disconnect { session_id: String },

    #[serde(rename = "ssh-exec", rename_all = "camelCase")]
    Exec {
        id: u64,
        session_id: String,
        command: String,
    },
}

impl ClientFrame {
    /// Session this frame addresses
    pub fn session_id(&self) -> &str {
        match self {
            ClientFrame::Connect(payload) => &payload.session_id,
            ClientFrame::Input { session_id, .. }
            | ClientFrame::Resize { session_id, .. }
            | ClientFrame::Disconnect { session_id }
            | ClientFrame::Exec { session_id, .. } => session_id,
        }
    }

    /// Encode as a JSON text frame
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Serialize(e.to_string()))
    }

    /// Decode a client frame (used by in-process backends)
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Deserialize(e.to_string()))
    }
}

/// Outcome reported by the backend for an exec request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Ok,
    Error,
}

/// Backend acknowledgement of an `ssh-exec` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecReply {
    pub status: ExecStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecReply {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            status: ExecStatus::Ok,
            output: Some(output.into()),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExecStatus::Error,
            output: None,
            message: Some(message.into()),
        }
    }
}

/// Frame received from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerFrame {
    #[serde(rename = "ssh-data", rename_all = "camelCase")]
    Data { session_id: String, data: String },

    #[serde(rename = "ssh-error", rename_all = "camelCase")]
    Error { session_id: String, message: String },

    #[serde(rename = "ssh-status", rename_all = "camelCase")]
    Status {
        session_id: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ssh-exec-result")]
    ExecResult {
        id: u64,
        #[serde(flatten)]
        reply: ExecReply,
    },
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Serialize(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Deserialize(e.to_string()))
    }
}
