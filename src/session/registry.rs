//! Session Registry
//!
//! Maps session ids to logical shells multiplexed over the one transport
//! link, and fans inbound traffic out to three typed listener sets:
//!
//! - data: raw output, verbatim
//! - log: [`LogEntry`] values derived from the same output (one per line)
//! - status: session status changes
//!
//! Dispatch is ordered. A single dispatcher task drains the transport's event
//! channel, and every listener for one event runs before the next event is
//! taken. Registry locks are never held while listeners run.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{DataEvent, StatusEvent};
use super::listeners::{ListenerSet, Subscription};
use super::log::{LogEntry, LogType};
use super::scroll_buffer::ScrollBuffer;
use super::state::{SessionState, SessionStatus};
use crate::config::BufferConfig;
use crate::transport::{
    ClientFrame, ConnectPayload, ServerFrame, TransportEvent, TransportManager, SYSTEM_SESSION_ID,
};

fn default_ssh_port() -> u16 {
    22
}

/// Credentials, forwarded verbatim to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    Password { password: String },
    PrivateKey { key: String },
}

/// Parameters for opening one remote shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session_id: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
}

impl SessionConfig {
    pub fn with_password(
        session_id: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            host: host.into(),
            port: default_ssh_port(),
            username: username.into(),
            auth: AuthMethod::Password {
                password: password.into(),
            },
        }
    }

    fn to_payload(&self) -> ConnectPayload {
        let (password, private_key) = match &self.auth {
            AuthMethod::Password { password } => (Some(password.clone()), None),
            AuthMethod::PrivateKey { key } => (None, Some(key.clone())),
        };
        ConnectPayload {
            session_id: self.session_id.clone(),
            ip: self.host.clone(),
            port: (self.port != default_ssh_port()).then_some(self.port),
            username: self.username.clone(),
            password,
            private_key,
        }
    }
}

/// Registry-owned state of one session
pub struct SessionEntry {
    pub config: SessionConfig,
    pub state: SessionState,
    pub logs: VecDeque<LogEntry>,
    pub scroll_buffer: Arc<ScrollBuffer>,
    pub created_at: DateTime<Utc>,
}

pub struct SessionRegistry {
    transport: Arc<TransportManager>,
    sessions: DashMap<String, SessionEntry>,
    /// Insertion order of session ids
    order: RwLock<Vec<String>>,
    focused: RwLock<Option<String>>,
    data_listeners: ListenerSet<DataEvent>,
    log_listeners: ListenerSet<LogEntry>,
    status_listeners: ListenerSet<StatusEvent>,
    buffer_config: BufferConfig,
}

impl SessionRegistry {
    pub fn new(transport: Arc<TransportManager>, buffer_config: &BufferConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            sessions: DashMap::new(),
            order: RwLock::new(Vec::new()),
            focused: RwLock::new(None),
            data_listeners: ListenerSet::new(),
            log_listeners: ListenerSet::new(),
            status_listeners: ListenerSet::new(),
            buffer_config: buffer_config.clone(),
        })
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }

    /// Drain transport events into [`dispatch`](Self::dispatch). The task
    /// stops when the registry is dropped or the channel closes.
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                registry.dispatch(event);
            }
            debug!("[registry] dispatcher stopped");
        })
    }

    pub fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { endpoint } => {
                self.emit_system(LogType::System, format!("Connected to backend at {}", endpoint));
            }
            TransportEvent::ConnectFailed { endpoint, message } => {
                let text = format!("Connection to {} failed: {}", endpoint, message);
                self.emit_system(LogType::Error, text.clone());
                for session_id in self.sessions_with(|s| s == SessionStatus::Connecting) {
                    self.record(&session_id, vec![LogEntry::new(&session_id, LogType::Error, &text)]);
                    self.apply_status(&session_id, SessionStatus::Error, Some(text.clone()));
                }
            }
            TransportEvent::Disconnected { reason, .. } => {
                self.emit_system(LogType::System, format!("Backend link closed: {}", reason));
                for session_id in self.sessions_with(|s| s != SessionStatus::Disconnected) {
                    self.apply_status(&session_id, SessionStatus::Disconnected, Some(reason.clone()));
                }
            }
            TransportEvent::Frame(frame) => self.dispatch_frame(frame),
        }
    }

    fn dispatch_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Data { session_id, data } => {
                self.deliver_output(&session_id, &data, LogType::Info)
            }
            ServerFrame::Error {
                session_id,
                message,
            } => {
                if !self.accepts(&session_id) {
                    return;
                }
                self.record(&session_id, vec![LogEntry::new(&session_id, LogType::Error, &message)]);
                if self.status(&session_id) == Some(SessionStatus::Connecting) {
                    self.apply_status(&session_id, SessionStatus::Error, Some(message));
                }
            }
            ServerFrame::Status {
                session_id,
                status,
                message,
            } => {
                if !self.accepts(&session_id) {
                    return;
                }
                let parsed = match status.parse::<SessionStatus>() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!("[registry] {} for session {}", e, session_id);
                        return;
                    }
                };
                let content = match &message {
                    Some(message) => format!("Session {}: {}", parsed, message),
                    None => format!("Session {}", parsed),
                };
                self.record(&session_id, vec![LogEntry::new(&session_id, LogType::System, content)]);
                self.apply_status(&session_id, parsed, message);
            }
            ServerFrame::ExecResult { id, .. } => {
                debug!("[registry] uncorrelated exec result {} ignored", id);
            }
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Register the session (first call for an id creates it) and ask the
    /// backend to open the shell.
    ///
    /// Failures are not returned: they reach listeners as status and log
    /// events, since the link is shared by every session.
    pub async fn connect(&self, config: SessionConfig) {
        let session_id = config.session_id.clone();
        let payload = config.to_payload();
        self.ensure_session(config);
        self.apply_status(&session_id, SessionStatus::Connecting, None);

        if self.transport.connect().await.is_err() {
            // ConnectFailed was published; the dispatcher marks the session
            return;
        }

        if let Err(e) = self.transport.send(ClientFrame::Connect(payload)) {
            warn!("[registry] connect request for {} not sent: {}", session_id, e);
            let text = e.to_string();
            self.record(&session_id, vec![LogEntry::new(&session_id, LogType::Error, &text)]);
            self.apply_status(&session_id, SessionStatus::Error, Some(text));
        }
    }

    fn ensure_session(&self, config: SessionConfig) {
        let session_id = config.session_id.clone();
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.config = config;
            return;
        }

        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                config,
                state: SessionState::new(),
                logs: VecDeque::new(),
                scroll_buffer: Arc::new(ScrollBuffer::with_capacity(self.buffer_config.max_lines)),
                created_at: Utc::now(),
            },
        );
        self.order.write().push(session_id.clone());

        let mut focused = self.focused.write();
        if focused.is_none() {
            *focused = Some(session_id.clone());
        }
        info!("[registry] session {} registered", session_id);
    }

    /// Close the session and destroy its state: per-session listeners are
    /// removed and the buffer is cleared. Returns `false` for unknown ids.
    pub fn disconnect(&self, session_id: &str) -> bool {
        let Some((_, entry)) = self.sessions.remove(session_id) else {
            return false;
        };

        if self.transport.is_connected() {
            if let Err(e) = self.transport.send(ClientFrame::Disconnect {
                session_id: session_id.to_string(),
            }) {
                warn!("[registry] disconnect for {} not sent: {}", session_id, e);
            }
        }
        entry.scroll_buffer.clear();

        {
            let mut order = self.order.write();
            let index = order.iter().position(|id| id == session_id);
            if let Some(index) = index {
                order.remove(index);
            }

            let mut focused = self.focused.write();
            if focused.as_deref() == Some(session_id) {
                *focused = match index {
                    Some(i) if !order.is_empty() => Some(order[i.min(order.len() - 1)].clone()),
                    _ => None,
                };
            }
        }

        self.status_listeners.emit(
            session_id,
            &StatusEvent {
                session_id: session_id.to_string(),
                status: SessionStatus::Disconnected,
                message: None,
            },
        );
        self.data_listeners.remove_scope(session_id);
        self.log_listeners.remove_scope(session_id);
        self.status_listeners.remove_scope(session_id);

        info!("[registry] session {} disconnected", session_id);
        true
    }

    pub fn disconnect_all(&self) {
        for session_id in self.session_ids() {
            self.disconnect(&session_id);
        }
    }

    // ========================================================================
    // Fire-and-forget input
    // ========================================================================

    /// Raw keystrokes. Never blocks; failures are logged.
    pub fn send_input(&self, session_id: &str, data: &str) {
        if let Err(e) = self.transport.send(ClientFrame::Input {
            session_id: session_id.to_string(),
            data: data.to_string(),
        }) {
            warn!("[registry] input for {} dropped: {}", session_id, e);
        }
    }

    pub fn resize(&self, session_id: &str, cols: u32, rows: u32) {
        if let Err(e) = self.transport.send(ClientFrame::Resize {
            session_id: session_id.to_string(),
            cols,
            rows,
        }) {
            warn!("[registry] resize for {} dropped: {}", session_id, e);
        }
    }

    // ========================================================================
    // Local emission (command echo, exec output)
    // ========================================================================

    /// Record a command: a `command` log entry plus an echo on the data
    /// stream, emitted before any result arrives. The echo itself is not
    /// logged again.
    pub fn record_command(&self, session_id: &str, command: &str) {
        if !self.accepts(session_id) {
            return;
        }
        self.record(session_id, vec![LogEntry::new(session_id, LogType::Command, command)]);
        self.emit_data(session_id, &format!("$ {}\r\n", command));
    }

    /// Route output through the same path as inbound data frames, logging
    /// each non-empty line as `kind`.
    pub fn deliver_output(&self, session_id: &str, data: &str, kind: LogType) {
        if !self.accepts(session_id) {
            return;
        }
        self.emit_data(session_id, data);
        self.record(session_id, LogEntry::split(session_id, kind, data));
    }

    /// Scroll buffer and data listeners only
    fn emit_data(&self, session_id: &str, data: &str) {
        if let Some(entry) = self.sessions.get(session_id) {
            entry.scroll_buffer.append_output(data);
        }

        self.data_listeners.emit(
            session_id,
            &DataEvent {
                session_id: session_id.to_string(),
                data: data.to_string(),
            },
        );
    }

    fn accepts(&self, session_id: &str) -> bool {
        if session_id == SYSTEM_SESSION_ID || self.sessions.contains_key(session_id) {
            true
        } else {
            debug!("[registry] dropping event for unknown session {}", session_id);
            false
        }
    }

    fn record(&self, session_id: &str, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            let max = self.buffer_config.max_log_entries.max(1);
            for log in &entries {
                if entry.logs.len() >= max {
                    entry.logs.pop_front();
                }
                entry.logs.push_back(log.clone());
            }
        }
        for log in &entries {
            self.log_listeners.emit(session_id, log);
        }
    }

    fn emit_system(&self, kind: LogType, content: String) {
        self.log_listeners
            .emit(SYSTEM_SESSION_ID, &LogEntry::new(SYSTEM_SESSION_ID, kind, content));
    }

    fn apply_status(&self, session_id: &str, status: SessionStatus, message: Option<String>) {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.state.set(status, message.as_deref());
            }
            None => return,
        }
        self.status_listeners.emit(
            session_id,
            &StatusEvent {
                session_id: session_id.to_string(),
                status,
                message,
            },
        );
    }

    fn sessions_with(&self, predicate: impl Fn(SessionStatus) -> bool) -> Vec<String> {
        self.session_ids()
            .into_iter()
            .filter(|id| self.status(id).is_some_and(&predicate))
            .collect()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    pub fn on_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DataEvent) + Send + Sync + 'static,
    {
        self.data_listeners.subscribe(None, callback)
    }

    pub fn on_session_data<F>(&self, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(&DataEvent) + Send + Sync + 'static,
    {
        self.data_listeners.subscribe(Some(session_id), callback)
    }

    pub fn on_log<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.log_listeners.subscribe(None, callback)
    }

    pub fn on_session_log<F>(&self, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.log_listeners.subscribe(Some(session_id), callback)
    }

    pub fn on_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.status_listeners.subscribe(None, callback)
    }

    pub fn on_session_status<F>(&self, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.status_listeners.subscribe(Some(session_id), callback)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Session ids in insertion order
    pub fn session_ids(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions.get(session_id).map(|e| e.state.status())
    }

    pub fn logs(&self, session_id: &str) -> Vec<LogEntry> {
        self.sessions
            .get(session_id)
            .map(|e| e.logs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn scroll_buffer(&self, session_id: &str) -> Option<Arc<ScrollBuffer>> {
        self.sessions.get(session_id).map(|e| e.scroll_buffer.clone())
    }

    pub fn focused(&self) -> Option<String> {
        self.focused.read().clone()
    }

    /// Move focus; returns `false` for unknown ids.
    pub fn focus(&self, session_id: &str) -> bool {
        if !self.sessions.contains_key(session_id) {
            return false;
        }
        *self.focused.write() = Some(session_id.to_string());
        true
    }
}
