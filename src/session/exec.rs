//! Command execution over the shared link
//!
//! Two modes:
//! - [`CommandChannel::execute`]: correlated round trip that always resolves
//!   to text, never an error, so callers reasoning over output (the
//!   autopilot) always have something to read.
//! - [`CommandChannel::send_input`] / [`CommandChannel::send_command`]:
//!   fire-and-forget keystrokes.
//!
//! Both `execute` and `send_command` log the command and echo it on the data
//! stream before anything is sent.

use std::sync::Arc;

use tracing::{debug, warn};

use super::log::LogType;
use super::registry::SessionRegistry;
use crate::transport::{ExecStatus, TransportError};

/// Line ending expected by the terminal surface
pub const LINE_ENDING: &str = "\r\n";

/// Result of a correlated exec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Output, newline-normalised and ending with [`LINE_ENDING`]
    Completed(String),
    /// Formatted error text
    Failed(String),
    /// No link to the backend; resolved without waiting
    NotConnected,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Completed(text) | Self::Failed(text) => text,
            Self::NotConnected => "Error: Not connected to backend\r\n",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Completed(text) | Self::Failed(text) => text,
            Self::NotConnected => Self::NotConnected.text().to_string(),
        }
    }
}

/// Convert any line breaks to `\r\n` and guarantee a trailing one.
pub fn normalize_output(output: &str) -> String {
    let unified = output.replace("\r\n", "\n").replace('\r', "\n");
    let mut text = unified.replace('\n', LINE_ENDING);
    if !text.ends_with(LINE_ENDING) {
        text.push_str(LINE_ENDING);
    }
    text
}

fn error_text(message: &str) -> String {
    normalize_output(&format!("Error: {}", message.trim_end()))
}

#[derive(Clone)]
pub struct CommandChannel {
    registry: Arc<SessionRegistry>,
}

impl CommandChannel {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Run `command` on the session and wait for its output.
    pub async fn execute(&self, session_id: &str, command: &str) -> CommandOutcome {
        self.registry.record_command(session_id, command);

        let outcome = match self.registry.transport().exec(session_id, command).await {
            Ok(reply) => match reply.status {
                ExecStatus::Ok => {
                    CommandOutcome::Completed(normalize_output(reply.output.as_deref().unwrap_or("")))
                }
                ExecStatus::Error => {
                    let message = reply
                        .message
                        .or(reply.output)
                        .unwrap_or_else(|| "command failed".to_string());
                    CommandOutcome::Failed(error_text(&message))
                }
            },
            Err(TransportError::NotConnected) => CommandOutcome::NotConnected,
            Err(TransportError::Timeout(secs)) => {
                CommandOutcome::Failed(error_text(&format!("command timed out after {}s", secs)))
            }
            Err(e) => CommandOutcome::Failed(error_text(&e.to_string())),
        };

        let kind = if outcome.is_success() {
            debug!("[exec] {} on {} completed", command, session_id);
            LogType::Info
        } else {
            warn!("[exec] {} on {}: {}", command, session_id, outcome.text().trim_end());
            LogType::Error
        };
        self.registry.deliver_output(session_id, outcome.text(), kind);
        outcome
    }

    /// Raw keystrokes, no logging
    pub fn send_input(&self, session_id: &str, data: &str) {
        self.registry.send_input(session_id, data);
    }

    /// A typed command: logged, echoed, then sent with a carriage return
    pub fn send_command(&self, session_id: &str, command: &str) {
        self.registry.record_command(session_id, command);
        self.registry.send_input(session_id, &format!("{}\r", command));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, BufferConfig};
    use crate::session::{LogType, SessionConfig};
    use crate::transport::{
        ClientFrame, ExecReply, MemoryBackend, MemoryConnector, ServerFrame, TransportManager,
    };
    use parking_lot::Mutex;

    async fn connected() -> (CommandChannel, MemoryBackend) {
        let (connector, backend) = MemoryConnector::new();
        let (transport, events) = TransportManager::new(&BackendConfig::default(), Arc::new(connector));
        let registry = SessionRegistry::new(transport, &BufferConfig::default());
        let _dispatcher = registry.spawn_dispatcher(events);
        registry
            .connect(SessionConfig::with_password("s1", "h", "u", "p"))
            .await;
        (CommandChannel::new(registry), backend)
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("a\nb"), "a\r\nb\r\n");
        assert_eq!(normalize_output("a\r\nb\r\n"), "a\r\nb\r\n");
        assert_eq!(normalize_output(""), "\r\n");
    }

    #[tokio::test]
    async fn test_not_connected_resolves_immediately() {
        let (connector, _backend) = MemoryConnector::new();
        let (transport, _events) = TransportManager::new(&BackendConfig::default(), Arc::new(connector));
        let channel = CommandChannel::new(SessionRegistry::new(transport, &BufferConfig::default()));

        let outcome = channel.execute("s1", "ls").await;
        assert_eq!(outcome, CommandOutcome::NotConnected);
        assert!(outcome.into_text().contains("Not connected"));
    }

    #[tokio::test]
    async fn test_execute_normalises_output() {
        let (channel, mut backend) = connected().await;
        let peer = backend.accept().await.unwrap();
        let _server = peer.spawn_responder(|frame| match frame {
            ClientFrame::Exec { id, .. } => vec![ServerFrame::ExecResult {
                id: *id,
                reply: ExecReply::ok("a.txt\nb.txt"),
            }],
            _ => vec![],
        });

        let outcome = channel.execute("s1", "ls /tmp").await;
        assert_eq!(outcome, CommandOutcome::Completed("a.txt\r\nb.txt\r\n".to_string()));
    }

    #[tokio::test]
    async fn test_backend_error_resolves_as_text() {
        let (channel, mut backend) = connected().await;
        let peer = backend.accept().await.unwrap();
        let _server = peer.spawn_responder(|frame| match frame {
            ClientFrame::Exec { id, .. } => vec![ServerFrame::ExecResult {
                id: *id,
                reply: ExecReply::error("Session not found"),
            }],
            _ => vec![],
        });

        let outcome = channel.execute("s1", "ls").await;
        assert_eq!(outcome, CommandOutcome::Failed("Error: Session not found\r\n".to_string()));

        let logs = channel.registry().logs("s1");
        let last = logs.last().unwrap();
        assert_eq!(last.kind, LogType::Error);
        assert_eq!(last.content, "Error: Session not found");
        // The echo reaches the data stream only
        assert!(!logs.iter().any(|l| l.content.starts_with("$ ")));
    }

    #[tokio::test]
    async fn test_command_logged_and_echoed_first() {
        let (channel, mut backend) = connected().await;
        let peer = backend.accept().await.unwrap();
        let _server = peer.spawn_responder(|frame| match frame {
            ClientFrame::Exec { id, .. } => vec![ServerFrame::ExecResult {
                id: *id,
                reply: ExecReply::ok("Linux"),
            }],
            _ => vec![],
        });

        let data = Arc::new(Mutex::new(Vec::new()));
        let sink = data.clone();
        let _d = channel
            .registry()
            .on_session_data("s1", move |e| sink.lock().push(e.data.clone()));

        channel.execute("s1", "uname").await;

        let data = data.lock();
        assert_eq!(data[0], "$ uname\r\n");
        assert_eq!(data[1], "Linux\r\n");
        let logs = channel.registry().logs("s1");
        assert!(logs
            .iter()
            .any(|l| l.kind == LogType::Command && l.content == "uname"));
    }

    #[tokio::test]
    async fn test_send_command_is_fire_and_forget() {
        let (channel, mut backend) = connected().await;
        let mut peer = backend.accept().await.unwrap();
        // Skip the ssh-connect request
        assert!(matches!(peer.recv().await, Some(ClientFrame::Connect(_))));

        channel.send_command("s1", "top");
        match peer.recv().await.unwrap() {
            ClientFrame::Input { data, .. } => assert_eq!(data, "top\r"),
            other => panic!("Expected input frame, got {:?}", other),
        }
    }
}
