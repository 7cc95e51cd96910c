//! Shared harness: a registry wired to an in-process backend
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use termpilot::config::{BackendConfig, BufferConfig};
use termpilot::session::{SessionConfig, SessionRegistry, SessionStatus};
use termpilot::transport::{
    ClientFrame, ExecReply, MemoryBackend, MemoryConnector, ServerFrame, TransportManager,
};
use tokio::task::JoinHandle;

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<TransportManager>,
    /// Resolves to every frame the backend received once the link closes
    pub backend: JoinHandle<Vec<ClientFrame>>,
    _dispatcher: JoinHandle<()>,
}

/// Registry whose backend answers every frame with `respond`
pub fn start<F>(respond: F) -> Harness
where
    F: FnMut(&ClientFrame) -> Vec<ServerFrame> + Send + 'static,
{
    start_with(move |mut backend: MemoryBackend| async move {
        match backend.accept().await {
            Some(peer) => peer.spawn_responder(respond).await.unwrap_or_default(),
            None => Vec::new(),
        }
    })
}

/// Registry whose backend side is driven by `serve`
pub fn start_with<B, Fut>(serve: B) -> Harness
where
    B: FnOnce(MemoryBackend) -> Fut,
    Fut: std::future::Future<Output = Vec<ClientFrame>> + Send + 'static,
{
    let (connector, backend) = MemoryConnector::new();
    let (transport, events) = TransportManager::new(&BackendConfig::default(), Arc::new(connector));
    let registry = SessionRegistry::new(transport.clone(), &BufferConfig::default());
    let dispatcher = registry.spawn_dispatcher(events);

    Harness {
        registry,
        transport,
        backend: tokio::spawn(serve(backend)),
        _dispatcher: dispatcher,
    }
}

fn status(session_id: &str, status: &str) -> ServerFrame {
    ServerFrame::Status {
        session_id: session_id.to_string(),
        status: status.to_string(),
        message: None,
    }
}

/// A well-behaved backend: opens shells, echoes typed input, answers execs
pub fn shell(frame: &ClientFrame) -> Vec<ServerFrame> {
    match frame {
        ClientFrame::Connect(payload) => vec![status(&payload.session_id, "connected")],
        ClientFrame::Disconnect { session_id } => vec![status(session_id, "disconnected")],
        ClientFrame::Input { session_id, data } => vec![ServerFrame::Data {
            session_id: session_id.clone(),
            data: format!("{}\n", data.trim_end()),
        }],
        ClientFrame::Exec { id, command, .. } => vec![ServerFrame::ExecResult {
            id: *id,
            reply: exec_reply(command),
        }],
        ClientFrame::Resize { .. } => Vec::new(),
    }
}

fn exec_reply(command: &str) -> ExecReply {
    match command {
        "ls /tmp" => ExecReply::ok("a.txt\nb.txt\n"),
        c if c.starts_with("cat ") => ExecReply::error("No such file or directory"),
        other => ExecReply::ok(format!("ran {}\n", other)),
    }
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Open a password session and wait until the backend reports it connected
pub async fn connect(harness: &Harness, session_id: &str) {
    harness
        .registry
        .connect(SessionConfig::with_password(session_id, "10.0.0.5", "root", "secret"))
        .await;

    let registry = harness.registry.clone();
    eventually(|| registry.status(session_id) == Some(SessionStatus::Connected)).await;
}
