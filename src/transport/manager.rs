//! Transport Manager: the single physical link to the backend
//!
//! All sessions share one link. The manager:
//! - connects lazily, with at most one attempt in flight (`connect_lock`)
//! - re-checks the discovered endpoint before every connect and tears the
//!   current link down when the target moved
//! - correlates `ssh-exec` requests with `ssh-exec-result` frames by `id`
//! - publishes everything else as [`TransportEvent`]s on one ordered channel
//!
//! Connection failures are published, not thrown at a single caller; the
//! manager stays usable and the next `connect()` retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connector::{Connector, Link};
use super::endpoint::{Endpoint, EndpointDiscovery};
use super::protocol::{ClientFrame, ExecReply, ServerFrame};
use super::TransportError;
use crate::config::BackendConfig;

/// Events published by the transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Physical link established
    Connected { endpoint: Endpoint },
    /// Connection attempt failed; the manager remains retryable
    ConnectFailed { endpoint: Endpoint, message: String },
    /// Physical link ended (peer close, teardown or redirect)
    Disconnected { endpoint: Endpoint, reason: String },
    /// Inbound session frame (never `ExecResult`, those are correlated)
    Frame(ServerFrame),
}

/// State of the physical link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub connect_attempts: u64,
    pub redirects: u64,
    pub open_links: usize,
}

/// Pending exec handlers (request id → oneshot sender).
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<ExecReply, TransportError>>>>>;

struct ActiveLink {
    generation: u64,
    endpoint: Endpoint,
    outbound: mpsc::Sender<ClientFrame>,
    io_task: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

struct LinkSlot {
    target: Endpoint,
    state: LinkState,
    link: Option<ActiveLink>,
}

pub struct TransportManager {
    connector: Arc<dyn Connector>,
    default_endpoint: Endpoint,
    slot: Arc<Mutex<LinkSlot>>,
    resolved: Arc<Mutex<Option<Endpoint>>>,
    discovery_started: AtomicBool,

    /// Serialises connection attempts
    connect_lock: tokio::sync::Mutex<()>,

    pending: PendingMap,
    events_tx: mpsc::UnboundedSender<TransportEvent>,

    next_request_id: AtomicU64,
    next_generation: AtomicU64,
    open_links: Arc<AtomicUsize>,
    connect_attempts: AtomicU64,
    redirects: AtomicU64,

    connect_timeout: Duration,
    exec_timeout: Duration,
    discovery_timeout: Duration,
}

impl TransportManager {
    /// Create the manager in the disconnected state. Nothing is dialled until
    /// the first [`connect`](Self::connect).
    ///
    /// Returns the manager and the receiver for its event stream; exactly one
    /// consumer should drain it.
    pub fn new(
        config: &BackendConfig,
        connector: Arc<dyn Connector>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let default_endpoint = Endpoint::from_config(config);

        let manager = Arc::new(Self {
            connector,
            slot: Arc::new(Mutex::new(LinkSlot {
                target: default_endpoint.clone(),
                state: LinkState::Disconnected,
                link: None,
            })),
            default_endpoint,
            resolved: Arc::new(Mutex::new(None)),
            discovery_started: AtomicBool::new(false),
            connect_lock: tokio::sync::Mutex::new(()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            events_tx,
            next_request_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            open_links: Arc::new(AtomicUsize::new(0)),
            connect_attempts: AtomicU64::new(0),
            redirects: AtomicU64::new(0),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            exec_timeout: Duration::from_secs(config.exec_timeout_secs),
            discovery_timeout: Duration::from_secs(config.discovery_timeout_secs),
        });

        (manager, events_rx)
    }

    /// Start endpoint discovery. Only the first call per manager does
    /// anything; later calls return `None`.
    ///
    /// Discovery that fails or exceeds the discovery timeout resolves to the
    /// default endpoint.
    pub fn resolve_endpoint(
        &self,
        discovery: Arc<dyn EndpointDiscovery>,
    ) -> Option<JoinHandle<Endpoint>> {
        if self.discovery_started.swap(true, Ordering::AcqRel) {
            warn!("[transport] endpoint discovery already started, ignoring");
            return None;
        }

        let resolved = self.resolved.clone();
        let fallback = self.default_endpoint.clone();
        let bound = self.discovery_timeout;

        Some(tokio::spawn(async move {
            let endpoint = match tokio::time::timeout(bound, discovery.resolve_port()).await {
                Ok(Ok(port)) => {
                    info!("[transport] backend endpoint discovered on port {}", port);
                    fallback.with_port(port)
                }
                Ok(Err(e)) => {
                    warn!("[transport] endpoint discovery failed ({}), using {}", e, fallback);
                    fallback
                }
                Err(_) => {
                    warn!(
                        "[transport] endpoint discovery timed out after {}s, using {}",
                        bound.as_secs(),
                        fallback
                    );
                    fallback
                }
            };
            *resolved.lock() = Some(endpoint.clone());
            endpoint
        }))
    }

    /// Ensure the physical link is up.
    ///
    /// Before dialling, a discovered endpoint that differs from the current
    /// target replaces it and forces the current link (if any) down. Failures
    /// are also published as [`TransportEvent::ConnectFailed`].
    pub async fn connect(&self) -> Result<(), TransportError> {
        let _guard = self.connect_lock.lock().await;

        self.apply_resolved_endpoint();

        let target = {
            let mut slot = self.slot.lock();
            if slot.link.is_some() {
                return Ok(());
            }
            slot.state = LinkState::Connecting;
            slot.target.clone()
        };

        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        info!("[transport] connecting to {}", target);

        let outcome = match tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(&target),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.connect_timeout.as_secs())),
        };

        match outcome {
            Ok(link) => {
                self.install(target, link);
                Ok(())
            }
            Err(e) => {
                warn!("[transport] connect to {} failed: {}", target, e);
                self.slot.lock().state = LinkState::Disconnected;
                let _ = self.events_tx.send(TransportEvent::ConnectFailed {
                    endpoint: target,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Queue a frame without waiting for any response.
    pub fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        let outbound = self.outbound().ok_or(TransportError::NotConnected)?;
        outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
        })
    }

    /// Correlated exec round trip. Fails immediately with `NotConnected` when
    /// there is no link; never waits for one.
    pub async fn exec(&self, session_id: &str, command: &str) -> Result<ExecReply, TransportError> {
        let outbound = self.outbound().ok_or(TransportError::NotConnected)?;

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = ClientFrame::Exec {
            id,
            session_id: session_id.to_string(),
            command: command.to_string(),
        };
        if outbound.send(frame).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(TransportError::ChannelClosed);
        }

        match tokio::time::timeout(self.exec_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(TransportError::Timeout(self.exec_timeout.as_secs()))
            }
        }
    }

    /// Close the physical link and fail all pending exec calls. The manager
    /// can connect again afterwards.
    pub fn teardown(&self) {
        self.drop_link("teardown requested");
    }

    pub fn state(&self) -> LinkState {
        self.slot.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Endpoint the next connect will dial
    pub fn target(&self) -> Endpoint {
        self.slot.lock().target.clone()
    }

    /// Endpoint produced by discovery, once it finished
    pub fn resolved_endpoint(&self) -> Option<Endpoint> {
        self.resolved.lock().clone()
    }

    /// Number of physical links currently open (0 or 1)
    pub fn open_links(&self) -> usize {
        self.open_links.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            open_links: self.open_links(),
        }
    }

    fn outbound(&self) -> Option<mpsc::Sender<ClientFrame>> {
        self.slot
            .lock()
            .link
            .as_ref()
            .map(|link| link.outbound.clone())
    }

    fn apply_resolved_endpoint(&self) {
        let Some(resolved) = self.resolved.lock().clone() else {
            return;
        };

        let previous = {
            let mut slot = self.slot.lock();
            if slot.target == resolved {
                return;
            }
            std::mem::replace(&mut slot.target, resolved.clone())
        };

        self.redirects.fetch_add(1, Ordering::Relaxed);
        info!("[transport] redirecting {} -> {}", previous, resolved);
        self.drop_link("endpoint changed");
    }

    fn install(&self, endpoint: Endpoint, link: Link) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let Link {
            outbound,
            inbound,
            io_task,
        } = link;

        self.open_links.fetch_add(1, Ordering::AcqRel);
        let _ = self.events_tx.send(TransportEvent::Connected {
            endpoint: endpoint.clone(),
        });
        info!("[transport] connected to {} (link #{})", endpoint, generation);

        let mut slot = self.slot.lock();
        let reader = tokio::spawn(read_link(
            generation,
            inbound,
            self.slot.clone(),
            self.pending.clone(),
            self.events_tx.clone(),
            self.open_links.clone(),
        ));
        slot.link = Some(ActiveLink {
            generation,
            endpoint,
            outbound,
            io_task,
            reader: Some(reader),
        });
        slot.state = LinkState::Connected;
    }

    fn drop_link(&self, reason: &str) {
        let link = {
            let mut slot = self.slot.lock();
            slot.state = LinkState::Disconnected;
            slot.link.take()
        };
        let Some(mut link) = link else {
            return;
        };

        self.open_links.fetch_sub(1, Ordering::AcqRel);
        if let Some(reader) = link.reader.take() {
            reader.abort();
        }
        if let Some(io_task) = link.io_task.take() {
            io_task.abort();
        }
        drop(link.outbound);
        fail_pending(&self.pending);

        info!("[transport] link #{} to {} closed: {}", link.generation, link.endpoint, reason);
        let _ = self.events_tx.send(TransportEvent::Disconnected {
            endpoint: link.endpoint,
            reason: reason.to_string(),
        });
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        if let Some(mut link) = self.slot.lock().link.take() {
            if let Some(reader) = link.reader.take() {
                reader.abort();
            }
            if let Some(io_task) = link.io_task.take() {
                io_task.abort();
            }
        }
    }
}

/// Reader task: routes exec results to their waiters and everything else to
/// the event stream. Cleans up the slot when the peer ends the link.
async fn read_link(
    generation: u64,
    mut inbound: mpsc::Receiver<ServerFrame>,
    slot: Arc<Mutex<LinkSlot>>,
    pending: PendingMap,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    open_links: Arc<AtomicUsize>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame {
            ServerFrame::ExecResult { id, reply } => {
                let waiter = pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(Ok(reply));
                    }
                    None => warn!("[transport] exec result for unknown id {}", id),
                }
            }
            other => {
                let _ = events_tx.send(TransportEvent::Frame(other));
            }
        }
    }

    // Peer closed. Only clean up if this link is still the current one.
    let ended = {
        let mut slot = slot.lock();
        if slot.link.as_ref().map(|l| l.generation) == Some(generation) {
            slot.state = LinkState::Disconnected;
            slot.link.take()
        } else {
            None
        }
    };

    if let Some(mut link) = ended {
        open_links.fetch_sub(1, Ordering::AcqRel);
        if let Some(io_task) = link.io_task.take() {
            io_task.abort();
        }
        fail_pending(&pending);
        info!("[transport] link #{} closed by peer", generation);
        let _ = events_tx.send(TransportEvent::Disconnected {
            endpoint: link.endpoint,
            reason: "connection closed by backend".to_string(),
        });
    } else {
        debug!("[transport] stale link #{} reader finished", generation);
    }
}

fn fail_pending(pending: &PendingMap) {
    let drained: Vec<_> = pending.lock().drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(TransportError::ChannelClosed));
    }
}
