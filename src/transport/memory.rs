//! In-process connector
//!
//! Pairs a [`MemoryConnector`] (given to the `TransportManager`) with a
//! [`MemoryBackend`] that accepts each physical link as a [`MemoryPeer`].
//! Used for embedding a backend in the same process and for driving the
//! transport deterministically in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::connector::{Connector, Link};
use super::endpoint::Endpoint;
use super::protocol::{ClientFrame, ServerFrame};
use super::TransportError;

const LINK_QUEUE: usize = 256;

#[derive(Default)]
struct MemoryState {
    attempts: Vec<Endpoint>,
    refuse_remaining: usize,
    connect_delay: Option<Duration>,
}

/// Connector side of an in-process backend.
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Backend side: accepts links opened through the paired connector.
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    peers_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// One accepted physical link, seen from the backend.
pub struct MemoryPeer {
    pub endpoint: Endpoint,
    from_client: mpsc::Receiver<ClientFrame>,
    to_client: mpsc::Sender<ServerFrame>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryBackend) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        (
            Self {
                state: state.clone(),
                peers_tx,
            },
            MemoryBackend { state, peers_rx },
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        let delay = {
            let mut state = self.state.lock();
            state.attempts.push(endpoint.clone());
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut state = self.state.lock();
            if state.refuse_remaining > 0 {
                state.refuse_remaining -= 1;
                return Err(TransportError::Connect(format!(
                    "connection refused by {}",
                    endpoint
                )));
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(LINK_QUEUE);
        let (inbound_tx, inbound_rx) = mpsc::channel(LINK_QUEUE);
        let peer = MemoryPeer {
            endpoint: endpoint.clone(),
            from_client: outbound_rx,
            to_client: inbound_tx,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::Connect("in-process backend is gone".to_string()))?;

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
            io_task: None,
        })
    }
}

impl MemoryBackend {
    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.state.lock().refuse_remaining = count;
    }

    /// Delay every connection attempt before it completes.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    /// Endpoints of every connection attempt so far, in order.
    pub fn attempts(&self) -> Vec<Endpoint> {
        self.state.lock().attempts.clone()
    }

    /// Wait for the next accepted link.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers_rx.recv().await
    }

    /// Take an already accepted link without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers_rx.try_recv().ok()
    }
}

impl MemoryPeer {
    /// Next frame from the client; `None` once the client closed the link.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Push a frame to the client.
    pub async fn send(&self, frame: ServerFrame) -> Result<(), TransportError> {
        self.to_client
            .send(frame)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Serve the link with `respond`, returning every frame the client sent
    /// once the link closes.
    pub fn spawn_responder<F>(mut self, mut respond: F) -> JoinHandle<Vec<ClientFrame>>
    where
        F: FnMut(&ClientFrame) -> Vec<ServerFrame> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(frame) = self.from_client.recv().await {
                for reply in respond(&frame) {
                    if self.to_client.send(reply).await.is_err() {
                        return seen;
                    }
                }
                seen.push(frame);
            }
            seen
        })
    }

    /// Close the link from the backend side.
    pub fn close(self) {
        drop(self);
    }
}
