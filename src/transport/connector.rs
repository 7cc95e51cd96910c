//! Physical link establishment
//!
//! A [`Connector`] opens one duplex link to the backend and hands back a pair of
//! frame channels. The production connector speaks JSON over WebSocket; tests
//! and in-process hosts use [`super::memory::MemoryConnector`].
//!
//! ```text
//! ┌──────────────────┐  ClientFrame  ┌──────────┐   WS text   ┌─────────┐
//! │ TransportManager │ ────────────▸ │ IO task  │ ──────────▸ │ Backend │
//! │                  │ ◂──────────── │          │ ◂────────── │         │
//! └──────────────────┘  ServerFrame  └──────────┘             └─────────┘
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::endpoint::Endpoint;
use super::protocol::{ClientFrame, ServerFrame};
use super::TransportError;

/// An established physical link.
///
/// The link is alive while `inbound` yields frames; it ends when the peer
/// closes or the `outbound` sender is dropped.
pub struct Link {
    pub outbound: mpsc::Sender<ClientFrame>,
    pub inbound: mpsc::Receiver<ServerFrame>,
    /// IO task driving the link, aborted on teardown
    pub io_task: Option<JoinHandle<()>>,
}

impl Link {
    /// Close the link: stop accepting outbound frames and stop the IO task.
    pub fn close(self) {
        drop(self.outbound);
        if let Some(task) = self.io_task {
            task.abort();
        }
    }
}

/// Opens physical links to the backend.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError>;
}

/// WebSocket connector (JSON text frames).
pub struct WsConnector {
    path: String,
    queue: usize,
}

impl WsConnector {
    pub fn new(path: impl Into<String>, queue: usize) -> Self {
        Self {
            path: path.into(),
            queue: queue.max(1),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        let url = endpoint.ws_url(&self.path);
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {}", url, e)))?;
        info!("[transport] WebSocket established to {}", url);

        let (mut sink, mut stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientFrame>(self.queue);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerFrame>(self.queue);

        // Combined IO task: one owner for both halves of the socket
        let io_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        };
                        let text = match frame.encode() {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("[transport] dropping unencodable frame: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text)).await.is_err() {
                            warn!("[transport] write failed, socket closed");
                            break;
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => match ServerFrame::decode(&text) {
                                Ok(frame) => {
                                    if inbound_tx.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => debug!("[transport] ignoring frame: {}", e),
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                info!("[transport] socket closed by peer");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("[transport] socket error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
            debug!("[transport] IO task ended");
        });

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
            io_task: Some(io_task),
        })
    }
}
