//! Transport layer
//!
//! One physical link to the backend execution service, multiplexing every
//! session over session-tagged frames.

pub mod connector;
pub mod endpoint;
pub mod manager;
pub mod memory;
pub mod protocol;

pub use connector::{Connector, Link, WsConnector};
pub use endpoint::{Endpoint, EndpointDiscovery, StaticPort};
pub use manager::{LinkState, TransportEvent, TransportManager, TransportStats};
pub use memory::{MemoryBackend, MemoryConnector, MemoryPeer};
pub use protocol::{ClientFrame, ConnectPayload, ExecReply, ExecStatus, ServerFrame, SYSTEM_SESSION_ID};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Outbound queue full")]
    QueueFull,

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to serialize frame: {0}")]
    Serialize(String),

    #[error("Failed to deserialize frame: {0}")]
    Deserialize(String),
}
