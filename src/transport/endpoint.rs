//! Backend endpoint model and discovery
//!
//! The hosting environment may assign the backend's port at runtime. Discovery
//! is consumed as a capability ([`EndpointDiscovery`]) and bounded by a timeout;
//! until it resolves the configured default endpoint is used.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

/// Address of the backend execution service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Default endpoint from the backend config
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.host.clone(), config.default_port)
    }

    /// Same host, different port
    pub fn with_port(&self, port: u16) -> Self {
        Self::new(self.host.clone(), port)
    }

    /// WebSocket URL for this endpoint
    pub fn ws_url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Capability provided by the hosting environment: yields the port the
/// backend was assigned.
#[async_trait]
pub trait EndpointDiscovery: Send + Sync {
    async fn resolve_port(&self) -> Result<u16, String>;
}

/// Discovery that answers with a port known up front.
#[derive(Debug, Clone, Copy)]
pub struct StaticPort(pub u16);

#[async_trait]
impl EndpointDiscovery for StaticPort {
    async fn resolve_port(&self) -> Result<u16, String> {
        Ok(self.0)
    }
}
