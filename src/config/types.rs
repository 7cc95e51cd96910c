//! Configuration Types
//!
//! Data structures for the client configuration file. Every field has a
//! default so a partial (or missing) file still yields a usable config.

use serde::{Deserialize, Serialize};

/// Current configuration version
pub const CONFIG_VERSION: u32 = 1;

/// Backend execution service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Host the backend listens on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port used until endpoint discovery resolves (or when it times out)
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// WebSocket path on the backend
    #[serde(default = "default_path")]
    pub path: String,

    /// Timeout for establishing the physical connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for a correlated exec round trip
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,

    /// Upper bound on endpoint discovery before falling back to `default_port`
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    /// Capacity of the outbound frame queue
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_exec_timeout() -> u64 {
    60
}

fn default_discovery_timeout() -> u64 {
    10
}

fn default_outbound_queue() -> usize {
    256
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            default_port: default_port(),
            path: default_path(),
            connect_timeout_secs: default_connect_timeout(),
            exec_timeout_secs: default_exec_timeout(),
            discovery_timeout_secs: default_discovery_timeout(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// Autonomous agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of planning calls per run
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sampling temperature for planning calls
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Gate risky commands behind user confirmation
    #[serde(default = "default_safe_mode")]
    pub safe_mode: bool,

    /// History keeps at most `2 * max_memory_messages` exchanges plus the system prompt
    #[serde(default = "default_max_memory_messages")]
    pub max_memory_messages: usize,
}

fn default_max_attempts() -> u32 {
    15
}

fn default_temperature() -> f32 {
    0.2
}

fn default_safe_mode() -> bool {
    true
}

fn default_max_memory_messages() -> usize {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            temperature: default_temperature(),
            safe_mode: default_safe_mode(),
            max_memory_messages: default_max_memory_messages(),
        }
    }
}

/// Language-model backend settings (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; `TERMPILOT_API_KEY` takes precedence when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Per-session buffering limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum lines kept in a session's scroll buffer
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Maximum log entries kept per session
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

fn default_max_lines() -> usize {
    10_000
}

fn default_max_log_entries() -> usize {
    1_000
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            max_log_entries: default_max_log_entries(),
        }
    }
}

/// Root configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub buffer: BufferConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendConfig::default(),
            agent: AgentConfig::default(),
            llm: LlmConfig::default(),
            buffer: BufferConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Check values that would make the client unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.agent.max_attempts == 0 {
            return Err("agent.max_attempts must be at least 1".to_string());
        }
        if self.agent.max_memory_messages == 0 {
            return Err("agent.max_memory_messages must be at least 1".to_string());
        }
        if self.backend.outbound_queue == 0 {
            return Err("backend.outbound_queue must be at least 1".to_string());
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(format!(
                "agent.temperature must be within 0.0..=2.0 (got {})",
                self.agent.temperature
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"agent": {"max_attempts": 3}}"#).unwrap();

        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.agent.max_attempts, 3);
        assert_eq!(config.agent.max_memory_messages, 10);
        assert!(config.agent.safe_mode);
        assert_eq!(config.backend.default_port, 3001);
        assert_eq!(config.backend.discovery_timeout_secs, 10);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.agent.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
