//! Configuration Management Module
//!
//! Handles loading of the client configuration: backend endpoint defaults,
//! agent loop limits, language-model access and buffer sizes.

pub mod storage;
pub mod types;

pub use storage::{config_dir, config_file, load_config, save_config, ConfigError};
pub use types::{
    AgentConfig, BackendConfig, BufferConfig, ClientConfig, LlmConfig, CONFIG_VERSION,
};
