//! termpilot
//!
//! Remote shell sessions multiplexed over one link to a backend execution
//! service, with cross-session search and an autopilot that drives a session
//! toward a goal through a language model.

pub mod autopilot;
pub mod config;
pub mod llm;
pub mod search;
pub mod session;
pub mod transport;
