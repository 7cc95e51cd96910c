//! Session management
//!
//! Logical remote shells multiplexed over the shared transport link.

pub mod events;
pub mod exec;
pub mod listeners;
pub mod log;
pub mod registry;
pub mod scroll_buffer;
pub mod search;
pub mod state;

pub use events::{DataEvent, StatusEvent};
pub use exec::{normalize_output, CommandChannel, CommandOutcome, LINE_ENDING};
pub use listeners::{ListenerSet, Subscription};
pub use log::{LogEntry, LogType};
pub use registry::{AuthMethod, SessionConfig, SessionEntry, SessionRegistry};
pub use scroll_buffer::{BufferStats, ScrollBuffer, TerminalLine};
pub use search::{find_matches, search_lines, SearchMatch, SearchOptions, SearchResult};
pub use state::{SessionState, SessionStatus, UnknownStatus};
