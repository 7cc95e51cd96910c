//! Search across session buffers

pub mod coordinator;
pub mod surface;

pub use coordinator::{SearchCoordinator, SearchOutcome, FOCUS_HANDOFF_DELAY};
pub use surface::{
    BufferSurface, FindOptions, RegistryWorkspace, SearchDirection, SessionWorkspace,
    TerminalSurface,
};
