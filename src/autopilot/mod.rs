//! Autopilot: bounded plan-act-observe loop driven by a language model
//!
//! The model proposes one shell command per iteration; risky commands pass
//! through a confirmation gate in safe mode; output is fed back until the
//! model declares the goal met or the attempt limit is reached. The run ends
//! with a streamed Markdown report.

pub mod history;
pub mod plan;
pub mod prompts;
pub mod risk;
pub mod runner;
pub mod step;

pub use history::{truncate_output, AgentHistory, MAX_CONTEXT_CHARS, MAX_OUTPUT_CHARS, TRUNCATION_MARKER};
pub use plan::{AgentPlan, PlanError};
pub use runner::AgentRunner;
pub use step::{
    AgentOutcome, AgentStatus, AgentStep, CommandExecutor, ConfirmationHandler, FixedConfirmation,
    NeverStop, ReportFn, SessionExecutor, StepReporter, StopSignal,
};
