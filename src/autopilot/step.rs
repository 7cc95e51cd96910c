//! Progress steps and the collaborators a run talks to
//!
//! A run holds four separate collaborators: a [`StepReporter`] for progress,
//! a [`CommandExecutor`] for effects, a [`ConfirmationHandler`] for the risk
//! gate and a [`StopSignal`] polled between iterations.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::session::CommandChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// The model declared the goal met
    Completed,
    /// Forced completion: the attempt limit was reached
    Exhausted,
    /// Stopped by the user
    Aborted,
    /// Model call failed or returned an unusable plan
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    Planning {
        attempt: u32,
        max_attempts: u32,
    },
    Plan {
        attempt: u32,
        thought: String,
        command: Option<String>,
        is_done: bool,
    },
    ConfirmationRequired {
        command: String,
        reason: String,
    },
    Declined {
        command: String,
    },
    Executing {
        command: String,
    },
    Observation {
        command: String,
        output: String,
    },
    /// Report so far; `text` grows with every streamed fragment
    Summary {
        text: String,
    },
    Finished {
        status: AgentStatus,
        attempts: u32,
        summary: String,
    },
}

impl AgentStep {
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::ConfirmationRequired { .. })
    }

    /// Terminal step of a run
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub status: AgentStatus,
    pub attempts: u32,
    pub summary: String,
}

pub trait StepReporter: Send + Sync {
    fn report(&self, step: &AgentStep);
}

impl StepReporter for mpsc::UnboundedSender<AgentStep> {
    fn report(&self, step: &AgentStep) {
        let _ = self.send(step.clone());
    }
}

/// Adapts a closure into a [`StepReporter`]
pub struct ReportFn<F>(pub F);

impl<F> StepReporter for ReportFn<F>
where
    F: Fn(&AgentStep) + Send + Sync,
{
    fn report(&self, step: &AgentStep) {
        (self.0)(step)
    }
}

/// Runs one command and returns its output as text. Implementations never
/// fail: errors come back as text the model can read.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> String;
}

#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, command: &str, reason: &str) -> bool;
}

/// Answers every confirmation with the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

#[async_trait]
impl ConfirmationHandler for FixedConfirmation {
    async fn confirm(&self, _command: &str, _reason: &str) -> bool {
        self.0
    }
}

pub trait StopSignal: Send + Sync {
    fn should_stop(&self) -> bool;
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Executor bound to one session of a [`CommandChannel`]
#[derive(Clone)]
pub struct SessionExecutor {
    channel: CommandChannel,
    session_id: String,
}

impl SessionExecutor {
    pub fn new(channel: CommandChannel, session_id: impl Into<String>) -> Self {
        Self {
            channel,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for SessionExecutor {
    async fn execute(&self, command: &str) -> String {
        self.channel.execute(&self.session_id, command).await.into_text()
    }
}
