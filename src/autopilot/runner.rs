//! Autopilot run loop
//!
//! ```text
//! Planning ──► Completing ─────────────────────────────────► Summarizing ──► Finished
//!    ▲    └──► CommandGate ──► [ConfirmationPending] ──┐
//!    │                                                 ▼
//!    └──────────────── Observing ◄──────────────── Executing
//! ```
//!
//! One planning call, then at most one command, then one observation, per
//! iteration. The stop signal is polled only between iterations. Model
//! failures and unparseable plans end the run at once; every path ends with
//! a `Finished` step carrying readable text.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{info, warn};

use super::history::{truncate_output, AgentHistory};
use super::plan::AgentPlan;
use super::prompts;
use super::risk;
use super::step::{
    AgentOutcome, AgentStatus, AgentStep, CommandExecutor, ConfirmationHandler, FixedConfirmation,
    NeverStop, StepReporter, StopSignal,
};
use crate::config::AgentConfig;
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel};

/// How the planning phase ended
enum Completion {
    Natural(AgentPlan),
    Forced,
}

pub struct AgentRunner {
    model: Arc<dyn LanguageModel>,
    executor: Arc<dyn CommandExecutor>,
    reporter: Arc<dyn StepReporter>,
    confirmation: Arc<dyn ConfirmationHandler>,
    stop: Arc<dyn StopSignal>,
    config: AgentConfig,
    context: Vec<ChatMessage>,
}

impl AgentRunner {
    /// Risky commands are declined unless a confirmation handler is set.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        executor: Arc<dyn CommandExecutor>,
        reporter: Arc<dyn StepReporter>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            executor,
            reporter,
            confirmation: Arc::new(FixedConfirmation(false)),
            stop: Arc::new(NeverStop),
            config,
            context: Vec::new(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_stop_signal(mut self, stop: Arc<dyn StopSignal>) -> Self {
        self.stop = stop;
        self
    }

    /// Prior conversation inserted after the system prompt
    pub fn with_context(mut self, context: Vec<ChatMessage>) -> Self {
        self.context = context;
        self
    }

    pub async fn run(&self, goal: &str) -> AgentOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut history = AgentHistory::new(
            prompts::system_prompt(self.config.safe_mode),
            self.config.max_memory_messages,
        );
        history.extend_context(&self.context);
        history.push(ChatMessage::user(prompts::goal_message(goal)));

        info!("[autopilot] run started: {}", goal);
        let mut attempts = 0u32;

        let completion = loop {
            if self.stop.should_stop() {
                info!("[autopilot] stopped by user after {} attempts", attempts);
                return self.finish(AgentStatus::Aborted, attempts, "Stopped by user.".to_string());
            }

            attempts += 1;
            self.reporter.report(&AgentStep::Planning {
                attempt: attempts,
                max_attempts,
            });

            let plan = match self.request_plan(&history, attempts, max_attempts, goal).await {
                Ok(plan) => plan,
                Err(message) => {
                    warn!("[autopilot] {}", message);
                    return self.finish(AgentStatus::Failed, attempts, message);
                }
            };

            self.reporter.report(&AgentStep::Plan {
                attempt: attempts,
                thought: plan.thought.clone(),
                command: plan.command().map(str::to_string),
                is_done: plan.is_done,
            });

            if plan.is_done {
                break Completion::Natural(plan);
            }
            if attempts >= max_attempts {
                info!("[autopilot] attempt limit {} reached", max_attempts);
                break Completion::Forced;
            }

            let observation = match plan.command() {
                Some(command) => self.act(&plan, command).await,
                None => prompts::missing_command(),
            };

            history.push(ChatMessage::assistant(plan.to_json()));
            history.push(ChatMessage::user(observation));
        };

        self.summarize(goal, &history, completion, attempts, max_attempts)
            .await
    }

    async fn request_plan(
        &self,
        history: &AgentHistory,
        attempt: u32,
        max_attempts: u32,
        goal: &str,
    ) -> Result<AgentPlan, String> {
        let mut messages = history.messages().to_vec();
        messages.push(ChatMessage::user(prompts::attempt_hint(attempt, max_attempts, goal)));

        let request = CompletionRequest::new(messages)
            .json()
            .temperature(self.config.temperature);

        let text = self
            .model
            .complete(request)
            .await
            .map_err(|e| format!("Planning failed: {}", e))?;

        AgentPlan::parse(&text).map_err(|e| format!("Could not understand the model's plan: {}", e))
    }

    /// Command gate, then execution. Returns the observation for the model.
    async fn act(&self, plan: &AgentPlan, command: &str) -> String {
        if self.config.safe_mode {
            let reason = risk::assess(command).or_else(|| {
                (plan.requires_confirmation == Some(true)).then_some("flagged by the model")
            });

            if let Some(reason) = reason {
                self.reporter.report(&AgentStep::ConfirmationRequired {
                    command: command.to_string(),
                    reason: reason.to_string(),
                });

                if !self.confirmation.confirm(command, reason).await {
                    info!("[autopilot] user declined: {}", command);
                    self.reporter.report(&AgentStep::Declined {
                        command: command.to_string(),
                    });
                    return prompts::declined(command);
                }
            }
        }

        self.reporter.report(&AgentStep::Executing {
            command: command.to_string(),
        });
        let output = truncate_output(&self.executor.execute(command).await);
        self.reporter.report(&AgentStep::Observation {
            command: command.to_string(),
            output: output.clone(),
        });

        prompts::observation(command, &output)
    }

    async fn summarize(
        &self,
        goal: &str,
        history: &AgentHistory,
        completion: Completion,
        attempts: u32,
        max_attempts: u32,
    ) -> AgentOutcome {
        let (status, instructions, fallback) = match &completion {
            Completion::Natural(plan) => (
                AgentStatus::Completed,
                prompts::summary_completed(goal, plan.summary.as_deref()),
                prompts::fallback_completed(plan.summary.as_deref()),
            ),
            Completion::Forced => (
                AgentStatus::Exhausted,
                prompts::summary_exhausted(goal, max_attempts),
                prompts::fallback_exhausted(max_attempts),
            ),
        };

        let mut messages = history.messages().to_vec();
        if let Completion::Natural(plan) = &completion {
            messages.push(ChatMessage::assistant(plan.to_json()));
        }
        messages.push(ChatMessage::user(instructions));

        let mut summary = String::new();
        match self
            .model
            .complete_stream(CompletionRequest::new(messages))
            .await
        {
            Ok(mut stream) => {
                while let Some(fragment) = stream.next().await {
                    match fragment {
                        Ok(fragment) => {
                            summary.push_str(&fragment);
                            self.reporter.report(&AgentStep::Summary {
                                text: summary.clone(),
                            });
                        }
                        Err(e) => {
                            warn!("[autopilot] summary stream interrupted: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!("[autopilot] summary request failed: {}", e),
        }

        if summary.trim().is_empty() {
            summary = fallback;
            self.reporter.report(&AgentStep::Summary {
                text: summary.clone(),
            });
        }

        self.finish(status, attempts, summary)
    }

    fn finish(&self, status: AgentStatus, attempts: u32, summary: String) -> AgentOutcome {
        info!("[autopilot] run finished: {:?} after {} attempts", status, attempts);
        self.reporter.report(&AgentStep::Finished {
            status,
            attempts,
            summary: summary.clone(),
        });
        AgentOutcome {
            status,
            attempts,
            summary,
        }
    }
}
