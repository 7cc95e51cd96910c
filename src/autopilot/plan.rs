//! Plan produced by the model on every iteration

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlan {
    #[serde(default)]
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("model returned an empty plan")]
    Empty,

    #[error("plan is not valid JSON: {0}")]
    Invalid(String),
}

impl AgentPlan {
    /// Strict JSON parse. A surrounding Markdown code fence is tolerated;
    /// anything else that is not a plan object is an error.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        let body = strip_code_fence(text.trim());
        if body.is_empty() {
            return Err(PlanError::Empty);
        }
        serde_json::from_str(body).map_err(|e| PlanError::Invalid(e.to_string()))
    }

    /// Command to run, if the plan carries a non-blank one
    pub fn command(&self) -> Option<&str> {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.thought.clone())
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
