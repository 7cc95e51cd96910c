//! Prompt text sent to the model

pub fn system_prompt(safe_mode: bool) -> String {
    let mut prompt = String::from(
        "You are an autonomous Linux operations agent working in a remote shell.\n\
         Reach the user's goal by running one shell command at a time and reading its output.\n\
         \n\
         Reply with exactly one JSON object and nothing else:\n\
         {\n\
         \x20 \"thought\": \"short reasoning about the next step\",\n\
         \x20 \"command\": \"the single shell command to run next, or null\",\n\
         \x20 \"isDone\": false,\n\
         \x20 \"summary\": \"what was achieved, only when isDone is true\",\n\
         \x20 \"requiresConfirmation\": false\n\
         }\n\
         \n\
         Rules:\n\
         - Run non-interactive commands only (no editors, pagers or prompts).\n\
         - Limit output size yourself (head, tail, grep).\n\
         - Set isDone to true as soon as the goal is met or cannot be met.\n",
    );
    if safe_mode {
        prompt.push_str(
            "- Safe mode is on: set requiresConfirmation to true for anything destructive \
             or hard to undo; the user will be asked first.\n",
        );
    }
    prompt
}

pub fn goal_message(goal: &str) -> String {
    format!("Goal: {}", goal.trim())
}

/// Transient reminder sent with every planning call
pub fn attempt_hint(attempt: u32, max_attempts: u32, goal: &str) -> String {
    let mut hint = format!("Attempt {} of {}. Goal: {}", attempt, max_attempts, goal.trim());
    if attempt == max_attempts {
        hint.push_str("\nThis is the last attempt: wrap up and set isDone to true.");
    }
    hint
}

pub fn observation(command: &str, output: &str) -> String {
    format!("Command: {}\nOutput:\n{}", command, output)
}

pub fn missing_command() -> String {
    "No command was provided. Either give a command to run or set isDone to true.".to_string()
}

pub fn declined(command: &str) -> String {
    format!(
        "The user declined to run `{}`. Do not run it again. Look for a safer \
         alternative, or finish and explain what still needs manual action.",
        command
    )
}

pub fn summary_completed(goal: &str, model_summary: Option<&str>) -> String {
    let mut prompt = format!(
        "The task is complete. Write a concise Markdown report for the goal \"{}\":\n\
         - what was done (commands and key findings)\n\
         - the final state of the system\n\
         - any follow-up the user should consider\n",
        goal.trim()
    );
    if let Some(summary) = model_summary.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("\nYour own closing note was: {}\n", summary));
    }
    prompt.push_str("\nReply in Markdown only, no JSON.");
    prompt
}

pub fn summary_exhausted(goal: &str, max_attempts: u32) -> String {
    format!(
        "The attempt limit ({}) was reached before the goal \"{}\" was met. \
         Write a Markdown report that states clearly that the task was NOT fully achieved, \
         lists what was done and found, explains the likely causes (failing commands, \
         missing permissions, wrong assumptions), and suggests next steps.\n\n\
         Reply in Markdown only, no JSON.",
        max_attempts,
        goal.trim()
    )
}

pub fn fallback_completed(model_summary: Option<&str>) -> String {
    model_summary
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Task completed. No report could be generated.".to_string())
}

pub fn fallback_exhausted(max_attempts: u32) -> String {
    format!(
        "The task was not fully achieved within {} attempts. No report could be generated.",
        max_attempts
    )
}
