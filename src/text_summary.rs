//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines describing a session for text mode.

use crate::model::{display_code, ProjectSession};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of `session`, optionally followed by its code.
pub(crate) fn build_text_summary(session: &ProjectSession, show_code: bool) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Status: {}", session.status()));
    if let Some(prompt) = session.prompt() {
        lines.push(format!("Prompt: {}", prompt.trim()));
    }
    if let Some(id) = session.id() {
        lines.push(format!("Project ID: {id}"));
    }
    if let Some(url) = session.public_url() {
        lines.push(format!("Public URL: {url}"));
    }
    if let Some(sandbox) = session.sandbox_id() {
        lines.push(format!("Sandbox ID: {sandbox}"));
    }
    if let Some(err) = session.error_message() {
        lines.push(format!("Error: {err}"));
    }

    let code = session.generated_code();
    if !code.is_empty() {
        let shown = display_code(code);
        lines.push(format!("Generated code: {} lines", shown.lines().count()));
        if show_code {
            lines.push(String::new());
            lines.extend(shown.lines().map(str::to_string));
        }
    }

    TextSummary { lines }
}
