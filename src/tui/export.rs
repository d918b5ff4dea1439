use crate::model::ProjectSession;
use anyhow::{Context, Result};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// File name for saved code, derived from the project id.
pub fn code_file_name(session: &ProjectSession) -> Option<String> {
    let id = session.id()?;
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    Some(format!("sandbox-{safe}.jsx"))
}

/// Save the generated code into the current directory.
/// Returns the absolute path of the written file.
pub fn save_code_to_cwd(session: &ProjectSession) -> Result<std::path::PathBuf> {
    let name = code_file_name(session).context("no generated code to save")?;
    let current_dir = std::env::current_dir().context("get current directory")?;
    let path = current_dir.join(name);
    crate::cli::export_code(&path, session.generated_code())?;
    Ok(path)
}

/// Save code and update state.info with the saved path message.
pub fn save_and_show_path(state: &mut UiState) {
    match save_code_to_cwd(&state.session) {
        Ok(path) => {
            let shown = path.display().to_string();
            state.set_info(format!("Saved: {shown}"), false);
            state.last_exported_path = Some(shown);
        }
        Err(e) => state.set_info(format!("Save failed: {e:#}"), true),
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// Clipboard instances are kept alive for a while so clipboard managers on
/// Linux get a chance to read the contents.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

/// Copy the session's code and report on the info line.
pub fn copy_code(state: &mut UiState) {
    let code = state.display_code();
    if code.is_empty() {
        state.set_info("No code to copy", true);
        return;
    }
    match copy_to_clipboard(&code) {
        Ok(()) => state.set_info("Code copied to clipboard!", false),
        Err(e) => state.set_info(format!("Copy failed: {e:#}"), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;

    #[test]
    fn file_name_sanitizes_project_id() {
        let s = ProjectSession::Generated {
            project: Project {
                id: "ab/c:1".into(),
                prompt: "x".into(),
                generated_code: "code".into(),
            },
        };
        assert_eq!(code_file_name(&s).as_deref(), Some("sandbox-ab_c_1.jsx"));
        assert!(code_file_name(&ProjectSession::Idle).is_none());
    }

    #[test]
    fn copy_without_code_reports_error() {
        let mut state = UiState::default();
        copy_code(&mut state);
        assert!(state.info_is_error);
    }
}
