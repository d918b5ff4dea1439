use crate::model::{clock_now, display_code, Notice, ProjectSession, SessionEvent, SessionStatus};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::time::{Duration, Instant};

/// Notices kept for the activity log.
const MAX_NOTICES: usize = 50;

pub struct UiState {
    pub prompt: String,
    pub editing: bool,
    pub show_help: bool,
    /// Last snapshot received from the controller; never mutated locally.
    pub session: ProjectSession,
    pub info: String,
    pub info_is_error: bool,
    pub notices: Vec<(String, String, bool)>, // (time, message, is_error)
    pub code_scroll: u16,
    pub base_url: String,
    pub poll_interval: Duration,
    pub deploy_started: Option<Instant>,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            editing: true,
            show_help: false,
            session: ProjectSession::Idle,
            info: "Describe the app you want, then press Enter".into(),
            info_is_error: false,
            notices: Vec::new(),
            code_scroll: 0,
            base_url: String::new(),
            poll_interval: Duration::from_secs(3),
            deploy_started: None,
            last_exported_path: None,
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

pub fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Idle => Color::Gray,
        SessionStatus::Generating | SessionStatus::Deploying => Color::Yellow,
        SessionStatus::Generated => Color::Cyan,
        SessionStatus::Deployed => Color::Green,
        SessionStatus::Failed => Color::Red,
    }
}

impl UiState {
    /// Fold a controller event into the view state.
    pub fn apply_event(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::StateChanged { session } => {
                let status = session.status();
                match status {
                    SessionStatus::Generating => {
                        self.code_scroll = 0;
                        self.deploy_started = None;
                        self.info = "Generating…".into();
                        self.info_is_error = false;
                    }
                    SessionStatus::Deploying => {
                        self.deploy_started = Some(Instant::now());
                        self.info = "Deploying…".into();
                        self.info_is_error = false;
                    }
                    SessionStatus::Idle => {
                        self.deploy_started = None;
                        self.code_scroll = 0;
                    }
                    _ => {}
                }
                self.session = *session;
            }
            SessionEvent::Notice(notice) => self.push_notice(&notice),
        }
    }

    pub fn push_notice(&mut self, notice: &Notice) {
        let msg = notice.to_message();
        self.info = msg.clone();
        self.info_is_error = notice.is_error();
        self.notices.push((clock_now(), msg, notice.is_error()));
        if self.notices.len() > MAX_NOTICES {
            let _ = self.notices.drain(0..(self.notices.len() - MAX_NOTICES));
        }
    }

    /// Set a local (non-controller) message on the info line.
    pub fn set_info(&mut self, msg: impl Into<String>, is_error: bool) {
        self.info = msg.into();
        self.info_is_error = is_error;
    }

    /// Code as shown in the viewer, fences stripped.
    pub fn display_code(&self) -> String {
        display_code(self.session.generated_code())
    }

    pub fn scroll_code(&mut self, delta: i32) {
        let max = self.display_code().lines().count().saturating_sub(1) as i32;
        let next = (self.code_scroll as i32 + delta).clamp(0, max.max(0));
        self.code_scroll = next as u16;
    }

    pub fn status_lines(&self, width: u16) -> Vec<Line<'static>> {
        let status = self.session.status();
        let mut out = vec![Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(status.to_string(), Style::default().fg(status_color(status))),
        ])];
        if let Some(id) = self.session.id() {
            push_wrapped_status_kv(&mut out, "Project ID", id, width);
        }
        if let Some(url) = self.session.public_url() {
            push_wrapped_status_kv(&mut out, "Public URL", url, width);
        }
        if let Some(sandbox) = self.session.sandbox_id() {
            push_wrapped_status_kv(&mut out, "Sandbox ID", sandbox, width);
        }
        if let Some(err) = self.session.error_message() {
            push_wrapped_status_kv(&mut out, "Error", err, width);
        }
        if let (SessionStatus::Deploying, Some(start)) = (status, self.deploy_started) {
            let secs = start.elapsed().as_secs();
            push_wrapped_status_kv(
                &mut out,
                "Deploying for",
                &format!(
                    "{secs}s (checking every {})",
                    humantime::format_duration(self.poll_interval)
                ),
                width,
            );
        }
        let hint = match status {
            SessionStatus::Idle => "Press e to write a prompt, then Enter to generate",
            SessionStatus::Generating => "Waiting for generated code…",
            SessionStatus::Generated => "Press d to deploy & run",
            SessionStatus::Deploying => "Waiting for the sandbox to come up…",
            SessionStatus::Deployed | SessionStatus::Failed => {
                "Press c to clean up, or g to generate again"
            }
        };
        out.push(Line::from(""));
        out.push(Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(Color::DarkGray),
        )));
        if !self.base_url.is_empty() {
            push_wrapped_status_kv(&mut out, "Service", &self.base_url, width);
        }
        if let Some(path) = self.last_exported_path.as_deref() {
            push_wrapped_status_kv(&mut out, "Saved", path, width);
        }
        out
    }
}
