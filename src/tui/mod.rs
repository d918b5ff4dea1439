mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::model::{ClientConfig, SessionEvent, SessionStatus};
use crate::orchestrator::{self, Controller, UiCommand};
use crate::remote::HttpRemoteClient;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::UiState;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, cfg: ClientConfig) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let remote = Arc::new(HttpRemoteClient::new(&cfg)?);
    let (controller, completions) = Controller::new(remote, cfg.poll_interval, event_tx);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let initial_prompt = args.prompt.clone().unwrap_or_default();
    let ui_handle =
        std::thread::spawn(move || run_threaded(cfg, initial_prompt, event_rx, cmd_tx));

    let res = orchestrator::run_controller(controller, completions, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    cfg: ClientConfig,
    initial_prompt: String,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        prompt: initial_prompt,
        base_url: cfg.base_url.clone(),
        poll_interval: cfg.poll_interval,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) == KeyOutcome::Quit {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn handle_key(
    state: &mut UiState,
    k: KeyEvent,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> KeyOutcome {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }

    if state.show_help {
        state.show_help = false;
        return KeyOutcome::Continue;
    }

    if state.editing {
        match k.code {
            KeyCode::Enter => {
                state.editing = false;
                let _ = cmd_tx.send(UiCommand::Generate(state.prompt.clone()));
            }
            KeyCode::Esc => state.editing = false,
            KeyCode::Backspace => {
                state.prompt.pop();
            }
            KeyCode::Char(c) => state.prompt.push(c),
            _ => {}
        }
        return KeyOutcome::Continue;
    }

    match k.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Char('e') | KeyCode::Char('i') => state.editing = true,
        KeyCode::Char('g') => {
            let _ = cmd_tx.send(UiCommand::Generate(state.prompt.clone()));
        }
        KeyCode::Char('d') => {
            let _ = cmd_tx.send(UiCommand::Deploy);
        }
        KeyCode::Char('c') => {
            let _ = cmd_tx.send(UiCommand::Cleanup);
        }
        KeyCode::Char('y') => export::copy_code(state),
        KeyCode::Char('s') => export::save_and_show_path(state),
        KeyCode::Char('?') => state.show_help = true,
        KeyCode::Up | KeyCode::Char('k') => state.scroll_code(-1),
        KeyCode::Down | KeyCode::Char('j') => state.scroll_code(1),
        KeyCode::PageUp => state.scroll_code(-10),
        KeyCode::PageDown => state.scroll_code(10),
        _ => {}
    }
    KeyOutcome::Continue
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Prompt
                Constraint::Min(0),    // Session + code
                Constraint::Length(3), // Info line
            ]
            .as_ref(),
        )
        .split(area);

    draw_prompt(main[0], f, state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)].as_ref())
        .split(main[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(body[0]);

    let status = Paragraph::new(state.status_lines(left[0].width))
        .block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(status, left[0]);

    draw_notices(left[1], f, state);
    draw_code(body[1], f, state);

    let info_style = if state.info_is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let info = Paragraph::new(Line::from(vec![
        Span::styled("Info: ", Style::default().fg(Color::Gray)),
        Span::styled(state.info.clone(), info_style),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("q quit | e edit | g generate | d deploy | c cleanup | ? help"),
    );
    f.render_widget(info, main[2]);

    if state.show_help {
        draw_help_overlay(area, f);
    }
}

fn draw_prompt(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (title, border) = if state.editing {
        ("Prompt (Enter to generate, Esc to stop editing)", Color::Yellow)
    } else {
        ("Prompt (e to edit)", Color::Gray)
    };
    let mut spans = vec![Span::raw(state.prompt.clone())];
    if state.editing {
        spans.push(Span::styled(
            "_",
            Style::default().add_modifier(Modifier::SLOW_BLINK),
        ));
    }
    let p = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title),
    );
    f.render_widget(p, area);
}

fn draw_notices(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = state.notices.len().saturating_sub(visible);
    let lines: Vec<Line> = state.notices[start..]
        .iter()
        .map(|(at, msg, is_error)| {
            let style = if *is_error {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{at} "), Style::default().fg(Color::DarkGray)),
                Span::styled(msg.clone(), style),
            ])
        })
        .collect();
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Activity"));
    f.render_widget(p, area);
}

fn draw_code(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let code = state.display_code();
    let body: Vec<Line> = if code.is_empty() {
        let placeholder = if state.session.status() == SessionStatus::Generating {
            "Generating…"
        } else {
            "No code generated yet."
        };
        vec![Line::from(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        code.lines().map(|l| Line::from(l.to_string())).collect()
    };
    let title = if code.is_empty() {
        "Code".to_string()
    } else {
        format!(
            "Code ({} lines, y copy, s save, j/k scroll)",
            code.lines().count()
        )
    };
    let p = Paragraph::new(body)
        .scroll((state.code_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_help_overlay(area: Rect, f: &mut ratatui::Frame) {
    let w = area.width.min(56);
    let h = area.height.min(18);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    };
    help::draw_help(popup, f);
}
