use crate::config::{self, CliOverrides};
use crate::error::SessionError;
use crate::model::{
    clock_now, display_code, ClientConfig, Notice, ProjectSession, SessionEvent, SessionStatus,
};
use crate::orchestrator::{run_controller, Controller, UiCommand};
use crate::remote::{HttpRemoteClient, RemoteService};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "sandbox-deploy-cli",
    version,
    about = "Generate code from a prompt and deploy it to a live sandbox"
)]
pub struct Cli {
    /// Base URL of the generation/deployment service
    #[arg(long)]
    pub base_url: Option<String>,

    /// Interval between deployment status checks (default 3s)
    #[arg(long)]
    pub poll_interval: Option<humantime::Duration>,

    /// Timeout for a single request to the service (default 120s)
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Path to a JSON config file (defaults to the user config directory)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Describe the app to generate (required with --text/--json)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Print the final session as JSON and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Stop after code generation
    #[arg(long)]
    pub no_deploy: bool,

    /// Clean up the project once the deployment finishes
    #[arg(long)]
    pub cleanup: bool,

    /// Include the generated code in the text summary
    #[arg(long)]
    pub show_code: bool,

    /// Write the generated code to this file
    #[arg(long)]
    pub export_code: Option<std::path::PathBuf>,

    /// Append logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
}

impl Cli {
    /// Whether this invocation runs without the TUI.
    pub fn is_headless(&self) -> bool {
        self.json || self.text || cfg!(not(feature = "tui"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, cfg).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args, cfg, OutputMode::Text).await;
        }
    }

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    run_headless(args, cfg, mode).await
}

/// Build a `ClientConfig` from CLI arguments and the config file.
pub fn build_config(args: &Cli) -> Result<ClientConfig> {
    let file = config::load_file_config(args.config.as_deref())?;
    config::resolve(
        CliOverrides {
            base_url: args.base_url.clone(),
            poll_interval: args.poll_interval.map(Duration::from),
            request_timeout: args.request_timeout.map(Duration::from),
        },
        file,
    )
}

/// Write generated code (fences stripped) to `path`.
pub(crate) fn export_code(path: &Path, code: &str) -> Result<()> {
    let mut body = display_code(code);
    body.push('\n');
    std::fs::write(path, body).with_context(|| format!("write code to {}", path.display()))
}

/// Run generate → deploy → wait for a terminal status without a TUI.
async fn run_headless(args: Cli, cfg: ClientConfig, mode: OutputMode) -> Result<()> {
    let prompt = args
        .prompt
        .clone()
        .filter(|p| !p.trim().is_empty())
        .context("--prompt is required with --text or --json")?;

    let remote = Arc::new(HttpRemoteClient::new(&cfg)?);
    let (out_tx, out_handle) = spawn_output_writer();

    let run = drive_headless(
        &args,
        prompt,
        remote,
        cfg.poll_interval,
        tokio::signal::ctrl_c(),
        &out_tx,
    )
    .await?;

    for line in render_final(&run.final_session, mode, args.show_code)? {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    drop(out_tx);
    let _ = out_handle.await;

    run.into_result()
}

/// What a headless run ended with.
#[derive(Debug)]
struct HeadlessRun {
    /// Last non-idle session observed.
    final_session: ProjectSession,
    last_error: Option<String>,
    failed: bool,
    interrupted: bool,
}

impl HeadlessRun {
    fn into_result(self) -> Result<()> {
        if self.interrupted {
            anyhow::bail!("interrupted");
        }
        if self.failed {
            let msg = self
                .final_session
                .error_message()
                .map(|m| SessionError::DeploymentFailure(m.to_string()).to_string())
                .or(self.last_error)
                .unwrap_or_else(|| "run failed".into());
            anyhow::bail!(msg);
        }
        Ok(())
    }
}

/// Final stdout lines for the chosen output mode.
fn render_final(
    session: &ProjectSession,
    mode: OutputMode,
    show_code: bool,
) -> Result<Vec<String>> {
    Ok(match mode {
        OutputMode::Json => vec![serde_json::to_string_pretty(session)?],
        OutputMode::Text => crate::text_summary::build_text_summary(session, show_code).lines,
    })
}

/// Drive one session through the controller until it settles, reacting to
/// state changes the way the flags ask. `interrupt` resolving cleans up and
/// stops the run.
async fn drive_headless<R, F>(
    args: &Cli,
    prompt: String,
    remote: Arc<R>,
    poll_interval: Duration,
    interrupt: F,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<HeadlessRun>
where
    R: RemoteService + ?Sized,
    F: std::future::Future,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (controller, completions) = Controller::new(remote, poll_interval, event_tx);
    let ctl_handle = tokio::spawn(run_controller(controller, completions, cmd_rx));

    let _ = cmd_tx.send(UiCommand::Generate(prompt));

    let mut run = HeadlessRun {
        final_session: ProjectSession::Idle,
        last_error: None,
        failed: false,
        interrupted: false,
    };
    let mut last_status = SessionStatus::Idle;
    let mut quitting = false;
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            ev = event_rx.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    SessionEvent::Notice(notice) => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "[{}] {}",
                            clock_now(),
                            notice.to_message()
                        )));
                        if let Notice::Error(e) = &notice {
                            run.last_error = Some(e.to_string());
                            let rejected = matches!(
                                e,
                                SessionError::Validation(_) | SessionError::InvalidState { .. }
                            );
                            if rejected && !quitting {
                                run.failed = true;
                                quitting = true;
                                let _ = cmd_tx.send(UiCommand::Quit);
                            }
                        }
                    }
                    SessionEvent::StateChanged { session } => {
                        let status = session.status();
                        match status {
                            SessionStatus::Generated if !quitting => {
                                if let Some(path) = args.export_code.as_deref() {
                                    let msg = match export_code(path, session.generated_code()) {
                                        Ok(()) => format!("Saved code: {}", path.display()),
                                        Err(e) => format!("Export code failed: {e:#}"),
                                    };
                                    let _ = out_tx.send(OutputLine::Stderr(msg));
                                }
                                if args.no_deploy {
                                    quitting = true;
                                    let _ = cmd_tx.send(UiCommand::Quit);
                                } else {
                                    let _ = cmd_tx.send(UiCommand::Deploy);
                                }
                            }
                            _ if session.is_terminal() && !quitting => {
                                run.failed = status == SessionStatus::Failed;
                                quitting = true;
                                if args.cleanup {
                                    let _ = cmd_tx.send(UiCommand::Cleanup);
                                }
                                let _ = cmd_tx.send(UiCommand::Quit);
                            }
                            SessionStatus::Idle
                                if !quitting
                                    && matches!(
                                        last_status,
                                        SessionStatus::Generating | SessionStatus::Deploying
                                    ) =>
                            {
                                // Generation or deploy request failed; the error notice follows.
                                run.failed = true;
                                quitting = true;
                                let _ = cmd_tx.send(UiCommand::Quit);
                            }
                            _ => {}
                        }
                        if status != SessionStatus::Idle {
                            run.final_session = *session;
                        }
                        last_status = status;
                    }
                }
            }
            _ = &mut interrupt, if !quitting => {
                run.interrupted = true;
                quitting = true;
                let _ = out_tx.send(OutputLine::Stderr("Interrupted, cleaning up…".into()));
                let _ = cmd_tx.send(UiCommand::Cleanup);
                let _ = cmd_tx.send(UiCommand::Quit);
            }
        }
    }

    ctl_handle.await.context("controller task failed")??;
    Ok(run)
}
