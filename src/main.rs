mod cli;
mod config;
mod error;
mod model;
mod orchestrator;
mod remote;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(&args)?;
    let is_headless = args.is_headless();

    cli::run(args).await?;
    // Explicitly exit with code 0 on success for non-TUI modes
    if is_headless {
        std::process::exit(0);
    }
    Ok(())
}

/// Logs go to `--log-file` when given, to stderr in headless modes, and nowhere
/// in the TUI (stderr would corrupt the screen).
fn init_tracing(args: &cli::Cli) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "sandbox_deploy_cli=warn".into());

    if let Some(path) = args.log_file.as_deref() {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .with(filter)
            .init();
    } else if args.is_headless() {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
    Ok(())
}
