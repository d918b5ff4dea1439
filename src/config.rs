//! Client configuration: command-line flags layered over an optional JSON file.

use crate::model::ClientConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://backend-ai-coding-env-production.onrender.com";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
// Generation can take a while on the service side.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Optional overrides read from `config.json`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Values supplied on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub poll_interval: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

/// Default config file location (`<config dir>/sandbox-deploy-cli/config.json`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sandbox-deploy-cli").join("config.json"))
}

/// Load the config file. An explicit path must exist; the default one may not.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(FileConfig::default()),
        },
    };
    if !required && !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
}

/// Merge command-line values over file values over built-in defaults.
pub fn resolve(cli: CliOverrides, file: FileConfig) -> Result<ClientConfig> {
    let base_url = cli
        .base_url
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        anyhow::bail!("base URL must not be empty");
    }

    let poll_interval = cli
        .poll_interval
        .or(file.poll_interval)
        .unwrap_or(DEFAULT_POLL_INTERVAL);
    if poll_interval.is_zero() {
        anyhow::bail!("poll interval must be greater than zero");
    }

    let request_timeout = cli
        .request_timeout
        .or(file.request_timeout)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    Ok(ClientConfig {
        base_url,
        poll_interval,
        request_timeout,
        user_agent: format!("sandbox-deploy-cli/{}", env!("CARGO_PKG_VERSION")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = resolve(CliOverrides::default(), FileConfig::default()).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(cfg.user_agent.starts_with("sandbox-deploy-cli/"));
    }

    #[test]
    fn cli_wins_over_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{"base_url":"http://file.example","poll_interval":"5s","request_timeout":"30s"}"#,
        )
        .unwrap();
        let cli = CliOverrides {
            base_url: Some("http://cli.example/".into()),
            poll_interval: None,
            request_timeout: Some(Duration::from_secs(10)),
        };
        let cfg = resolve(cli, file).unwrap();
        assert_eq!(cfg.base_url, "http://cli.example");
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cli = CliOverrides {
            poll_interval: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(resolve(cli, FileConfig::default()).is_err());
    }

    #[test]
    fn unknown_file_fields_are_rejected() {
        let r: Result<FileConfig, _> = serde_json::from_str(r#"{"base_ur":"x"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let p = std::env::temp_dir().join("sandbox-deploy-cli-missing-config.json");
        let _ = std::fs::remove_file(&p);
        assert!(load_file_config(Some(&p)).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let p = std::env::temp_dir().join(format!(
            "sandbox-deploy-cli-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&p, r#"{"poll_interval":"1s"}"#).unwrap();
        let file = load_file_config(Some(&p)).unwrap();
        let _ = std::fs::remove_file(&p);
        assert_eq!(file.poll_interval, Some(Duration::from_secs(1)));
        assert!(file.base_url.is_none());
    }
}
