use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Coarse status of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Generating,
    Generated,
    Deploying,
    Deployed,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Generating => "generating",
            SessionStatus::Generated => "generated",
            SessionStatus::Deploying => "deploying",
            SessionStatus::Deployed => "deployed",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Logical identity of a session.
///
/// The project id comes from the remote service; the epoch is bumped locally on
/// every reset so that a regenerated project with a recycled id is still a new
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub epoch: u64,
    pub project_id: String,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.project_id, self.epoch)
    }
}

/// A project whose code has been generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub prompt: String,
    pub generated_code: String,
}

/// The single project session owned by the controller.
///
/// Each variant carries exactly the fields that are meaningful in that status,
/// so a deployed session without a URL or a failed session without a message
/// cannot be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectSession {
    #[default]
    Idle,
    Generating {
        prompt: String,
    },
    Generated {
        project: Project,
    },
    Deploying {
        project: Project,
    },
    Deployed {
        project: Project,
        public_url: String,
        sandbox_id: Option<String>,
    },
    Failed {
        project: Project,
        error_message: String,
    },
}

impl ProjectSession {
    pub fn status(&self) -> SessionStatus {
        match self {
            ProjectSession::Idle => SessionStatus::Idle,
            ProjectSession::Generating { .. } => SessionStatus::Generating,
            ProjectSession::Generated { .. } => SessionStatus::Generated,
            ProjectSession::Deploying { .. } => SessionStatus::Deploying,
            ProjectSession::Deployed { .. } => SessionStatus::Deployed,
            ProjectSession::Failed { .. } => SessionStatus::Failed,
        }
    }

    pub fn project(&self) -> Option<&Project> {
        match self {
            ProjectSession::Idle | ProjectSession::Generating { .. } => None,
            ProjectSession::Generated { project }
            | ProjectSession::Deploying { project }
            | ProjectSession::Deployed { project, .. }
            | ProjectSession::Failed { project, .. } => Some(project),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.project().map(|p| p.id.as_str())
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            ProjectSession::Generating { prompt } => Some(prompt),
            other => other.project().map(|p| p.prompt.as_str()),
        }
    }

    /// Generated source, empty until generation has succeeded.
    pub fn generated_code(&self) -> &str {
        self.project()
            .map(|p| p.generated_code.as_str())
            .unwrap_or("")
    }

    pub fn public_url(&self) -> Option<&str> {
        match self {
            ProjectSession::Deployed { public_url, .. } => Some(public_url),
            _ => None,
        }
    }

    pub fn sandbox_id(&self) -> Option<&str> {
        match self {
            ProjectSession::Deployed { sandbox_id, .. } => sandbox_id.as_deref(),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ProjectSession::Failed { error_message, .. } => Some(error_message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProjectSession::Deployed { .. } | ProjectSession::Failed { .. }
        )
    }
}

/// Remote view of a deployment, as reported by the deploy and status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Deploying,
    Deployed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Deployed | DeploymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateResponse {
    pub project_id: String,
    pub generated_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployRequest<'a> {
    pub project_id: &'a str,
    pub generated_code: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployResponse {
    #[serde(default)]
    pub project_id: Option<String>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub sandbox_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub project_id: Option<String>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub sandbox_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Error body returned by the service on non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
}

/// Remote operation a notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Generate,
    Deploy,
    Cleanup,
}

impl Operation {
    /// User-facing message used when the service gives no detail.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Generate => "Failed to generate code",
            Operation::Deploy => "Failed to deploy code",
            Operation::Cleanup => "Failed to cleanup project",
        }
    }
}

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { session: Box<ProjectSession> },
    Notice(Notice),
}

/// User-visible notifications.
#[derive(Debug, Clone)]
pub enum Notice {
    CodeGenerated { project_id: String },
    DeployStarted { project_id: String },
    Deployed { public_url: String },
    CleanedUp { project_id: String },
    Error(SessionError),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }

    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            Notice::CodeGenerated { .. } => "Code generated successfully!".to_string(),
            Notice::DeployStarted { project_id } => {
                format!("Deployment started for project {}", project_id)
            }
            Notice::Deployed { public_url } => {
                format!("Code deployed successfully! Live at {}", public_url)
            }
            Notice::CleanedUp { .. } => "Project cleaned up successfully!".to_string(),
            Notice::Error(e) => e.to_string(),
        }
    }
}

/// Strip markdown code fences and surrounding whitespace for display.
pub fn display_code(code: &str) -> String {
    code.replace("```", "").trim().to_string()
}

/// Local wall-clock time formatted as `HH:MM:SS`.
pub fn clock_now() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into())
}
