//! Session lifecycle controller.
//!
//! Owns the single project session, drives the remote service, starts and stops
//! the status poller, and emits events for presentation layers. Remote calls run
//! on spawned tasks and report back as [`Completion`]s, which are applied on the
//! controller's own task only if they still belong to the current session.

use super::poller::{PollResult, StatusPoller};
use crate::error::{RemoteError, SessionError, DEPLOYMENT_FAILED};
use crate::model::{
    DeployResponse, DeploymentStatus, GenerateResponse, Notice, Operation, Project,
    ProjectSession, SessionEvent, SessionKey, SessionStatus,
};
use crate::remote::RemoteService;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Commands emitted by UI layers to drive the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Generate(String),
    Deploy,
    Cleanup,
    Quit,
}

/// Outcome of a spawned remote call or poller, delivered back to the controller.
#[derive(Debug)]
pub(crate) enum Completion {
    Generated {
        epoch: u64,
        result: Result<GenerateResponse, RemoteError>,
    },
    DeployRequested {
        key: SessionKey,
        result: Result<DeployResponse, RemoteError>,
    },
    Status(PollResult),
    Deleted {
        project_id: String,
        result: Result<(), RemoteError>,
    },
}

pub(crate) struct Controller<R: RemoteService + ?Sized> {
    remote: Arc<R>,
    session: ProjectSession,
    // Bumped on every reset; part of the session key.
    epoch: u64,
    poller: Option<StatusPoller>,
    poll_interval: Duration,
    pending_deletes: usize,
    completion_tx: UnboundedSender<Completion>,
    event_tx: UnboundedSender<SessionEvent>,
}

impl<R: RemoteService + ?Sized> Controller<R> {
    pub fn new(
        remote: Arc<R>,
        poll_interval: Duration,
        event_tx: UnboundedSender<SessionEvent>,
    ) -> (Self, UnboundedReceiver<Completion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let controller = Self {
            remote,
            session: ProjectSession::Idle,
            epoch: 0,
            poller: None,
            poll_interval,
            pending_deletes: 0,
            completion_tx,
            event_tx,
        };
        (controller, completion_rx)
    }

    pub fn session(&self) -> &ProjectSession {
        &self.session
    }

    pub fn active_poller(&self) -> Option<&SessionKey> {
        self.poller.as_ref().map(|p| p.key())
    }

    pub fn pending_deletes(&self) -> usize {
        self.pending_deletes
    }

    fn current_key(&self) -> Option<SessionKey> {
        self.session.id().map(|id| SessionKey {
            epoch: self.epoch,
            project_id: id.to_string(),
        })
    }

    /// Start a fresh session for `prompt`, discarding whatever came before.
    pub fn generate(&mut self, prompt: impl Into<String>) -> Result<(), SessionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(SessionError::Validation("Please enter a prompt".into()));
        }

        self.reset();
        self.set_session(ProjectSession::Generating {
            prompt: prompt.clone(),
        });

        let epoch = self.epoch;
        let remote = self.remote.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = remote.generate(&prompt).await;
            let _ = tx.send(Completion::Generated { epoch, result });
        });
        Ok(())
    }

    /// Request deployment of the generated code and start polling its status.
    pub fn deploy(&mut self) -> Result<(), SessionError> {
        let project = match &self.session {
            ProjectSession::Generated { project } => project.clone(),
            other => {
                return Err(SessionError::InvalidState {
                    operation: "deploy",
                    state: other.status(),
                })
            }
        };
        let key = SessionKey {
            epoch: self.epoch,
            project_id: project.id.clone(),
        };

        self.set_session(ProjectSession::Deploying {
            project: project.clone(),
        });

        // Polling starts before the deploy response so a slow response can't
        // leave the session without a poller.
        self.stop_poller();
        self.poller = Some(StatusPoller::start(
            self.remote.clone(),
            key.clone(),
            self.poll_interval,
            self.completion_tx.clone(),
            Completion::Status,
        ));

        let remote = self.remote.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = remote
                .deploy(&project.id, &project.generated_code)
                .await;
            let _ = tx.send(Completion::DeployRequested { key, result });
        });

        self.notify(Notice::DeployStarted {
            project_id: self.session.id().unwrap_or_default().to_string(),
        });
        Ok(())
    }

    /// Tear down the current project. Returns false when there was nothing to
    /// clean up.
    pub fn cleanup(&mut self) -> bool {
        let Some(project_id) = self.session.id().map(str::to_string) else {
            debug!(status = %self.session.status(), "cleanup with no project, ignoring");
            return false;
        };

        self.stop_poller();

        self.pending_deletes += 1;
        let remote = self.remote.clone();
        let tx = self.completion_tx.clone();
        let id = project_id.clone();
        tokio::spawn(async move {
            let result = remote.delete(&id).await;
            let _ = tx.send(Completion::Deleted {
                project_id: id,
                result,
            });
        });

        // The local reset never waits on the remote delete.
        self.reset();
        self.set_session(ProjectSession::Idle);
        info!(%project_id, "project cleaned up locally");
        true
    }

    /// Stop background polling without touching the remote service.
    pub fn shutdown(&mut self) {
        self.stop_poller();
    }

    /// Surface a command error to presentation layers.
    pub fn report(&self, err: SessionError) {
        self.notify(Notice::Error(err));
    }

    /// Apply a completion, discarding it if it belongs to a previous session.
    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Generated { epoch, result } => self.on_generated(epoch, result),
            Completion::DeployRequested { key, result } => self.on_deploy_requested(key, result),
            Completion::Status(poll) => self.on_status(poll),
            Completion::Deleted { project_id, result } => {
                self.pending_deletes = self.pending_deletes.saturating_sub(1);
                match result {
                    Ok(()) => self.notify(Notice::CleanedUp { project_id }),
                    Err(e) => {
                        warn!(%project_id, error = %e, "remote delete failed");
                        self.report(SessionError::from_remote(Operation::Cleanup, &e));
                    }
                }
            }
        }
    }

    fn on_generated(&mut self, epoch: u64, result: Result<GenerateResponse, RemoteError>) {
        if epoch != self.epoch || self.session.status() != SessionStatus::Generating {
            debug!(epoch, current = self.epoch, "discarding stale generate response");
            return;
        }
        let prompt = self.session.prompt().unwrap_or_default().to_string();

        match result {
            Ok(resp) if !resp.project_id.is_empty() && !resp.generated_code.is_empty() => {
                info!(project_id = %resp.project_id, bytes = resp.generated_code.len(), "code generated");
                let project_id = resp.project_id.clone();
                self.set_session(ProjectSession::Generated {
                    project: Project {
                        id: resp.project_id,
                        prompt,
                        generated_code: resp.generated_code,
                    },
                });
                self.notify(Notice::CodeGenerated { project_id });
            }
            Ok(_) => {
                warn!("generate response missing project id or code");
                self.fail_to_idle(SessionError::Remote {
                    operation: Operation::Generate,
                    message: Operation::Generate.fallback_message().to_string(),
                });
            }
            Err(e) => {
                warn!(error = %e, "generate failed");
                self.fail_to_idle(SessionError::from_remote(Operation::Generate, &e));
            }
        }
    }

    fn on_deploy_requested(&mut self, key: SessionKey, result: Result<DeployResponse, RemoteError>) {
        if self.current_key().as_ref() != Some(&key) {
            debug!(session = %key, "discarding stale deploy response");
            return;
        }
        match result {
            Ok(resp) => {
                // State changes after this point come from the poller only.
                debug!(session = %key, status = ?resp.status, public_url = ?resp.public_url, "deploy accepted");
            }
            Err(e) if self.session.status() == SessionStatus::Deploying => {
                warn!(session = %key, error = %e, "deploy request failed");
                self.stop_poller();
                self.fail_to_idle(SessionError::from_remote(Operation::Deploy, &e));
            }
            Err(e) => {
                debug!(session = %key, error = %e, status = %self.session.status(), "deploy error after terminal status, ignoring");
            }
        }
    }

    fn on_status(&mut self, poll: PollResult) {
        let PollResult { key, status } = poll;
        if self.current_key().as_ref() != Some(&key)
            || self.session.status() != SessionStatus::Deploying
        {
            debug!(session = %key, "discarding stale status result");
            return;
        }
        if !status.status.is_terminal() {
            return;
        }
        if self.poller.as_ref().map(|p| p.key()) == Some(&key) {
            self.stop_poller();
        }

        let ProjectSession::Deploying { project } = std::mem::take(&mut self.session) else {
            return;
        };

        match (status.status, status.public_url) {
            (DeploymentStatus::Deployed, Some(public_url)) if !public_url.is_empty() => {
                info!(session = %key, %public_url, "deployment live");
                self.set_session(ProjectSession::Deployed {
                    project,
                    public_url: public_url.clone(),
                    sandbox_id: status.sandbox_id,
                });
                self.notify(Notice::Deployed { public_url });
            }
            (DeploymentStatus::Deployed, _) => {
                self.fail_deployment(
                    &key,
                    project,
                    "Deployment reported success without a public URL".into(),
                );
            }
            _ => {
                let message = status
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEPLOYMENT_FAILED.into());
                self.fail_deployment(&key, project, message);
            }
        }
    }

    fn fail_deployment(&mut self, key: &SessionKey, project: Project, error_message: String) {
        info!(session = %key, %error_message, "deployment failed");
        self.set_session(ProjectSession::Failed {
            project,
            error_message: error_message.clone(),
        });
        self.report(SessionError::DeploymentFailure(error_message));
    }

    fn fail_to_idle(&mut self, err: SessionError) {
        self.reset();
        self.set_session(ProjectSession::Idle);
        self.report(err);
    }

    /// Cancel polling and forget the session. Bumping the epoch makes every
    /// in-flight completion for the old session stale.
    fn reset(&mut self) {
        self.stop_poller();
        self.epoch += 1;
        self.session = ProjectSession::Idle;
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    fn set_session(&mut self, next: ProjectSession) {
        debug!(from = %self.session.status(), to = %next.status(), epoch = self.epoch, "session transition");
        self.session = next;
        let _ = self.event_tx.send(SessionEvent::StateChanged {
            session: Box::new(self.session.clone()),
        });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.event_tx.send(SessionEvent::Notice(notice));
    }
}

/// Drive the controller from UI commands and remote completions on a single task.
pub(crate) async fn run_controller<R: RemoteService + ?Sized>(
    mut controller: Controller<R>,
    mut completions: UnboundedReceiver<Completion>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Generate(prompt)) => {
                        if let Err(e) = controller.generate(prompt) {
                            controller.report(e);
                        }
                    }
                    Some(UiCommand::Deploy) => {
                        if let Err(e) = controller.deploy() {
                            controller.report(e);
                        }
                    }
                    Some(UiCommand::Cleanup) => {
                        controller.cleanup();
                    }
                    Some(UiCommand::Quit) | None => {
                        controller.shutdown();
                        break;
                    }
                }
            }
            Some(completion) = completions.recv() => {
                controller.apply(completion);
            }
        }
    }

    // Quit waits for outstanding deletes so a cleanup right before exit still
    // reaches the service.
    while controller.pending_deletes() > 0 {
        match completions.recv().await {
            Some(completion @ Completion::Deleted { .. }) => controller.apply(completion),
            Some(other) => debug!(?other, "dropping completion during shutdown"),
            None => break,
        }
    }

    Ok(())
}
