//! Remote code-generation and sandbox service.
//!
//! The orchestrator only talks to the service through [`RemoteService`], so the
//! HTTP client can be swapped for a scripted fake in tests.

mod http;

pub use http::HttpRemoteClient;

use crate::error::RemoteError;
use crate::model::{DeployResponse, GenerateResponse, StatusResponse};
use async_trait::async_trait;

#[async_trait]
pub trait RemoteService: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RemoteError>;

    async fn deploy(
        &self,
        project_id: &str,
        generated_code: &str,
    ) -> Result<DeployResponse, RemoteError>;

    async fn fetch_status(&self, project_id: &str) -> Result<StatusResponse, RemoteError>;

    async fn delete(&self, project_id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory service for controller and poller tests.

    use super::*;
    use crate::model::DeploymentStatus;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    pub(crate) struct FakeRemote {
        generate: Mutex<VecDeque<Result<GenerateResponse, RemoteError>>>,
        deploy: Mutex<VecDeque<Result<DeployResponse, RemoteError>>>,
        statuses: Mutex<VecDeque<Result<StatusResponse, RemoteError>>>,
        delete: Mutex<VecDeque<Result<(), RemoteError>>>,
        /// When set, deploy waits for `release_deploy` before answering.
        hold_deploy: Mutex<bool>,
        deploy_gate: Notify,
        pub generate_calls: AtomicUsize,
        pub deploy_calls: AtomicUsize,
        pub status_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
        pub deleted: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_generate(&self, project_id: &str, code: &str) {
            self.generate
                .lock()
                .unwrap()
                .push_back(Ok(GenerateResponse {
                    project_id: project_id.into(),
                    generated_code: code.into(),
                }));
        }

        pub fn push_generate_err(&self, err: RemoteError) {
            self.generate.lock().unwrap().push_back(Err(err));
        }

        pub fn push_deploy_err(&self, err: RemoteError) {
            self.deploy.lock().unwrap().push_back(Err(err));
        }

        pub fn push_status(&self, status: DeploymentStatus) {
            self.push_status_full(status, None, None, None);
        }

        pub fn push_status_full(
            &self,
            status: DeploymentStatus,
            public_url: Option<&str>,
            sandbox_id: Option<&str>,
            error_message: Option<&str>,
        ) {
            self.statuses.lock().unwrap().push_back(Ok(StatusResponse {
                project_id: None,
                status,
                public_url: public_url.map(Into::into),
                sandbox_id: sandbox_id.map(Into::into),
                error_message: error_message.map(Into::into),
            }));
        }

        pub fn push_status_err(&self, err: RemoteError) {
            self.statuses.lock().unwrap().push_back(Err(err));
        }

        pub fn push_delete_err(&self, err: RemoteError) {
            self.delete.lock().unwrap().push_back(Err(err));
        }

        pub fn hold_deploy(&self) {
            *self.hold_deploy.lock().unwrap() = true;
        }

        pub fn release_deploy(&self) {
            self.deploy_gate.notify_one();
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteService for FakeRemote {
        async fn generate(&self, _prompt: &str) -> Result<GenerateResponse, RemoteError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.generate
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::Transport("no scripted generate".into())))
        }

        async fn deploy(
            &self,
            project_id: &str,
            _generated_code: &str,
        ) -> Result<DeployResponse, RemoteError> {
            self.deploy_calls.fetch_add(1, Ordering::SeqCst);
            let hold = *self.hold_deploy.lock().unwrap();
            if hold {
                self.deploy_gate.notified().await;
            }
            let scripted = self.deploy.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(DeployResponse {
                    project_id: Some(project_id.into()),
                    status: DeploymentStatus::Deploying,
                    public_url: None,
                    sandbox_id: None,
                })
            })
        }

        async fn fetch_status(&self, _project_id: &str) -> Result<StatusResponse, RemoteError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.statuses.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(StatusResponse {
                    project_id: None,
                    status: DeploymentStatus::Deploying,
                    public_url: None,
                    sandbox_id: None,
                    error_message: None,
                })
            })
        }

        async fn delete(&self, project_id: &str) -> Result<(), RemoteError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.deleted.lock().unwrap().push(project_id.to_string());
            self.delete.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }
}
