//! Deployment status poller.
//!
//! A poller is a spawned task bound to one [`SessionKey`]. It waits one full
//! interval before the first fetch, then fetches every interval until the
//! service reports a terminal status or the handle is stopped. Fetch errors
//! are logged and never end the loop.

use crate::model::{SessionKey, StatusResponse};
use crate::remote::RemoteService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// A terminal status observed for the session the poller was started for.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub key: SessionKey,
    pub status: StatusResponse,
}

/// Handle to a running poller. Dropping it cancels the task.
pub struct StatusPoller {
    key: SessionKey,
    handle: JoinHandle<()>,
}

impl StatusPoller {
    /// Spawn a poller for `key`; terminal results are sent through `on_result`
    /// after being converted with `wrap`.
    pub fn start<R, M, F>(
        remote: Arc<R>,
        key: SessionKey,
        interval: Duration,
        on_result: UnboundedSender<M>,
        wrap: F,
    ) -> Self
    where
        R: RemoteService + ?Sized,
        M: Send + 'static,
        F: Fn(PollResult) -> M + Send + 'static,
    {
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut attempt = 0u64;
            loop {
                ticker.tick().await;
                attempt += 1;
                match remote.fetch_status(&task_key.project_id).await {
                    Ok(status) if status.status.is_terminal() => {
                        debug!(session = %task_key, attempt, status = ?status.status, "terminal status");
                        let _ = on_result.send(wrap(PollResult {
                            key: task_key,
                            status,
                        }));
                        break;
                    }
                    Ok(status) => {
                        debug!(session = %task_key, attempt, status = ?status.status, "still deploying");
                    }
                    Err(e) => {
                        warn!(session = %task_key, attempt, error = %e, "status fetch failed, will retry");
                    }
                }
            }
        });
        Self { key, handle }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task. Any result it already queued is left for the
    /// receiver's session check to discard.
    pub fn stop(self) {
        debug!(session = %self.key, finished = self.is_finished(), "stopping status poller");
        // Drop aborts.
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::model::DeploymentStatus;
    use crate::remote::fake::FakeRemote;
    use tokio::sync::mpsc;

    fn key(id: &str) -> SessionKey {
        SessionKey {
            epoch: 1,
            project_id: id.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_waits_one_interval() {
        let remote = Arc::new(FakeRemote::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let _poller = StatusPoller::start(remote.clone(), key("p1"), Duration::from_secs(3), tx, |r| r);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(remote.status_calls(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.status_calls(), 1);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(remote.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_terminal_status() {
        let remote = Arc::new(FakeRemote::new());
        remote.push_status(DeploymentStatus::Deploying);
        remote.push_status_full(
            DeploymentStatus::Deployed,
            Some("https://sandbox.example/p1"),
            None,
            None,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(remote.clone(), key("p1"), Duration::from_secs(3), tx, |r| r);

        let result = rx.recv().await.unwrap();
        assert_eq!(result.key, key("p1"));
        assert_eq!(result.status.status, DeploymentStatus::Deployed);
        assert_eq!(remote.status_calls(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(remote.status_calls(), 2);
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_do_not_stop_polling() {
        let remote = Arc::new(FakeRemote::new());
        remote.push_status_err(RemoteError::Transport("connection reset".into()));
        remote.push_status_err(RemoteError::Api {
            status: 503,
            detail: None,
        });
        remote.push_status_full(DeploymentStatus::Failed, None, None, Some("build error"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _poller = StatusPoller::start(remote.clone(), key("p1"), Duration::from_secs(3), tx, |r| r);

        let result = rx.recv().await.unwrap();
        assert_eq!(result.status.status, DeploymentStatus::Failed);
        assert_eq!(result.status.error_message.as_deref(), Some("build error"));
        assert_eq!(remote.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_further_fetches() {
        let remote = Arc::new(FakeRemote::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(remote.clone(), key("p1"), Duration::from_secs(3), tx, |r| r);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(remote.status_calls(), 1);
        poller.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(remote.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_poller_leaves_one_timer() {
        let remote = Arc::new(FakeRemote::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut slot = Some(StatusPoller::start(
            remote.clone(),
            key("p1"),
            Duration::from_secs(3),
            tx.clone(),
            |r| r,
        ));
        if let Some(old) = slot.take() {
            old.stop();
        }
        slot = Some(StatusPoller::start(remote.clone(), key("p1"), Duration::from_secs(3), tx, |r| r));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(remote.status_calls(), 1);
        assert_eq!(slot.as_ref().map(|p| p.key().clone()), Some(key("p1")));
    }
}
