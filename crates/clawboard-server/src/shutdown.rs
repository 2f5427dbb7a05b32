//! Relay shutdown: stop accepting, close every peer session, wait for cleanup.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How a drain finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Listener stopped and every session ran its cleanup.
    Drained,
    /// The timeout expired first.
    TimedOut {
        /// Sessions still running when the timeout hit.
        remaining_sessions: usize,
    },
}

/// Cancellation for the listener plus a tracker over live peer sessions.
///
/// Sessions observe [`token`](Self::token) and send a close frame when it
/// fires; [`drain`](Self::drain) then waits for their registry cleanup.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal shutdown. Sessions tracked afterwards are still awaited by
    /// [`drain`](Self::drain).
    pub fn shutdown(&self) {
        self.token.cancel();
        let _ = self.sessions.close();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wrap a peer session so [`drain`](Self::drain) waits for it.
    pub fn track_session<F>(&self, session: F) -> impl Future<Output = F::Output> + Send + 'static + use<F>
    where
        F: Future + Send + 'static,
    {
        self.sessions.track_future(session)
    }

    /// Number of peer sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Signal shutdown, then wait up to `timeout` for the listener task and
    /// every tracked session to finish.
    pub async fn drain(&self, listener: JoinHandle<()>, timeout: Option<Duration>) -> DrainOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        info!(
            sessions = self.active_sessions(),
            timeout_secs = timeout.as_secs(),
            "draining peer sessions"
        );

        let drained = tokio::time::timeout(timeout, async {
            if let Err(e) = listener.await {
                warn!(error = %e, "listener task failed");
            }
            self.sessions.wait().await;
        })
        .await;

        match drained {
            Ok(()) => DrainOutcome::Drained,
            Err(_) => {
                let remaining_sessions = self.active_sessions();
                warn!(remaining_sessions, "drain timed out after {timeout:?}");
                DrainOutcome::TimedOut { remaining_sessions }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_listener() -> JoinHandle<()> {
        tokio::spawn(async {})
    }

    #[test]
    fn shutdown_cancels_token() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(coord.token().is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_sessions_to_clean_up() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
        let _session = tokio::spawn(coord.track_session(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = done_tx.send(());
        }));
        assert_eq!(coord.active_sessions(), 1);

        let outcome = coord
            .drain(idle_listener(), Some(Duration::from_secs(5)))
            .await;
        assert_eq!(outcome, DrainOutcome::Drained);
        assert!(done_rx.try_recv().is_ok());
        assert_eq!(coord.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_reports_stuck_sessions() {
        let coord = ShutdownCoordinator::new();
        let _stuck = tokio::spawn(coord.track_session(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));

        let outcome = coord
            .drain(idle_listener(), Some(Duration::from_millis(50)))
            .await;
        assert_eq!(
            outcome,
            DrainOutcome::TimedOut {
                remaining_sessions: 1
            }
        );
    }

    #[tokio::test]
    async fn drain_with_no_sessions_returns_immediately() {
        let coord = ShutdownCoordinator::new();
        let outcome = coord
            .drain(idle_listener(), Some(Duration::from_secs(1)))
            .await;
        assert_eq!(outcome, DrainOutcome::Drained);
    }
}
