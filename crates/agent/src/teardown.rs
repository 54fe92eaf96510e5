//! Deferred session teardown.
//!
//! After an order completes the host is given a short grace period, then
//! asked to disconnect the transport and stop the job. If either step fails
//! or panics the host is forced down instead.

use std::sync::Arc;

use async_trait::async_trait;
use qbeat_core::ordering::ShutdownRequest;
use qbeat_core::session::SessionId;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("job shutdown failed: {0}")]
    Shutdown(String),
    #[error("teardown step aborted: {0}")]
    Aborted(String),
}

/// The process hosting a voice session.
#[async_trait]
pub trait SessionHost: Send + Sync {
    async fn disconnect(&self) -> Result<(), HostError>;
    fn shutdown_job(&self) -> Result<(), HostError>;
    /// Last resort. Must not fail.
    fn force_exit(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownOutcome {
    Graceful,
    Forced,
}

pub struct TeardownHandle {
    task: JoinHandle<TeardownOutcome>,
}

impl TeardownHandle {
    /// Stops a teardown that has not fired yet.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// `None` when the teardown was cancelled before it ran.
    pub async fn wait(self) -> Option<TeardownOutcome> {
        self.task.await.ok()
    }
}

pub fn schedule_teardown(
    host: Arc<dyn SessionHost>,
    session_id: SessionId,
    request: ShutdownRequest,
) -> TeardownHandle {
    info!(
        event_name = "session.teardown.scheduled",
        session_id = %session_id,
        delay_ms = u64::try_from(request.after.as_millis()).unwrap_or(u64::MAX),
        "session teardown scheduled"
    );

    let task = tokio::spawn(async move {
        tokio::time::sleep(request.after).await;
        info!(event_name = "session.teardown.started", session_id = %session_id, "ending session");

        // Run in its own task so a panicking host still reaches force_exit.
        let steps = tokio::spawn({
            let host = host.clone();
            async move {
                host.disconnect().await?;
                host.shutdown_job()
            }
        });
        let result = match steps.await {
            Ok(result) => result,
            Err(join_error) => Err(HostError::Aborted(join_error.to_string())),
        };

        match result {
            Ok(()) => {
                info!(
                    event_name = "session.teardown.completed",
                    session_id = %session_id,
                    "session ended"
                );
                TeardownOutcome::Graceful
            }
            Err(host_error) => {
                error!(
                    event_name = "session.teardown.failed",
                    session_id = %session_id,
                    error = %host_error,
                    "graceful teardown failed; forcing exit"
                );
                host.force_exit();
                TeardownOutcome::Forced
            }
        }
    });

    TeardownHandle { task }
}

/// Host for the standalone binary: shutdown flips a watch channel the main
/// loop listens on.
pub struct ProcessHost {
    shutdown: watch::Sender<bool>,
}

impl ProcessHost {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (shutdown, receiver) = watch::channel(false);
        (Self { shutdown }, receiver)
    }
}

#[async_trait]
impl SessionHost for ProcessHost {
    async fn disconnect(&self) -> Result<(), HostError> {
        info!(event_name = "session.host.disconnect", "transport disconnected");
        Ok(())
    }

    fn shutdown_job(&self) -> Result<(), HostError> {
        self.shutdown
            .send(true)
            .map_err(|_| HostError::Shutdown("shutdown listener already dropped".to_owned()))
    }

    fn force_exit(&self) {
        std::process::exit(0);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use qbeat_core::ordering::ShutdownRequest;
    use qbeat_core::session::SessionId;

    use super::{schedule_teardown, HostError, ProcessHost, SessionHost, TeardownOutcome};

    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub fail_disconnect: AtomicBool,
        pub panic_on_shutdown: AtomicBool,
        pub disconnects: AtomicUsize,
        pub shutdowns: AtomicUsize,
        pub forced_exits: AtomicUsize,
    }

    impl RecordingHost {
        pub fn failing_disconnect() -> Self {
            let host = Self::default();
            host.fail_disconnect.store(true, Ordering::SeqCst);
            host
        }

        pub fn panicking_shutdown() -> Self {
            let host = Self::default();
            host.panic_on_shutdown.store(true, Ordering::SeqCst);
            host
        }
    }

    #[async_trait]
    impl SessionHost for RecordingHost {
        async fn disconnect(&self) -> Result<(), HostError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            if self.fail_disconnect.load(Ordering::SeqCst) {
                return Err(HostError::Disconnect("room already closed".to_owned()));
            }
            Ok(())
        }

        fn shutdown_job(&self) -> Result<(), HostError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_shutdown.load(Ordering::SeqCst) {
                panic!("job runner vanished");
            }
            Ok(())
        }

        fn force_exit(&self) {
            self.forced_exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request(secs: u64) -> ShutdownRequest {
        ShutdownRequest { after: Duration::from_secs(secs) }
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_waits_for_delay_then_disconnects_and_shuts_down() {
        let host = Arc::new(RecordingHost::default());
        let handle = schedule_teardown(host.clone(), SessionId("s-1".to_owned()), request(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(host.disconnects.load(Ordering::SeqCst), 0);

        assert_eq!(handle.wait().await, Some(TeardownOutcome::Graceful));
        assert_eq!(host.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(host.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(host.forced_exits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_disconnect_forces_exit_without_shutdown() {
        let host = Arc::new(RecordingHost::failing_disconnect());
        let handle = schedule_teardown(host.clone(), SessionId("s-2".to_owned()), request(5));

        assert_eq!(handle.wait().await, Some(TeardownOutcome::Forced));
        assert_eq!(host.shutdowns.load(Ordering::SeqCst), 0);
        assert_eq!(host.forced_exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_shutdown_still_forces_exit() {
        let host = Arc::new(RecordingHost::panicking_shutdown());
        let handle = schedule_teardown(host.clone(), SessionId("s-4".to_owned()), request(5));

        assert_eq!(handle.wait().await, Some(TeardownOutcome::Forced));
        assert_eq!(host.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(host.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(host.forced_exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_teardown_never_touches_host() {
        let host = Arc::new(RecordingHost::default());
        let handle = schedule_teardown(host.clone(), SessionId("s-3".to_owned()), request(5));

        handle.cancel();
        assert_eq!(handle.wait().await, None);
        assert_eq!(host.disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn process_host_signals_shutdown_listener() {
        let (host, mut shutdown) = ProcessHost::new();

        host.disconnect().await.expect("disconnect");
        host.shutdown_job().expect("listener alive");

        shutdown.changed().await.expect("value sent");
        assert!(*shutdown.borrow());
    }

    #[test]
    fn process_host_reports_dropped_listener() {
        let (host, shutdown) = ProcessHost::new();
        drop(shutdown);

        assert!(matches!(host.shutdown_job(), Err(HostError::Shutdown(_))));
    }
}
