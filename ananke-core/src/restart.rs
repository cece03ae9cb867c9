//! Deferred, debounced hub restarts.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::os::{CommandRunner, CommandSpec};

const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// What [`RestartCoordinator::request`] did.
#[derive(Debug)]
pub enum RestartTicket {
    /// A new restart was scheduled; the handle resolves after it ran.
    Scheduled(JoinHandle<()>),
    /// A restart is already pending and will pick up this change too.
    AlreadyPending,
}

/// Restarts the hub a short while after a registry change.
///
/// The delay lets the response of the triggering request reach the client
/// before the hub goes down. Requests arriving while a restart is pending
/// collapse into that restart.
#[derive(Clone)]
pub struct RestartCoordinator {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
    delay: Duration,
    pending: Arc<AtomicBool>,
}

impl fmt::Debug for RestartCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartCoordinator")
            .field("command", &self.command.command_line())
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl RestartCoordinator {
    /// Coordinator running `command` through `runner` after the default delay.
    pub fn new(runner: Arc<dyn CommandRunner>, command: CommandSpec) -> Self {
        Self {
            runner,
            command,
            delay: DEFAULT_DELAY,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the wait between request and restart.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `systemctl restart jupyterhub`
    pub fn default_command() -> CommandSpec {
        CommandSpec::new("systemctl").args(["restart", "jupyterhub"])
    }

    /// True between a scheduled restart and its completion.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Schedules a restart unless one is already pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self) -> RestartTicket {
        if self.pending.swap(true, Ordering::SeqCst) {
            debug!("hub restart already pending");
            return RestartTicket::AlreadyPending;
        }

        let runner = Arc::clone(&self.runner);
        let command = self.command.clone();
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        info!(delay_ms = delay.as_millis() as u64, "hub restart scheduled");

        RestartTicket::Scheduled(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Changes made from here on need a restart of their own.
            pending.store(false, Ordering::SeqCst);
            match runner.run(&command).await {
                Ok(_) => info!(command = %command, "hub restarted"),
                Err(err) => error!(command = %command, %err, "hub restart failed"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::testing::RecordingRunner;

    fn coordinator(runner: RecordingRunner) -> (Arc<RecordingRunner>, RestartCoordinator) {
        let runner = Arc::new(runner);
        let coordinator = RestartCoordinator::new(
            runner.clone(),
            RestartCoordinator::default_command(),
        );
        (runner, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_the_delay() {
        let (runner, coordinator) = coordinator(RecordingRunner::new());

        let RestartTicket::Scheduled(handle) = coordinator.request() else {
            panic!("first request must schedule");
        };
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runner.count("systemctl restart jupyterhub"), 0);
        assert!(coordinator.is_pending());

        handle.await.unwrap();
        assert_eq!(runner.count("systemctl restart jupyterhub"), 1);
        assert!(!coordinator.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn requests_collapse_while_pending() {
        let (runner, coordinator) = coordinator(RecordingRunner::new());

        let first = coordinator.request();
        let second = coordinator.clone().request();
        assert!(matches!(second, RestartTicket::AlreadyPending));

        if let RestartTicket::Scheduled(handle) = first {
            handle.await.unwrap();
        }
        assert_eq!(runner.count("systemctl"), 1);

        assert!(matches!(coordinator.request(), RestartTicket::Scheduled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_restart_clears_pending_flag() {
        let (_runner, coordinator) =
            coordinator(RecordingRunner::new().failing_on("systemctl"));

        if let RestartTicket::Scheduled(handle) = coordinator.request() {
            handle.await.unwrap();
        }

        assert!(!coordinator.is_pending());
    }
}
