//! Exit coordination - in-flight command tracking and graceful versus forced shutdown.
//!
//! ```text
//! Running --(shutdown request / first signal)--> ShutdownRequested
//! ShutdownRequested --(commands_running hits 0)--> Terminated { forced: false }
//! ShutdownRequested --(second signal / force)--> Terminated { forced: true }
//! Terminated { forced: false } --(signal during teardown)--> Terminated { forced: true }
//! ```
//!
//! The counter and the flag live behind one mutex. OS signals are received by a tokio task
//! ([`spawn_signal_listener`]) and only then touch that state. The terminal phase is
//! published on a watch channel, which the process supervisor awaits to perform the exit.

use crate::errors::{Error, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Serving commands
    Running,
    /// Waiting for in-flight commands to finish
    ShutdownRequested,
    /// Exit decided. A graceful exit can still be escalated to a forced one by a signal.
    Terminated {
        /// Whether in-flight commands were abandoned
        forced: bool,
    },
}

/// OS signals the coordinator reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

#[derive(Debug, Default)]
struct ExitState {
    commands_running: u64,
    terminate_requested: bool,
    terminated: bool,
}

/// Process-wide shutdown state. Constructed once and shared by `Arc`.
#[derive(Debug)]
pub struct ExitCoordinator {
    state: Mutex<ExitState>,
    phase: watch::Sender<Phase>,
}

impl Default for ExitCoordinator {
    fn default() -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            state: Mutex::new(ExitState::default()),
            phase,
        }
    }
}

impl ExitCoordinator {
    /// A coordinator in the running phase with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ExitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters the terminal phase unless already there.
    fn terminate(&self, state: &mut ExitState, forced: bool) -> bool {
        if state.terminated {
            return false;
        }
        state.terminated = true;
        self.phase.send_replace(Phase::Terminated { forced });
        if forced {
            warn!(
                "Terminating with {} command(s) still running",
                state.commands_running
            );
        } else {
            info!("All commands finished, terminating");
        }
        true
    }

    fn request(&self, state: &mut ExitState) {
        if !state.terminate_requested {
            state.terminate_requested = true;
            self.phase.send_replace(Phase::ShutdownRequested);
        }
        if state.commands_running == 0 {
            self.terminate(state, false);
        }
    }

    /// A command started. Returns the number now running.
    ///
    /// Commands are counted even while a shutdown is pending.
    pub fn on_command(&self) -> u64 {
        let mut state = self.state();
        state.commands_running += 1;
        state.commands_running
    }

    /// A command finished successfully. Returns the number still running.
    ///
    /// # Errors
    /// [`Error::CounterUnderflow`] if no command was running; the state is left untouched.
    pub fn on_command_completion(&self) -> Result<u64> {
        self.finish_command()
    }

    /// A command finished with an error. Same accounting as
    /// [`on_command_completion`](Self::on_command_completion).
    ///
    /// # Errors
    /// [`Error::CounterUnderflow`] if no command was running.
    pub fn on_command_error(&self) -> Result<u64> {
        self.finish_command()
    }

    fn finish_command(&self) -> Result<u64> {
        let mut state = self.state();
        let Some(remaining) = state.commands_running.checked_sub(1) else {
            error!("Command completion reported with no command running; hooks are unpaired");
            return Err(Error::CounterUnderflow);
        };

        state.commands_running = remaining;
        if remaining == 0 && state.terminate_requested {
            self.terminate(&mut state, false);
        }
        Ok(remaining)
    }

    /// Asks for a graceful shutdown. Terminates right away when nothing is running.
    /// Returns the number of commands still running.
    pub fn request_shutdown(&self) -> u64 {
        let mut state = self.state();
        self.request(&mut state);
        state.commands_running
    }

    /// Handles an OS signal. The first one requests a graceful shutdown, any further one
    /// terminates immediately.
    pub fn on_signal(&self, signal: ShutdownSignal) -> Phase {
        let mut state = self.state();
        if state.terminated {
            if *self.phase.borrow() == (Phase::Terminated { forced: false }) {
                warn!("Received {signal} during cleanup, exiting immediately");
                self.phase.send_replace(Phase::Terminated { forced: true });
            }
        } else if state.terminate_requested {
            warn!("Received {signal} again, skipping cleanup");
            self.terminate(&mut state, true);
        } else {
            info!(
                "Received {signal}, waiting for {} command(s) to finish",
                state.commands_running
            );
            if signal == ShutdownSignal::Interrupt {
                info!("Use CTRL-C again if you're sure you want to skip cleanup handlers.");
            }
            self.request(&mut state);
        }
        *self.phase.borrow()
    }

    /// Terminates without waiting for running commands. Returns `false` if the process was
    /// already terminating.
    pub fn force_terminate(&self) -> bool {
        let mut state = self.state();
        state.terminate_requested = true;
        self.terminate(&mut state, true)
    }

    /// Number of commands in flight.
    #[must_use]
    pub fn commands_running(&self) -> u64 {
        self.state().commands_running
    }

    /// Whether a shutdown has been requested.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.state().terminate_requested
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watches phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Polls once a second, for up to `budget`, until the caller is the only command left
    /// running. Returns how many other commands are still running when it gives up (0 on
    /// success).
    pub async fn wait_for_others(&self, budget: Duration) -> u64 {
        let deadline = Instant::now() + budget;
        loop {
            let others = self.commands_running().saturating_sub(1);
            if others == 0 || Instant::now() >= deadline {
                return others;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Resolves once the exit is forced, including a graceful exit escalated by a signal.
    pub async fn forced(&self) {
        let mut phase = self.phase.subscribe();
        if phase
            .wait_for(|phase| matches!(phase, Phase::Terminated { forced: true }))
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }

    /// Resolves once the terminal phase is reached, with whether it was forced.
    pub async fn terminated(&self) -> bool {
        let mut phase = self.phase.subscribe();
        phase
            .wait_for(|phase| matches!(phase, Phase::Terminated { .. }))
            .await
            .is_ok_and(|phase| matches!(*phase, Phase::Terminated { forced: true }))
    }
}

#[cfg(unix)]
type TerminateStream = Option<tokio::signal::unix::Signal>;
#[cfg(not(unix))]
type TerminateStream = ();

#[cfg(unix)]
fn terminate_stream() -> TerminateStream {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(error) => {
            warn!(error = %error, "Failed to install SIGTERM handler");
            None
        }
    }
}

#[cfg(not(unix))]
fn terminate_stream() -> TerminateStream {}

#[cfg(unix)]
async fn next_terminate(stream: &mut TerminateStream) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn next_terminate(_stream: &mut TerminateStream) {
    std::future::pending::<()>().await;
}

/// Listens for SIGINT and SIGTERM and feeds them to `coordinator` until it terminates.
pub fn spawn_signal_listener(coordinator: Arc<ExitCoordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut terminate = terminate_stream();
        let mut interrupts = true;
        loop {
            let signal = tokio::select! {
                result = tokio::signal::ctrl_c(), if interrupts => match result {
                    Ok(()) => Some(ShutdownSignal::Interrupt),
                    Err(error) => {
                        warn!(error = %error, "Failed to install Ctrl+C handler");
                        interrupts = false;
                        None
                    }
                },
                () = next_terminate(&mut terminate) => Some(ShutdownSignal::Terminate),
            };

            let Some(signal) = signal else {
                continue;
            };
            if let Phase::Terminated { forced: true } = coordinator.on_signal(signal) {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_tracks_starts_minus_completions() -> Result<()> {
        let exit = ExitCoordinator::new();
        assert_eq!(exit.on_command(), 1);
        assert_eq!(exit.on_command(), 2);
        assert_eq!(exit.on_command_completion()?, 1);
        assert_eq!(exit.on_command(), 2);
        assert_eq!(exit.on_command_error()?, 1);
        assert_eq!(exit.on_command_completion()?, 0);
        assert_eq!(exit.commands_running(), 0);
        assert_eq!(exit.phase(), Phase::Running);
        Ok(())
    }

    #[test]
    fn test_underflow_is_an_error() {
        let exit = ExitCoordinator::new();
        assert!(matches!(
            exit.on_command_completion(),
            Err(Error::CounterUnderflow)
        ));
        assert!(matches!(
            exit.on_command_error(),
            Err(Error::CounterUnderflow)
        ));
        assert_eq!(exit.commands_running(), 0);
        assert_eq!(exit.phase(), Phase::Running);
    }

    #[test]
    fn test_graceful_shutdown_after_in_flight_commands() -> Result<()> {
        let exit = ExitCoordinator::new();
        for _ in 0..3 {
            exit.on_command();
        }

        assert_eq!(exit.request_shutdown(), 3);
        assert_eq!(exit.phase(), Phase::ShutdownRequested);

        exit.on_command_completion()?;
        exit.on_command_error()?;
        assert_eq!(exit.phase(), Phase::ShutdownRequested);

        exit.on_command_completion()?;
        assert_eq!(exit.phase(), Phase::Terminated { forced: false });
        Ok(())
    }

    #[test]
    fn test_shutdown_with_nothing_running_terminates_at_once() {
        let exit = ExitCoordinator::new();
        assert_eq!(exit.request_shutdown(), 0);
        assert_eq!(exit.phase(), Phase::Terminated { forced: false });
    }

    #[test]
    fn test_commands_still_counted_while_shutting_down() -> Result<()> {
        let exit = ExitCoordinator::new();
        exit.on_command();
        exit.request_shutdown();

        assert_eq!(exit.on_command(), 2);
        exit.on_command_completion()?;
        assert_eq!(exit.phase(), Phase::ShutdownRequested);
        exit.on_command_completion()?;
        assert_eq!(exit.phase(), Phase::Terminated { forced: false });
        Ok(())
    }

    #[test]
    fn test_second_signal_forces_exit() {
        let exit = ExitCoordinator::new();
        exit.on_command();

        assert_eq!(
            exit.on_signal(ShutdownSignal::Interrupt),
            Phase::ShutdownRequested
        );
        assert!(exit.is_terminating());
        assert_eq!(
            exit.on_signal(ShutdownSignal::Terminate),
            Phase::Terminated { forced: true }
        );
        assert_eq!(exit.commands_running(), 1);
    }

    #[test]
    fn test_signal_after_shutdown_command_forces_exit() {
        let exit = ExitCoordinator::new();
        exit.on_command();
        exit.request_shutdown();

        assert_eq!(
            exit.on_signal(ShutdownSignal::Interrupt),
            Phase::Terminated { forced: true }
        );
    }

    #[test]
    fn test_terminated_is_entered_once() -> Result<()> {
        let exit = ExitCoordinator::new();
        exit.on_command();
        exit.request_shutdown();
        exit.on_command_completion()?;

        assert!(!exit.force_terminate());
        assert_eq!(exit.phase(), Phase::Terminated { forced: false });
        Ok(())
    }

    #[tokio::test]
    async fn test_signal_during_graceful_teardown_forces_exit() -> Result<()> {
        let exit = ExitCoordinator::new();
        exit.on_command();
        exit.request_shutdown();
        exit.on_command_completion()?;
        assert!(!exit.terminated().await);

        let ((), phase) = tokio::join!(exit.forced(), async {
            tokio::task::yield_now().await;
            exit.on_signal(ShutdownSignal::Interrupt)
        });
        assert_eq!(phase, Phase::Terminated { forced: true });

        // Already forced: further signals change nothing
        assert_eq!(
            exit.on_signal(ShutdownSignal::Terminate),
            Phase::Terminated { forced: true }
        );
        Ok(())
    }

    #[test]
    fn test_force_terminate_abandons_commands() {
        let exit = ExitCoordinator::new();
        exit.on_command();
        exit.on_command();
        exit.request_shutdown();

        assert!(exit.force_terminate());
        assert_eq!(exit.phase(), Phase::Terminated { forced: true });
    }

    #[tokio::test]
    async fn test_terminated_future_reports_forced_flag() {
        let exit = ExitCoordinator::new();
        exit.on_command();

        let (forced, ()) = tokio::join!(exit.terminated(), async {
            exit.request_shutdown();
            tokio::task::yield_now().await;
            assert!(exit.on_command_completion().is_ok());
        });
        assert!(!forced);

        // Already terminal: resolves immediately
        assert!(!exit.terminated().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_others_returns_when_alone() -> Result<()> {
        let exit = ExitCoordinator::new();
        exit.on_command(); // the waiting command
        exit.on_command();

        let started = Instant::now();
        let (left, ()) = tokio::join!(exit.wait_for_others(Duration::from_secs(30)), async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            assert!(exit.on_command_completion().is_ok());
        });

        assert_eq!(left, 0);
        assert!(started.elapsed() < Duration::from_secs(4));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_others_gives_up_after_budget() {
        let exit = ExitCoordinator::new();
        for _ in 0..3 {
            exit.on_command();
        }

        assert_eq!(exit.wait_for_others(Duration::from_secs(5)).await, 2);
        assert_eq!(exit.wait_for_others(Duration::ZERO).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_hooks_never_lose_updates() {
        let exit = Arc::new(ExitCoordinator::new());
        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let exit = Arc::clone(&exit);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        exit.on_command();
                        tokio::task::yield_now().await;
                        assert!(exit.on_command_completion().is_ok());
                    }
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.is_ok());
        }
        assert_eq!(exit.commands_running(), 0);
        assert_eq!(exit.phase(), Phase::Running);
    }
}
