//! Background session supervision
//!
//! A session loop runs on a background thread and is controlled through an
//! explicit `Idle -> Active -> Idle` state machine. Stopping is cooperative:
//! the loop polls a shared flag at its suspension points and reports its
//! final result over a channel, which `stop` collects with a bounded wait.
//! Forceful thread termination is never used; it could leave a half-written
//! trace record behind.

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use udptrace_io::SocketError;

/// Default bound on how long `stop` waits for a session to terminate.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Session lifecycle and loop errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a session is already active; stop it first")]
    AlreadyActive,

    #[error("session did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("session task terminated without reporting a result")]
    TaskFailed,

    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Cooperative cancellation flag polled by session loops.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        StopFlag(Arc::new(AtomicBool::new(false)))
    }

    /// True once the controller has requested a stop.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

struct ActiveTask {
    stop: StopFlag,
    done: Receiver<Result<(), SessionError>>,
    join: JoinHandle<()>,
}

impl ActiveTask {
    fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Collect the result of a task known to have finished.
    fn reap(self) -> Result<(), SessionError> {
        // The loop sends its result before the thread exits, so a finished
        // thread with an empty channel can only have panicked.
        let result = match self.done.try_recv() {
            Ok(result) => result,
            Err(_) => Err(SessionError::TaskFailed),
        };
        let _ = self.join.join();
        result
    }
}

/// Supervises at most one background task at a time.
#[derive(Default)]
pub struct SessionController {
    task: Mutex<Option<ActiveTask>>,
}

impl SessionController {
    pub fn new() -> Self {
        SessionController {
            task: Mutex::new(None),
        }
    }

    /// Set up and spawn a session task.
    ///
    /// `setup` runs synchronously while the controller is locked, so
    /// resource acquisition (socket bind, trace file creation) is atomic
    /// with the `AlreadyActive` check and its failures surface directly
    /// from `start`. On success, the task it returns runs on a background
    /// thread until it finishes or observes its [`StopFlag`].
    ///
    /// A previous task that already finished on its own is reaped first;
    /// any error it carried is logged, not returned.
    pub fn start_with<S, F>(&self, name: &str, setup: S) -> Result<(), SessionError>
    where
        S: FnOnce() -> Result<F, SessionError>,
        F: FnOnce(StopFlag) -> Result<(), SessionError> + Send + 'static,
    {
        let mut task = self.task.lock();
        if let Some(active) = task.take() {
            if !active.is_finished() {
                *task = Some(active);
                return Err(SessionError::AlreadyActive);
            }
            if let Err(e) = active.reap() {
                tracing::warn!(error = %e, "previous session ended with an error");
            }
        }

        let run = setup()?;

        let stop = StopFlag::new();
        let loop_stop = stop.clone();
        let (done_tx, done_rx) = channel::bounded(1);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = run(loop_stop);
                if let Err(e) = &result {
                    tracing::error!(error = %e, "session loop failed");
                }
                let _ = done_tx.send(result);
            })?;

        *task = Some(ActiveTask {
            stop,
            done: done_rx,
            join,
        });
        Ok(())
    }

    /// True between a successful `start` and the task's termination.
    pub fn is_running(&self) -> bool {
        let task = self.task.lock();
        task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Request a stop and wait for the task to terminate.
    ///
    /// A no-op on an idle controller. On success the controller returns to
    /// idle and surfaces the loop's own result, so a session that died on a
    /// socket failure reports it here rather than losing it. On timeout the
    /// task stays registered: its resource state is unknown and the
    /// controller refuses new sessions until the task is accounted for.
    pub fn stop(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut task = self.task.lock();
        let Some(active) = task.take() else {
            return Ok(());
        };

        active.stop.set();
        match active.done.recv_timeout(timeout) {
            Ok(result) => {
                let _ = active.join.join();
                result
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = active.join.join();
                Err(SessionError::TaskFailed)
            }
            Err(RecvTimeoutError::Timeout) => {
                *task = Some(active);
                Err(SessionError::StopTimeout(timeout))
            }
        }
    }
}
