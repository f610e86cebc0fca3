//! Debounced refresh for rapid-fire change notifications
//!
//! "Playlist contents changed" style events arrive in bursts. A [`Debouncer`]
//! coalesces every trigger inside the window into one callback, fired once
//! the window passes without a new trigger.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};

use crate::worker::{spawn_named, WorkerError, WorkerResult};

/// Default coalescing window
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Poll interval while nothing is pending, so shutdown is always noticed
const IDLE_POLL: Duration = Duration::from_millis(100);

enum DebounceCommand {
    Trigger,
    Shutdown,
}

/// Trailing-edge debouncer running its callback on a background thread
pub struct Debouncer {
    command_tx: Sender<DebounceCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Start the debouncer thread
    pub fn spawn<F>(window: Duration, mut callback: F) -> WorkerResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (command_tx, command_rx) = channel::unbounded::<DebounceCommand>();

        let handle = spawn_named("mixtape-debounce", move || {
            log::debug!("Debouncer started ({:?} window)", window);
            let mut deadline: Option<Instant> = None;
            loop {
                let timeout = deadline
                    .map(|d| d.saturating_duration_since(Instant::now()))
                    .unwrap_or(IDLE_POLL);
                crossbeam::select! {
                    recv(command_rx) -> cmd => match cmd {
                        Ok(DebounceCommand::Trigger) => deadline = Some(Instant::now() + window),
                        Ok(DebounceCommand::Shutdown) | Err(_) => break,
                    },
                    default(timeout) => {
                        if deadline.is_some_and(|d| Instant::now() >= d) {
                            deadline = None;
                            callback();
                        }
                    }
                }
            }
            log::debug!("Debouncer stopped");
        })?;

        Ok(Self {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    /// Start the debouncer with the default window
    pub fn with_default_window<F>(callback: F) -> WorkerResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(DEFAULT_DEBOUNCE_WINDOW, callback)
    }

    /// Request a callback once the window passes quietly
    pub fn trigger(&self) -> WorkerResult<()> {
        self.command_tx
            .send(DebounceCommand::Trigger)
            .map_err(|_| WorkerError::Disconnected("debounce"))
    }

    /// Stop the thread; a pending callback is dropped
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(DebounceCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
