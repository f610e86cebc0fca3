//! Background thread plumbing shared by the mixtape services

use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Errors from starting or talking to a background worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} worker has shut down")]
    Disconnected(&'static str),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Spawn a named thread, mapping the OS error into [`WorkerError::Spawn`]
pub fn spawn_named<F>(name: &'static str, body: F) -> WorkerResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|source| WorkerError::Spawn { name, source })
}
