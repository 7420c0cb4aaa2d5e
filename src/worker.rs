#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{anyhow, Context, Result as AnyResult};
use std::thread::{self, JoinHandle};

/// Joinable reference to a running worker thread.
///
/// A no-op handle stands for a worker that never started (cancelled
/// before it could, or nothing to do); joining it returns immediately.
#[must_use = "a worker handle should be joined"]
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    thread: Option<JoinHandle<AnyResult<()>>>,
}

impl WorkerHandle {
    pub fn spawn<F>(name: impl Into<String>, body: F) -> AnyResult<Self>
    where
        F: FnOnce() -> AnyResult<()> + Send + 'static,
    {
        let name = name.into();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .with_context(|| format!("spawn worker {name}"))?;
        Ok(Self {
            name,
            thread: Some(thread),
        })
    }

    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_noop(&self) -> bool {
        self.thread.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the worker has terminated and returns its outcome.
    pub fn join(self) -> AnyResult<()> {
        match self.thread {
            None => Ok(()),
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("worker {} panicked", self.name))?,
        }
    }
}
