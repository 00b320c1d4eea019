//! Call Module
//!
//! A deferred computation and the executors that can run it.
//!
//! ```text
//! collection.get_async(1)          Call<Option<T>>  (nothing runs yet)
//!       │
//!       ├── .now()                  run on the calling thread, return Result<T>
//!       │
//!       └── .execute_on(exec)
//!              .get(callback)       submit to exec; callback(Result<T>) runs there
//! ```
//!
//! The engine owns no threads. An [`Executor`] is always supplied by the
//! caller.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::error::{Result, StashError};

/// Unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// A computation producing `Result<T>`, run on demand
pub struct Call<T> {
    action: Box<dyn FnOnce() -> Result<T> + Send + 'static>,
    executor: Option<Arc<dyn Executor>>,
}

impl<T: Send + 'static> Call<T> {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self {
            action: Box::new(action),
            executor: None,
        }
    }

    /// Run on the calling thread
    pub fn now(self) -> Result<T> {
        (self.action)()
    }

    /// Choose the executor used by [`Call::get`]
    pub fn execute_on(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Submit to the executor; `callback` receives the outcome there
    ///
    /// Fails without running anything if no executor was chosen.
    pub fn get<F>(self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let executor = self
            .executor
            .ok_or_else(|| StashError::Config("executor is not specified".to_string()))?;

        let action = self.action;
        executor.execute(Box::new(move || callback(action())));
        Ok(())
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("has_executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Executors
// =============================================================================

/// Runs each job immediately on the submitting thread
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job()
    }
}

/// One background worker running jobs in submission order
///
/// Dropping the executor lets queued jobs finish, then joins the worker.
pub struct ThreadExecutor {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadExecutor {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker = thread::Builder::new()
            .name("stashkv-call".to_string())
            .spawn(move || {
                for job in receiver {
                    job();
                }
                tracing::debug!("call worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            tracing::warn!("call worker is gone; job dropped");
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("call worker panicked");
            }
        }
    }
}

impl fmt::Debug for ThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadExecutor")
            .field("running", &self.worker.is_some())
            .finish()
    }
}
