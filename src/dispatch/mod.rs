//! Background-job dispatch with synchronous fallback.
//!
//! Write operations may run through an external queue. The contract is
//! fire-and-forget: the dispatcher reports whether the job was queued. On
//! queue failure the auto-fallback policy decides whether the operation runs
//! synchronously in the request or the error propagates to the caller.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors the queue backend can raise.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend is not configured")]
    NotConfigured,

    #[error("failed to enqueue job '{job}': {message}")]
    EnqueueFailed { job: String, message: String },
}

/// One job handed to the queue: a name and an opaque payload.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub payload: Value,
}

impl Job {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// External queue collaborator.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: &Job) -> Result<(), QueueError>;
}

/// How a dispatch was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// True when the job went to the queue; false when the fallback ran it
    /// synchronously.
    pub queued: bool,
}

/// Dispatches jobs to the queue, falling back to synchronous execution
/// when the auto-fallback policy allows it.
pub struct Dispatcher {
    queue: Option<std::sync::Arc<dyn JobQueue>>,
    auto_fallback: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Dispatcher {
    pub fn new(queue: Option<std::sync::Arc<dyn JobQueue>>) -> Self {
        Self {
            queue,
            auto_fallback: true,
        }
    }

    /// Disable the synchronous fallback: queue failures propagate instead.
    #[must_use]
    pub fn without_auto_fallback(mut self) -> Self {
        self.auto_fallback = false;
        self
    }

    /// Try to enqueue `job`.
    ///
    /// With auto-fallback enabled (the default) a missing or failing queue
    /// runs `fallback` in this request and reports `queued: false` — logged,
    /// never silent loss. With it disabled the queue error propagates.
    pub fn dispatch<F>(&self, job: Job, fallback: F) -> Result<DispatchOutcome, QueueError>
    where
        F: FnOnce(),
    {
        let err = match &self.queue {
            Some(queue) => match queue.enqueue(&job) {
                Ok(()) => {
                    debug!(job = %job.name, "job queued");
                    return Ok(DispatchOutcome { queued: true });
                }
                Err(err) => err,
            },
            None => QueueError::NotConfigured,
        };

        if !self.auto_fallback {
            return Err(err);
        }
        warn!(job = %job.name, %err, "queue unavailable, running synchronously");
        fallback();
        Ok(DispatchOutcome { queued: false })
    }
}
