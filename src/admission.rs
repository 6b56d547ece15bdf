//! Admission control
//!
//! Two independent pools bound how many operations run at once: one for
//! streaming calls (upload, download) and one for unary calls (list). A call
//! either gets a slot immediately or is rejected with `ResourceExhausted`;
//! nothing ever waits for a slot.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LimitsConfig;
use crate::error::{Result, TransferError, TOO_MANY_REQUESTS};

/// Non-blocking counting limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    name: &'static str,
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

/// A held slot; released exactly once when dropped, including on panic unwind
/// and when the owning future is cancelled.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Limiter {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Take a slot if one is free, otherwise fail immediately.
    pub fn try_acquire(&self) -> Result<Permit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(Permit { _permit: permit }),
            Err(_) => {
                tracing::warn!(
                    pool = self.name,
                    capacity = self.capacity,
                    "Rejecting request, too many concurrent requests"
                );
                Err(TransferError::ResourceExhausted(TOO_MANY_REQUESTS))
            }
        }
    }

    /// Run `operation` inside a slot; on rejection it is never polled.
    pub async fn run<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.try_acquire()?;
        operation.await
    }
}

/// Current pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionSnapshot {
    pub streaming_in_flight: usize,
    pub streaming_capacity: usize,
    pub unary_in_flight: usize,
    pub unary_capacity: usize,
}

/// Streaming and unary pools
#[derive(Debug, Clone)]
pub struct AdmissionController {
    streaming: Limiter,
    unary: Limiter,
}

impl AdmissionController {
    pub fn new(streaming: usize, unary: usize) -> Self {
        Self {
            streaming: Limiter::new("streaming", streaming),
            unary: Limiter::new("unary", unary),
        }
    }

    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(limits.streaming, limits.unary)
    }

    /// Pool for upload and download
    pub fn streaming(&self) -> &Limiter {
        &self.streaming
    }

    /// Pool for list
    pub fn unary(&self) -> &Limiter {
        &self.unary
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            streaming_in_flight: self.streaming.in_flight(),
            streaming_capacity: self.streaming.capacity(),
            unary_in_flight: self.unary.in_flight(),
            unary_capacity: self.unary.capacity(),
        }
    }
}
