use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Timed out waiting for the transaction gate")]
    TimedOut,

    #[error("Transaction gate is closed")]
    Closed,
}

/// Single-holder gate serializing transactions on the shared channel.
///
/// Waiting is bounded; a gate closed while a permit is out makes that
/// permit's release fail, so the holder learns the channel is going away.
pub struct TransactionGate {
    semaphore: Arc<Semaphore>,
    wait: Duration,
}

#[must_use = "dropping a permit releases the gate without reporting release errors"]
pub struct GatePermit {
    permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl TransactionGate {
    pub fn new(wait: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            wait,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let semaphore = Arc::clone(&self.semaphore);
        match tokio::time::timeout(self.wait, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(GatePermit {
                permit,
                semaphore: Arc::clone(&self.semaphore),
            }),
            Ok(Err(_)) => Err(GateError::Closed),
            Err(_) => Err(GateError::TimedOut),
        }
    }

    /// Refuse all further acquisitions. Outstanding permits fail on release.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

impl GatePermit {
    pub fn release(self) -> Result<(), GateError> {
        let closed = self.semaphore.is_closed();
        drop(self.permit);
        if closed {
            Err(GateError::Closed)
        } else {
            Ok(())
        }
    }
}
