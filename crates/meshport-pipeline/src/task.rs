//! Task handles for asynchronous pipeline operations
//!
//! `load` and `convert` return immediately with a [`PipelineTask`]; the
//! result arrives when the worker finishes. Completion is additionally
//! broadcast on the pipeline event channel, so a presentation layer can
//! ignore the handle entirely and drive itself from notifications.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use meshport_core::{Error, Result};

/// Handle to one in-flight (or already settled) pipeline operation
pub struct PipelineTask<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> PipelineTask<T> {
    /// Create a task plus the sender its result will arrive on
    pub(crate) fn channel() -> (Sender<Result<T>>, Self) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (sender, Self { receiver })
    }

    /// Create a task that has already settled
    pub(crate) fn settled(result: Result<T>) -> Self {
        let (sender, task) = Self::channel();
        // The receiver is held by `task`, so this send cannot fail.
        let _ = sender.send(result);
        task
    }

    /// Block until the operation settles
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().unwrap_or(Err(Error::Cancelled))
    }

    /// Block up to `timeout`; `None` means still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::Cancelled)),
        }
    }

    /// Poll without blocking; `None` means still running
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::Cancelled)),
        }
    }
}
