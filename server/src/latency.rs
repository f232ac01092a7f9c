//! Artificial network latency as a per-connection delay line
//!
//! Every item pushed into a [`DelayLine`] is stamped with a due time and
//! released by a background task once that time has passed. Items keep
//! their order and each connection has its own task, so one client's delay
//! never holds up another client or the simulation tick.

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The queue is at capacity; the consumer is not keeping up.
    Full,
    /// The consumer has gone away.
    Closed,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full => write!(f, "delay line is full"),
            PushError::Closed => write!(f, "delay line is closed"),
        }
    }
}

impl std::error::Error for PushError {}

#[derive(Debug)]
pub struct DelayLine<T> {
    delay: Duration,
    pending: mpsc::Sender<(Instant, T)>,
}

impl<T> Clone for DelayLine<T> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            pending: self.pending.clone(),
        }
    }
}

impl<T: Send + 'static> DelayLine<T> {
    /// Spawns the release task and returns the producer half plus the
    /// receiver that yields items once their delay has elapsed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(delay: Duration, capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (pending_tx, mut pending_rx) = mpsc::channel::<(Instant, T)>(capacity);
        let (ready_tx, ready_rx) = mpsc::channel(capacity);

        tokio::spawn(async move {
            while let Some((due, item)) = pending_rx.recv().await {
                sleep_until(due).await;
                if ready_tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        (
            Self {
                delay,
                pending: pending_tx,
            },
            ready_rx,
        )
    }
}

impl<T> DelayLine<T> {
    /// Queues an item without waiting.
    pub fn push(&self, item: T) -> Result<(), PushError> {
        self.pending
            .try_send((Instant::now() + self.delay, item))
            .map_err(|e| match e {
                TrySendError::Full(_) => PushError::Full,
                TrySendError::Closed(_) => PushError::Closed,
            })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
