//! Bounded handoff between a receive loop and a slower consumer.
//!
//! The producer never blocks: when the queue is full the item is dropped and
//! counted, so a stalled consumer cannot back-pressure the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{FragmentError, Result};

/// Create a handoff queue holding at most `capacity` items.
pub fn bounded<T>(capacity: usize) -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        HandoffSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        HandoffReceiver { rx, dropped },
    )
}

#[derive(Debug)]
pub struct HandoffSender<T> {
    tx: mpsc::SyncSender<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Queue `item` without blocking.
    pub fn offer(&self, item: T) -> Result<()> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "handoff queue full, dropping item");
                Err(FragmentError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(FragmentError::QueueClosed),
        }
    }

    /// Items dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> HandoffReceiver<T> {
    /// Block until an item arrives. `None` once every sender is gone and
    /// the queue is drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout`. `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(FragmentError::QueueClosed),
        }
    }

    pub fn try_recv(&self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FragmentError::QueueClosed),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
