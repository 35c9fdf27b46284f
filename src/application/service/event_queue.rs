// src/application/service/event_queue.rs
// Bounded FIFO between the feed connection and the worker pool

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::domain::model::TradeEvent;

/// Result of a non-blocking submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Enqueued,
    /// Queue at capacity; the event was discarded and counted.
    Dropped,
    /// Queue closed for shutdown; the event was discarded.
    Closed,
}

/// Fixed-capacity trade queue.
///
/// Producers never wait: a full queue drops the event. Consumers await
/// [`EventQueue::take_next`] until an event arrives or the queue is closed,
/// after which the remaining events are drained and `None` is returned.
#[derive(Debug)]
pub struct EventQueue {
    sender: mpsc::Sender<TradeEvent>,
    receiver: Mutex<mpsc::Receiver<TradeEvent>>,
    capacity: usize,
    closed: CancellationToken,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
            closed: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn submit(&self, event: TradeEvent) -> SubmitOutcome {
        if self.closed.is_cancelled() {
            log::debug!("Event queue closed, discarding event: {}", event);
            return SubmitOutcome::Closed;
        }

        match self.sender.try_send(event) {
            Ok(()) => SubmitOutcome::Enqueued,
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "Event queue is full ({}), dropping event: {} (total dropped: {})",
                    self.capacity,
                    event,
                    dropped
                );
                SubmitOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                log::debug!("Event queue closed, discarding event: {}", event);
                SubmitOutcome::Closed
            }
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn take_next(&self) -> Option<TradeEvent> {
        let mut receiver = self.receiver.lock().await;

        if self.closed.is_cancelled() {
            return receiver.try_recv().ok();
        }

        tokio::select! {
            biased;
            event = receiver.recv() => event,
            () = self.closed.cancelled() => receiver.try_recv().ok(),
        }
    }

    /// Stop accepting events and wake blocked consumers so they can drain
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Events currently buffered. Advisory only.
    pub fn size(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.sender.capacity() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
