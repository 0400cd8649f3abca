//! Two-lane bounded ingestion queue
//!
//! Wallet trades, market ticks and source status travel in the priority lane;
//! candidates in the normal lane. Pushing never blocks. A full normal lane
//! evicts its oldest candidate to make room; a full priority lane drops the
//! incoming event. Every loss is counted. Consumers always drain the priority
//! lane first.

use async_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::stream::events::EngineEvent;

/// Counters shared by producers and consumers
#[derive(Debug, Default)]
pub struct QueueStats {
    pub pushed: AtomicU64,
    pub dropped_priority: AtomicU64,
    pub dropped_normal: AtomicU64,
}

impl QueueStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_priority.load(Ordering::Relaxed) + self.dropped_normal.load(Ordering::Relaxed)
    }
}

/// Producer half
#[derive(Clone)]
pub struct EventQueue {
    priority: Sender<EngineEvent>,
    normal: Sender<EngineEvent>,
    /// Used to evict from the head of the normal lane
    evict: Receiver<EngineEvent>,
    stats: Arc<QueueStats>,
}

/// Consumer half, cloned once per worker
#[derive(Clone)]
pub struct EventReceiver {
    priority: Receiver<EngineEvent>,
    normal: Receiver<EngineEvent>,
}

impl EventQueue {
    /// Create a queue with `capacity` slots per lane
    pub fn bounded(capacity: usize) -> (Self, EventReceiver) {
        let (ptx, prx) = async_channel::bounded(capacity.max(1));
        let (ntx, nrx) = async_channel::bounded(capacity.max(1));
        (
            Self {
                priority: ptx,
                normal: ntx,
                evict: nrx.clone(),
                stats: Arc::new(QueueStats::default()),
            },
            EventReceiver {
                priority: prx,
                normal: nrx,
            },
        )
    }

    /// Push without blocking; returns false if the incoming event was dropped
    pub fn push(&self, event: EngineEvent) -> bool {
        if event.is_priority() {
            return match self.priority.try_send(event) {
                Ok(()) => self.accepted(),
                Err(TrySendError::Full(event)) => {
                    self.count_drop(&self.stats.dropped_priority, &event);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            };
        }

        let mut event = event;
        loop {
            match self.normal.try_send(event) {
                Ok(()) => return self.accepted(),
                Err(TrySendError::Full(back)) => {
                    // A worker may have drained the lane since the failed send
                    if let Ok(oldest) = self.evict.try_recv() {
                        self.count_drop(&self.stats.dropped_normal, &oldest);
                    }
                    event = back;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
    }

    fn accepted(&self) -> bool {
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn count_drop(&self, counter: &AtomicU64, event: &EngineEvent) {
        let dropped = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped.is_power_of_two() {
            warn!(kind = event.kind(), dropped, "Ingest lane full, dropping events");
        } else {
            debug!(kind = event.kind(), "Dropped event due to backpressure");
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        self.stats.clone()
    }

    /// Close both lanes; workers finish what is queued and stop
    pub fn close(&self) {
        self.priority.close();
        self.normal.close();
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventReceiver {
    /// Next event, priority lane first; `None` once both lanes are closed and empty
    pub async fn recv(&self) -> Option<EngineEvent> {
        loop {
            if let Ok(event) = self.priority.try_recv() {
                return Some(event);
            }
            if let Ok(event) = self.normal.try_recv() {
                return Some(event);
            }

            let priority_done = self.priority.is_closed() && self.priority.is_empty();
            let normal_done = self.normal.is_closed() && self.normal.is_empty();
            match (priority_done, normal_done) {
                (true, true) => return None,
                (true, false) => return self.normal.recv().await.ok(),
                (false, true) => return self.priority.recv().await.ok(),
                (false, false) => {}
            }

            // Both empty: wait for whichever lane produces next
            tokio::select! {
                biased;
                event = self.priority.recv() => {
                    if let Ok(event) = event {
                        return Some(event);
                    }
                }
                event = self.normal.recv() => {
                    if let Ok(event) = event {
                        return Some(event);
                    }
                }
            }
        }
    }
}
