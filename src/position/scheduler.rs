//! Exit timers
//!
//! One min-heap for every position: stage deadlines and sell retries. The loop
//! sleeps until the nearest deadline or until a new entry is scheduled, then
//! hands due entries to the engine. Stale entries are harmless since the
//! position itself decides whether anything is due.

use solana_sdk::pubkey::Pubkey;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WakeKind {
    StageDue,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub mint: Pubkey,
    pub kind: WakeKind,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    at: Instant,
    seq: u64,
    mint: Pubkey,
    kind: WakeKind,
}

#[derive(Debug, Default)]
pub struct ExitScheduler {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    seq: AtomicU64,
    wakeup: Notify,
}

impl ExitScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, mint: Pubkey, at: Instant, kind: WakeKind) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Reverse(Entry { at, seq, mint, kind }));
        self.wakeup.notify_one();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop every entry due at `now`; returns them with the next pending deadline
    fn pop_due(&self, now: Instant) -> (Vec<Wake>, Option<Instant>) {
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = heap.peek() {
            if entry.at > now {
                break;
            }
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(Wake {
                    mint: entry.mint,
                    kind: entry.kind,
                });
            }
        }
        let next = heap.peek().map(|Reverse(e)| e.at);
        (due, next)
    }

    /// Run until cancelled or the receiver is gone
    pub async fn run(&self, tx: mpsc::Sender<Wake>, cancel: CancellationToken) {
        info!("Exit scheduler started");
        loop {
            let (due, next) = self.pop_due(Instant::now());
            for wake in due {
                debug!("Exit timer fired: {} {:?}", wake.mint, wake.kind);
                if tx.send(wake).await.is_err() {
                    debug!("Exit timer channel closed");
                    return;
                }
            }

            let sleep = async {
                match next {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.wakeup.notified() => {}
                _ = sleep => {}
            }
        }
        info!("Exit scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_pop_due_in_deadline_order() {
        let scheduler = ExitScheduler::new();
        let t0 = Instant::now();
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());

        scheduler.schedule(a, t0 + Duration::from_secs(3), WakeKind::StageDue);
        scheduler.schedule(b, t0 + Duration::from_secs(1), WakeKind::Retry);
        scheduler.schedule(c, t0 + Duration::from_secs(2), WakeKind::StageDue);

        let (due, next) = scheduler.pop_due(t0 + Duration::from_secs(2));
        assert_eq!(due.iter().map(|w| w.mint).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(due[0].kind, WakeKind::Retry);
        assert_eq!(next, Some(t0 + Duration::from_secs(3)));
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test]
    async fn test_run_wakes_for_new_earlier_entry() {
        let scheduler = Arc::new(ExitScheduler::new());
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let late = Pubkey::new_unique();
        let early = Pubkey::new_unique();
        scheduler.schedule(late, Instant::now() + Duration::from_secs(60), WakeKind::StageDue);

        let handle = {
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(tx, cancel).await })
        };

        // loop is asleep on the 60s entry; a nearer one must wake it
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.schedule(early, Instant::now() + Duration::from_millis(20), WakeKind::StageDue);

        let wake = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wake.mint, early);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(scheduler.len(), 1);
    }
}
