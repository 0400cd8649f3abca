//! Newline-delimited JSON replay source
//!
//! Each non-empty line is one `EngineEvent`. Used for paper trading and for
//! replaying captured sessions without a live gRPC feed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::stream::events::EngineEvent;
use crate::stream::queue::EventQueue;
use crate::stream::EventSource;

pub struct JsonlReplaySource {
    path: PathBuf,
    interval: Option<Duration>,
}

impl JsonlReplaySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            interval: None,
        }
    }

    /// Pause between events
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

#[async_trait]
impl EventSource for JsonlReplaySource {
    async fn run(&self, queue: EventQueue, cancel: CancellationToken) -> Result<()> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0u64;
        let mut delivered = 0u64;
        let mut skipped = 0u64;

        info!("Replaying events from {}", self.path.display());

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<EngineEvent>(trimmed) {
                Ok(event) => {
                    if queue.push(event) {
                        delivered += 1;
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(line = line_no, "Skipping malformed replay event: {}", e);
                }
            }

            if let Some(interval) = self.interval {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        info!(delivered, skipped, "Replay finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_replay_pushes_events_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"type":"source","connected":true}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"type":"market","mint":"11111111111111111111111111111112","price":0.1,"sol_invested":2.0,"market_cap":9.0,"observed_at":"2024-05-01T12:00:00Z"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let (queue, rx) = EventQueue::bounded(16);
        JsonlReplaySource::new(file.path())
            .run(queue.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("source"));
        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("market"));
    }

    #[tokio::test]
    async fn test_paced_replay_stops_on_cancel() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..3 {
            writeln!(file, r#"{{"type":"source","connected":true}}"#).unwrap();
        }
        file.flush().unwrap();

        let (queue, _rx) = EventQueue::bounded(16);
        let cancel = CancellationToken::new();
        let source = JsonlReplaySource::new(file.path()).with_interval(Duration::from_millis(200));
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        let started = std::time::Instant::now();
        source.run(queue.clone(), cancel).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let (queue, _rx) = EventQueue::bounded(1);
        let result = JsonlReplaySource::new("/nonexistent/replay.jsonl")
            .run(queue, CancellationToken::new())
            .await;
        assert!(result.is_err());
    }
}
