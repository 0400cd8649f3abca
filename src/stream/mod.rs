//! Stream module - event ingestion
//!
//! The live Yellowstone gRPC client lives outside this crate; it only has to
//! implement [`EventSource`] and push decoded events into the queue.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub mod events;
pub mod queue;
pub mod replay;

pub use events::{EngineEvent, MarketUpdate, SourceStatus, WalletTrade};
pub use queue::{EventQueue, EventReceiver, QueueStats};
pub use replay::JsonlReplaySource;

/// Producer of engine events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Push events until the source is exhausted or `cancel` fires
    async fn run(&self, queue: EventQueue, cancel: CancellationToken) -> Result<()>;
}
