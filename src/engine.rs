//! Engine runtime
//!
//! Owns the ingestion queue, the worker pool, the exit scheduler and the
//! trading-window ticker around one [`SessionController`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::position::{DailyStats, ExitScheduler, PositionSummary};
use crate::session::{SessionController, StatsSnapshot};
use crate::stream::{EventQueue, EventSource};
use crate::trading::{ExecutionRouter, TransactionSigner};

const WINDOW_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

/// End-of-run report
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSummary {
    pub stats: StatsSnapshot,
    pub daily: DailyStats,
    pub open_positions: usize,
    pub positions: Vec<PositionSummary>,
    pub dropped_events: u64,
    pub budget_spent_lamports: u64,
}

pub struct Engine {
    config: Config,
    controller: Arc<SessionController>,
    scheduler: Arc<ExitScheduler>,
    cancel: CancellationToken,
}

impl Engine {
    /// Build the engine; live mode needs a signer
    pub fn new(
        config: Config,
        signer: Option<Arc<dyn TransactionSigner>>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let mode = config.mode.trading_mode();
        if !mode.is_simulated() && signer.is_none() {
            return Err(Error::Signer(
                "live mode requires a transaction signer".to_string(),
            ));
        }
        let router = ExecutionRouter::from_config(&config, signer)?;
        Ok(Self::with_router(config, router, notifier))
    }

    pub fn with_router(config: Config, router: ExecutionRouter, notifier: Arc<dyn Notifier>) -> Self {
        let scheduler = Arc::new(ExitScheduler::new());
        let controller = Arc::new(SessionController::new(
            &config,
            Arc::new(router),
            scheduler.clone(),
            notifier,
        ));
        Self {
            config,
            controller,
            scheduler,
            cancel: CancellationToken::new(),
        }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// Token that stops the engine when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled, or until the source is exhausted and no position has an exit scheduled
    pub async fn run(&self, source: Arc<dyn EventSource>) -> Result<EngineSummary> {
        let workers = self.config.stream.worker_count.max(1);
        let (queue, receiver) = EventQueue::bounded(self.config.stream.queue_capacity);
        let background = self.cancel.child_token();

        info!(
            "Engine starting in {} mode with {} workers",
            self.config.mode.trading_mode(),
            workers
        );

        let mut worker_set = JoinSet::new();
        for id in 0..workers {
            let receiver = receiver.clone();
            let controller = self.controller.clone();
            let cancel = background.clone();
            worker_set.spawn(async move {
                loop {
                    let event = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        event = receiver.recv() => event,
                    };
                    let Some(event) = event else { break };
                    controller.handle_event(event).await;
                }
                debug!("Worker {} stopped", id);
            });
        }
        drop(receiver);

        let mut tasks = JoinSet::new();

        let (wake_tx, mut wake_rx) = mpsc::channel(1024);
        {
            let scheduler = self.scheduler.clone();
            let cancel = background.clone();
            tasks.spawn(async move { scheduler.run(wake_tx, cancel).await });
        }
        {
            let controller = self.controller.clone();
            tasks.spawn(async move {
                let mut sells = JoinSet::new();
                loop {
                    tokio::select! {
                        wake = wake_rx.recv() => {
                            let Some(wake) = wake else { break };
                            let controller = controller.clone();
                            sells.spawn(async move { controller.on_wake(wake).await });
                        }
                        Some(joined) = sells.join_next() => {
                            if let Err(e) = joined {
                                warn!("Wake task failed: {}", e);
                            }
                        }
                    }
                }
                while let Some(joined) = sells.join_next().await {
                    if let Err(e) = joined {
                        warn!("Wake task failed: {}", e);
                    }
                }
            });
        }
        {
            let controller = self.controller.clone();
            let cancel = background.clone();
            tasks.spawn(async move {
                let mut ticker = tokio::time::interval(WINDOW_CHECK_INTERVAL);
                let mut sweep = tokio::time::interval(HOUSEKEEPING_INTERVAL);
                sweep.tick().await;
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => controller.check_window().await,
                        _ = sweep.tick() => controller.housekeeping(),
                    }
                }
            });
        }

        let source_result = source.run(queue.clone(), background.clone()).await;
        if let Err(e) = &source_result {
            error!("Event source failed: {}", e);
        }
        queue.close();
        while let Some(joined) = worker_set.join_next().await {
            if let Err(e) = joined {
                warn!("Worker task failed: {}", e);
            }
        }
        info!("Event source finished, waiting for open positions to settle");

        // Positions left without a timer or a pending sell only move on new prices
        loop {
            let book = self.controller.book();
            if self.cancel.is_cancelled()
                || book.open_count().await == 0
                || !book.has_scheduled_exits().await
            {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(SETTLE_POLL_INTERVAL) => {}
            }
        }

        background.cancel();
        while tasks.join_next().await.is_some() {}

        let summary = EngineSummary {
            stats: self.controller.stats(),
            daily: self.controller.book().daily_stats(),
            open_positions: self.controller.book().open_count().await,
            positions: self.controller.book().summaries().await,
            dropped_events: queue.stats().dropped(),
            budget_spent_lamports: self.controller.budget().spent(),
        };
        info!(
            "Engine stopped: {} candidates, {} buys, {} sells, {} open positions, net {:.4} SOL",
            summary.stats.candidates,
            summary.stats.buys,
            summary.stats.sells,
            summary.open_positions,
            summary.daily.net_pnl_sol
        );

        source_result.map(|_| summary)
    }
}
