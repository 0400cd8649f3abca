//! Session controller
//!
//! Wires filter decisions and mirrored trades through the buy gate (trading
//! window, source health, daily budget) into the router, opens positions on
//! fills and drives their exits. Positions are serialized through their own
//! pending-sell state, so a position lock is never held across a submission.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use solana_sdk::native_token::sol_to_lamports;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{Config, StageConfig};
use crate::error::{Error, Result};
use crate::filter::{Blacklist, ReviewGate, TokenCandidate, TokenFilter};
use crate::mirror::{CopyTradeMirror, MirrorAction, HOLDING_TTL_HOURS};
use crate::notify::{Alert, Notifier};
use crate::position::{
    ExitPolicy, ExitReason, ExitScheduler, Position, PositionBook, PositionHandle, PositionState,
    SellOrder, Wake, WakeKind,
};
use crate::session::budget::Budget;
use crate::session::window::{TimeWindow, WindowTransition, WindowWatch};
use crate::stream::events::{EngineEvent, MarketUpdate, SourceStatus, WalletTrade};
use crate::trading::{ExecutionRouter, IntentFactory, IntentMode, IntentOrigin, Side, VenueResult};

/// Base units per whole pump.fun token
pub const TOKEN_DECIMALS_FACTOR: f64 = 1_000_000.0;

/// Token base units bought for `lamports` at `price` SOL per token
pub fn estimate_tokens(lamports: u64, price: f64) -> u64 {
    if price <= 0.0 || !price.is_finite() {
        return 0;
    }
    (lamports as f64 / 1e9 / price * TOKEN_DECIMALS_FACTOR).floor() as u64
}

/// Counters for the session summary
#[derive(Debug, Default)]
pub struct SessionStats {
    pub candidates: AtomicU64,
    pub buys: AtomicU64,
    pub buy_failures: AtomicU64,
    pub gate_refusals: AtomicU64,
    pub sells: AtomicU64,
    pub sell_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub candidates: u64,
    pub buys: u64,
    pub buy_failures: u64,
    pub gate_refusals: u64,
    pub sells: u64,
    pub sell_failures: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            candidates: self.candidates.load(Ordering::Relaxed),
            buys: self.buys.load(Ordering::Relaxed),
            buy_failures: self.buy_failures.load(Ordering::Relaxed),
            gate_refusals: self.gate_refusals.load(Ordering::Relaxed),
            sells: self.sells.load(Ordering::Relaxed),
            sell_failures: self.sell_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct SessionController {
    filter: TokenFilter,
    blacklist: Blacklist,
    review: ReviewGate,
    mirror: CopyTradeMirror,
    router: Arc<ExecutionRouter>,
    intents: IntentFactory,
    budget: Arc<Budget>,
    window: Mutex<WindowWatch>,
    source_healthy: AtomicBool,
    /// Observation time of the last applied source status
    source_seen: Mutex<Option<DateTime<Utc>>>,
    book: PositionBook,
    scheduler: Arc<ExitScheduler>,
    policy: ExitPolicy,
    stages: Vec<StageConfig>,
    notifier: Arc<dyn Notifier>,
    buying: DashSet<Pubkey>,
    /// Last observed price per mint and when it was seen
    prices: DashMap<Pubkey, (f64, Instant)>,
    stats: SessionStats,
    threshold_buy: u64,
    threshold_sell: u64,
    buy_lamports: u64,
    inverse_buy_lamports: Option<u64>,
    young_token_age: Duration,
    young_token_cap: u64,
    staleness: chrono::Duration,
    price_ttl: Duration,
}

impl SessionController {
    pub fn new(
        config: &Config,
        router: Arc<ExecutionRouter>,
        scheduler: Arc<ExitScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let advanced = &config.advanced;
        let window = TimeWindow::from_config(&config.timer);
        if window.enabled {
            info!("Trading window: {} (auto sell on stop: {})", window, window.auto_sell_on_stop);
        }

        Self {
            filter: TokenFilter::new(
                config.filters.clone(),
                advanced.min_buy_confidence,
                advanced.min_sell_confidence,
            ),
            blacklist: Blacklist::from_keys(config.blacklist.iter().copied()),
            review: ReviewGate::new(
                Duration::from_millis(advanced.review_cycle_ms),
                advanced.price_delta_threshold_pct,
            ),
            mirror: CopyTradeMirror::from_config(&config.copy_trading),
            router,
            intents: IntentFactory::new(config),
            budget: Arc::new(Budget::new(sol_to_lamports(advanced.daily_buy_budget_sol))),
            window: Mutex::new(WindowWatch::new(window, chrono::Local::now().time())),
            source_healthy: AtomicBool::new(true),
            source_seen: Mutex::new(None),
            book: PositionBook::new(),
            scheduler,
            policy: ExitPolicy::from_config(&config.exit),
            stages: config.exit.stages.clone(),
            notifier,
            buying: DashSet::new(),
            prices: DashMap::new(),
            stats: SessionStats::default(),
            threshold_buy: config.trading.threshold_buy,
            threshold_sell: config.trading.threshold_sell,
            buy_lamports: sol_to_lamports(config.trading.token_amount_sol),
            inverse_buy_lamports: config
                .inverse_buy
                .enabled
                .then(|| sol_to_lamports(config.inverse_buy.amount_sol)),
            young_token_age: Duration::from_millis(advanced.limit_wait_time_ms),
            young_token_cap: sol_to_lamports(advanced.limit_buy_amount_sol),
            staleness: chrono::Duration::seconds(advanced.time_delta_threshold_secs as i64),
            price_ttl: Duration::from_secs(advanced.time_delta_threshold_secs),
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn budget(&self) -> &Arc<Budget> {
        &self.budget
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_source_healthy(&self) -> bool {
        self.source_healthy.load(Ordering::Acquire)
    }

    pub async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Candidate(candidate) => self.on_candidate(&candidate).await,
            EngineEvent::WalletTrade(trade) => self.on_wallet_trade(&trade).await,
            EngineEvent::Market(update) => self.on_market(&update).await,
            EngineEvent::Source(status) => self.on_source(&status).await,
        }
    }

    async fn on_candidate(&self, candidate: &TokenCandidate) {
        self.stats.candidates.fetch_add(1, Ordering::Relaxed);
        if candidate.price > 0.0 {
            self.prices.insert(candidate.mint, (candidate.price, Instant::now()));
        }

        if let Some(handle) = self.live_position(&candidate.mint).await {
            self.review_held(handle, candidate).await;
            return;
        }

        if let Some(key) = self.blacklist.blocks(candidate) {
            debug!("Token {} skipped: {} is blacklisted", candidate.mint, key);
            return;
        }

        let sol_invested = candidate.sol_invested_lamports();
        if sol_invested < self.threshold_buy {
            debug!(
                "{} not eligible: {} lamports invested < THRESHOLD_BUY {}",
                candidate.mint, sol_invested, self.threshold_buy
            );
            return;
        }

        let decision = self.filter.evaluate(candidate);
        let (lamports, origin) = if self.filter.is_buy(&decision) {
            info!(
                "Token {} passed filters (confidence {:.2})",
                candidate.mint, decision.confidence
            );
            let lamports = if Duration::from_millis(candidate.age_ms()) < self.young_token_age {
                self.buy_lamports.min(self.young_token_cap)
            } else {
                self.buy_lamports
            };
            (lamports, IntentOrigin::Filter)
        } else if !decision.accept {
            let reasons: Vec<String> = decision
                .reasons
                .iter()
                .map(|r| r.to_string())
                .collect();
            debug!("Token {} filtered out: {}", candidate.mint, reasons.join("; "));
            match self.inverse_buy_lamports {
                Some(lamports) => {
                    info!("Inverse buy on rejected token {}", candidate.mint);
                    (lamports, IntentOrigin::InverseBuy)
                }
                None => return,
            }
        } else {
            debug!(
                "Token {} accepted below buy confidence ({:.2})",
                candidate.mint, decision.confidence
            );
            return;
        };

        if let Err(e) = self.buy(candidate.mint, lamports, candidate.price, origin).await {
            self.log_buy_error(&candidate.mint, &e);
        }
    }

    /// Fresh snapshot of a held token: threshold sell, price triggers, then deterioration
    async fn review_held(&self, handle: PositionHandle, candidate: &TokenCandidate) {
        let now = Instant::now();
        let order = {
            let mut position = handle.lock().await;
            let mut order = None;
            position.record_price(candidate.price);
            if candidate.sol_invested_lamports() >= self.threshold_sell {
                info!("{} reached THRESHOLD_SELL, exiting fully", candidate.mint);
                order = position.on_threshold_sell();
            }
            if order.is_none() {
                order = position.on_price(&self.policy, candidate.price);
            }
            if order.is_none() && self.review.should_review(&candidate.mint, candidate.price, now) {
                if let Some(sell_confidence) = self.filter.deterioration(candidate) {
                    info!(
                        "Signals deteriorated for {} (sell confidence {:.2})",
                        candidate.mint, sell_confidence
                    );
                    order = position.on_deterioration(&self.policy);
                }
            }
            order
        };

        if let Some(order) = order {
            self.execute_sell(handle, order).await;
        }
    }

    async fn on_market(&self, update: &MarketUpdate) {
        let age = chrono::Utc::now() - update.observed_at;
        if age > self.staleness {
            debug!("Ignoring stale market update for {} ({}s old)", update.mint, age.num_seconds());
            return;
        }
        if update.price > 0.0 {
            self.prices.insert(update.mint, (update.price, Instant::now()));
        }

        let Some(handle) = self.live_position(&update.mint).await else {
            return;
        };
        let order = {
            let mut position = handle.lock().await;
            position.record_price(update.price);
            if update.sol_invested_lamports() >= self.threshold_sell {
                info!("{} reached THRESHOLD_SELL, exiting fully", update.mint);
                position
                    .on_threshold_sell()
                    .or_else(|| position.on_price(&self.policy, update.price))
            } else {
                position.on_price(&self.policy, update.price)
            }
        };
        if let Some(order) = order {
            self.execute_sell(handle, order).await;
        }
    }

    async fn on_wallet_trade(&self, trade: &WalletTrade) {
        let Some(action) = self.mirror.observe(trade) else {
            return;
        };

        match action {
            MirrorAction::Buy {
                wallet,
                mint,
                lamports,
            } => {
                if self.blacklist.contains(&mint) {
                    debug!("Not mirroring buy of {} by {}: blacklisted", mint, wallet);
                    return;
                }
                let price = if trade.token_amount > 0 {
                    (trade.lamports as f64 / 1e9) / (trade.token_amount as f64 / TOKEN_DECIMALS_FACTOR)
                } else {
                    self.prices.get(&mint).map(|p| p.0).unwrap_or(0.0)
                };
                info!("Mirroring buy of {} by {} ({} lamports)", mint, wallet, lamports);
                if let Err(e) = self.buy(mint, lamports, price, IntentOrigin::CopyTrade { wallet }).await {
                    self.log_buy_error(&mint, &e);
                }
            }
            MirrorAction::Sell {
                wallet,
                mint,
                fraction,
            } => {
                let Some(handle) = self.live_position(&mint).await else {
                    return;
                };
                let order = {
                    let mut position = handle.lock().await;
                    if !matches!(position.origin, IntentOrigin::CopyTrade { .. }) {
                        debug!("Target {} sold {} but our position is not mirrored", wallet, mint);
                        return;
                    }
                    position.partial_exit(fraction, ExitReason::CopyTrade)
                };
                match order {
                    Some(order) => {
                        info!(
                            "Mirroring sell of {:.0}% of {} after {}",
                            fraction * 100.0,
                            mint,
                            wallet
                        );
                        self.execute_sell(handle, order).await;
                    }
                    None => debug!("Mirrored sell of {} skipped: a sell is already pending", mint),
                }
            }
        }
    }

    async fn on_source(&self, status: &SourceStatus) {
        let was = {
            let mut seen = self.source_seen.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*seen, Some(last) if status.observed_at < last) {
                debug!(
                    "Ignoring out-of-order source status (connected: {}) from {}",
                    status.connected, status.observed_at
                );
                return;
            }
            *seen = Some(status.observed_at);
            self.source_healthy.swap(status.connected, Ordering::AcqRel)
        };
        if was == status.connected {
            return;
        }
        let alert = if status.connected {
            info!("Event source reconnected, buys resumed");
            Alert::SourceUp
        } else {
            warn!(
                "Event source disconnected ({}), buys paused",
                status.detail.as_deref().unwrap_or("no detail")
            );
            Alert::SourceDown {
                detail: status.detail.clone(),
            }
        };
        self.send_alert(alert).await;
    }

    /// Gate, reserve, submit, and open a position on success
    pub async fn buy(&self, mint: Pubkey, lamports: u64, price: f64, origin: IntentOrigin) -> Result<()> {
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::Internal(format!("no price for {}", mint)));
        }
        let tokens = estimate_tokens(lamports, price);
        if tokens == 0 {
            return Err(Error::OrderTooSmall(format!(
                "{} lamports of {} at {} SOL per token buys no tokens",
                lamports, mint, price
            )));
        }
        if !self.buying.insert(mint) {
            return Err(Error::PositionExists(mint.to_string()));
        }
        if self.live_position(&mint).await.is_some() {
            self.buying.remove(&mint);
            return Err(Error::PositionExists(mint.to_string()));
        }
        let result = self.gated_buy(mint, lamports, tokens, price, origin).await;
        self.buying.remove(&mint);
        result
    }

    async fn gated_buy(
        &self,
        mint: Pubkey,
        lamports: u64,
        tokens: u64,
        price: f64,
        origin: IntentOrigin,
    ) -> Result<()> {
        if !self.window_open() {
            return Err(Error::OutsideTradingWindow);
        }
        if !self.is_source_healthy() {
            return Err(Error::IngestPaused);
        }
        let reservation = self.budget.reserve(lamports)?;

        let intent = self.intents.buy(mint, lamports, IntentMode::Normal, origin);
        info!(
            intent = %intent.id,
            "Buying {} for {:.4} SOL ({})",
            mint,
            lamports as f64 / 1e9,
            origin
        );

        let filled = match self.router.submit(&intent).await {
            Ok(result) => result,
            Err(e) => {
                reservation.rollback();
                self.stats.buy_failures.fetch_add(1, Ordering::Relaxed);
                if let Error::AllVenuesFailed { attempts, .. } = &e {
                    self.send_alert(Alert::AllVenuesFailed {
                        mint,
                        side: Side::Buy,
                        attempts: attempts.len(),
                    })
                    .await;
                }
                return Err(e);
            }
        };
        reservation.commit();
        self.stats.buys.fetch_add(1, Ordering::Relaxed);

        let position = Position::open(
            mint,
            tokens,
            price,
            Instant::now(),
            &self.stages,
            self.policy.strategy,
            origin,
        );
        let next_due = position.next_stage_due();
        self.book.open(position).await?;
        if let Some(at) = next_due {
            self.scheduler.schedule(mint, at, WakeKind::StageDue);
        }

        self.log_fill(&filled, "buy", &mint);
        self.send_alert(Alert::BuyFilled {
            mint,
            lamports,
            venue: filled.venue,
            origin,
        })
        .await;
        Ok(())
    }

    /// Exit timer fired for a position
    pub async fn on_wake(&self, wake: Wake) {
        let Some(handle) = self.live_position(&wake.mint).await else {
            return;
        };
        let order = {
            let mut position = handle.lock().await;
            let now = Instant::now();
            match wake.kind {
                WakeKind::StageDue => position.on_tick(&self.policy, now),
                WakeKind::Retry => position.retry_due(now),
            }
        };
        if let Some(order) = order {
            self.execute_sell(handle, order).await;
        }
    }

    /// Check the trading window; leaving it liquidates when AUTO_SELL_ON_STOP is set
    pub async fn check_window(&self) {
        let (transition, auto_sell) = {
            let mut watch = self.window.lock().unwrap_or_else(|e| e.into_inner());
            (
                watch.check(chrono::Local::now().time()),
                watch.window().auto_sell_on_stop,
            )
        };
        match transition {
            Some(WindowTransition::Closed) => {
                info!("Trading window closed, buys stopped");
                if auto_sell {
                    self.liquidate_all(ExitReason::TimerStop).await;
                }
            }
            Some(WindowTransition::Opened) => info!("Trading window opened, buys allowed"),
            None => {}
        }
    }

    fn window_open(&self) -> bool {
        self.window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .window()
            .is_open_now()
    }

    /// Force-liquidate every live position, all mints at once
    pub async fn liquidate_all(&self, reason: ExitReason) {
        let mints = self.book.mints();
        if mints.is_empty() {
            return;
        }
        warn!("Liquidating {} positions ({})", mints.len(), reason);

        join_all(mints.into_iter().map(|mint| self.liquidate(mint, reason))).await;
    }

    async fn liquidate(&self, mint: Pubkey, reason: ExitReason) {
        let Some(handle) = self.live_position(&mint).await else {
            return;
        };
        let order = handle.lock().await.force_exit(reason);
        self.send_alert(Alert::ForcedLiquidation { mint, reason }).await;
        if let Some(order) = order {
            self.execute_sell(handle, order).await;
        }
    }

    /// Forget prices, ledger entries and target holdings nobody needs any more
    pub fn housekeeping(&self) {
        let now = Instant::now();
        let before = self.prices.len();
        self.prices
            .retain(|_, (_, seen)| now.saturating_duration_since(*seen) < self.price_ttl);
        let prices = before - self.prices.len();
        let signatures = self.router.ledger().prune(now);
        let holdings = self
            .mirror
            .prune(Utc::now(), chrono::Duration::hours(HOLDING_TTL_HOURS));
        debug!(
            prices,
            signatures,
            holdings,
            "Housekeeping dropped idle entries"
        );
    }

    pub fn tracked_prices(&self) -> usize {
        self.prices.len()
    }

    /// Submit a sell and apply the outcome; deferred liquidations follow immediately
    async fn execute_sell(&self, handle: PositionHandle, mut order: SellOrder) {
        loop {
            let intent = self.intents.sell(
                order.mint,
                order.tokens,
                order.mode(),
                IntentOrigin::Exit(order.reason),
            );
            info!(
                intent = %intent.id,
                "Selling {} tokens of {} ({}{})",
                order.tokens,
                order.mint,
                order.reason,
                if order.retry { ", retry" } else { "" }
            );
            let result = self.router.submit(&intent).await;

            match result {
                Ok(filled) => {
                    self.stats.sells.fetch_add(1, Ordering::Relaxed);
                    let (follow_up, next_due, terminal, entry_price, exit_price) = {
                        let mut position = handle.lock().await;
                        let follow_up = position.on_sell_filled(order.tokens);
                        (
                            follow_up,
                            position.next_stage_due(),
                            position.is_terminal(),
                            position.entry_price,
                            position.last_price,
                        )
                    };

                    let pnl_sol = order.tokens as f64 / TOKEN_DECIMALS_FACTOR * (exit_price - entry_price);
                    self.book.record_trade(pnl_sol);

                    self.log_fill(&filled, "sell", &order.mint);
                    self.send_alert(Alert::SellFilled {
                        mint: order.mint,
                        tokens: order.tokens,
                        venue: filled.venue,
                        reason: order.reason,
                    })
                    .await;

                    if let Some(at) = next_due {
                        self.scheduler.schedule(order.mint, at, WakeKind::StageDue);
                    }
                    if terminal {
                        self.review.forget(&order.mint);
                        self.prices.remove(&order.mint);
                        self.book.remove_if_closed(&order.mint).await;
                    }

                    match follow_up {
                        Some(next) => {
                            if next.completion == PositionState::ForceLiquidated {
                                self.send_alert(Alert::ForcedLiquidation {
                                    mint: next.mint,
                                    reason: next.reason,
                                })
                                .await;
                            }
                            order = next;
                        }
                        None => return,
                    }
                }
                Err(e) => {
                    self.stats.sell_failures.fetch_add(1, Ordering::Relaxed);
                    let failure = Error::StageSellFailure {
                        mint: order.mint.to_string(),
                        stage: order.stage.map(|k| k + 1).unwrap_or(0),
                        reason: e.to_string(),
                    };
                    warn!("{}", failure);

                    let action = handle.lock().await.on_sell_failed(&self.policy, Instant::now());
                    let Some(action) = action else {
                        return;
                    };
                    self.scheduler.schedule(order.mint, action.retry_at, WakeKind::Retry);

                    if action.escalate {
                        error!(
                            "Sell of {} ({}) failing for {}s, escalating and retrying",
                            order.mint,
                            order.reason,
                            action.failing_for.as_secs()
                        );
                        self.send_alert(Alert::StageEscalation {
                            mint: order.mint,
                            reason: order.reason,
                            failing_for: action.failing_for,
                        })
                        .await;
                    }
                    return;
                }
            }
        }
    }

    async fn live_position(&self, mint: &Pubkey) -> Option<PositionHandle> {
        let handle = self.book.get(mint)?;
        let terminal = handle.lock().await.is_terminal();
        (!terminal).then_some(handle)
    }

    fn log_fill(&self, result: &VenueResult, side: &str, mint: &Pubkey) {
        info!(
            venue = %result.venue,
            latency_ms = result.latency.as_millis() as u64,
            signature = ?result.signature,
            "{} {} landed",
            side,
            mint
        );
    }

    fn log_buy_error(&self, mint: &Pubkey, e: &Error) {
        if e.is_gate_refusal() {
            self.stats.gate_refusals.fetch_add(1, Ordering::Relaxed);
            info!("Buy of {} refused: {}", mint, e);
        } else if matches!(e, Error::PositionExists(_)) {
            debug!("Buy of {} skipped: {}", mint, e);
        } else {
            warn!("Buy of {} failed: {}", mint, e);
        }
    }

    async fn send_alert(&self, alert: Alert) {
        if let Err(e) = self.notifier.notify(alert).await {
            warn!("Notification failed: {}", e);
        }
    }
}
