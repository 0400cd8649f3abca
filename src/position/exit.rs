//! Position and exit-stage state machine
//!
//! Pure state: every method takes the current `Instant` and returns the sell
//! order to dispatch, if any. The caller submits the order and reports the
//! outcome back through [`Position::on_sell_filled`] or
//! [`Position::on_sell_failed`]. At most one sell per position is pending at
//! any time, so duplicate ticks never fire a stage twice.
//!
//! ```text
//! Open -> PartiallyExited(k) -> FullyExited
//!   \___________________________> ForceLiquidated
//! ```

use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::{ExitStrategy, StageConfig};
use crate::position::auto_sell::{check_triggers, ExitPolicy, TriggerType};
use crate::trading::intent::{IntentMode, IntentOrigin};

/// Why a sell was issued
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitReason {
    StageDelay,
    Downing,
    SignalDeterioration,
    TakeProfit,
    StopLoss,
    ThresholdSell,
    TimerStop,
    CopyTrade,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::StageDelay => "stage_delay",
            ExitReason::Downing => "downing",
            ExitReason::SignalDeterioration => "signal_deterioration",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::ThresholdSell => "threshold_sell",
            ExitReason::TimerStop => "timer_stop",
            ExitReason::CopyTrade => "copy_trade",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Open,
    /// Number of consumed stages
    PartiallyExited(usize),
    FullyExited,
    ForceLiquidated,
}

impl PositionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionState::FullyExited | PositionState::ForceLiquidated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitStage {
    /// Percent of the remaining amount to sell
    pub percent: f64,
    /// Delay since entry
    pub delay: Duration,
    pub consumed: bool,
    /// Percent of the entry amount actually sold by this stage
    pub sold_pct_of_entry: f64,
}

/// A sell the caller should submit
#[derive(Debug, Clone, PartialEq)]
pub struct SellOrder {
    pub mint: Pubkey,
    pub tokens: u64,
    pub reason: ExitReason,
    /// Stage consumed when this order fills
    pub stage: Option<usize>,
    /// State reached if this order empties the position
    pub completion: PositionState,
    pub retry: bool,
}

impl SellOrder {
    /// Retries and forced liquidations use the longer limit deadline
    pub fn mode(&self) -> IntentMode {
        if self.retry || self.completion == PositionState::ForceLiquidated {
            IntentMode::Limit
        } else {
            IntentMode::Normal
        }
    }
}

/// What to do after a failed sell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureAction {
    pub retry_at: Instant,
    /// Failures have lasted past the escalation window (reported once)
    pub escalate: bool,
    pub failing_for: Duration,
}

#[derive(Debug, Clone)]
struct Pending {
    order: SellOrder,
    in_flight: bool,
    retry_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub mint: Pubkey,
    pub entry_amount: u64,
    pub remaining: u64,
    pub entry_time: Instant,
    pub entry_price: f64,
    pub peak_price: f64,
    pub last_price: f64,
    pub stages: Vec<ExitStage>,
    pub state: PositionState,
    pub origin: IntentOrigin,
    pending: Option<Pending>,
    forced_after: Option<ExitReason>,
    failing_since: Option<Instant>,
    escalated: bool,
}

impl Position {
    /// Open a position; stages are ordered by delay and only used in staged mode
    pub fn open(
        mint: Pubkey,
        entry_amount: u64,
        entry_price: f64,
        now: Instant,
        stages: &[StageConfig],
        strategy: ExitStrategy,
        origin: IntentOrigin,
    ) -> Self {
        let mut stages: Vec<ExitStage> = match strategy {
            ExitStrategy::Staged => stages
                .iter()
                .filter(|s| s.percent > 0.0)
                .map(|s| ExitStage {
                    percent: s.percent.min(100.0),
                    delay: Duration::from_millis(s.delay_ms),
                    consumed: false,
                    sold_pct_of_entry: 0.0,
                })
                .collect(),
            ExitStrategy::TakeProfitStopLoss => Vec::new(),
        };
        stages.sort_by_key(|s| s.delay);

        Self {
            mint,
            entry_amount,
            remaining: entry_amount,
            entry_time: now,
            entry_price,
            peak_price: entry_price,
            last_price: entry_price,
            stages,
            state: PositionState::Open,
            origin,
            pending: None,
            forced_after: None,
            failing_since: None,
            escalated: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn has_pending_sell(&self) -> bool {
        self.pending.is_some()
    }

    /// A sell is pending or a stage timer is still ahead
    pub fn has_scheduled_exit(&self) -> bool {
        !self.is_terminal() && (self.pending.is_some() || self.next_stage_due().is_some())
    }

    pub fn next_stage(&self) -> Option<usize> {
        self.stages.iter().position(|s| !s.consumed)
    }

    /// When the next stage becomes due by delay
    pub fn next_stage_due(&self) -> Option<Instant> {
        if self.is_terminal() {
            return None;
        }
        self.next_stage()
            .map(|k| self.entry_time + self.stages[k].delay)
    }

    /// Cumulative percent of the entry amount sold by stages
    pub fn sold_pct_of_entry(&self) -> f64 {
        self.stages.iter().map(|s| s.sold_pct_of_entry).sum()
    }

    pub fn consumed_stages(&self) -> usize {
        self.stages.iter().filter(|s| s.consumed).count()
    }

    fn can_fire(&self) -> bool {
        !self.is_terminal() && self.pending.is_none() && self.remaining > 0
    }

    /// Timer tick: fires the next stage if its delay has elapsed
    pub fn on_tick(&mut self, policy: &ExitPolicy, now: Instant) -> Option<SellOrder> {
        if !self.can_fire() || policy.strategy != ExitStrategy::Staged {
            return None;
        }
        let k = self.next_stage()?;
        if now < self.entry_time + self.stages[k].delay {
            return None;
        }
        self.fire_stage(k, ExitReason::StageDelay, policy)
    }

    /// Track the latest price and the running peak; false for unusable prices
    pub fn record_price(&mut self, price: f64) -> bool {
        if price <= 0.0 || !price.is_finite() {
            return false;
        }
        self.last_price = price;
        if price > self.peak_price {
            self.peak_price = price;
        }
        true
    }

    /// Price tick: tracks the peak and evaluates price triggers
    pub fn on_price(&mut self, policy: &ExitPolicy, price: f64) -> Option<SellOrder> {
        if !self.record_price(price) || !self.can_fire() {
            return None;
        }

        match check_triggers(policy, self.entry_price, self.peak_price, price)? {
            TriggerType::TakeProfit { .. } => self.liquidate(ExitReason::TakeProfit),
            TriggerType::StopLoss { .. } => self.liquidate(ExitReason::StopLoss),
            TriggerType::Downing { .. } => {
                self.peak_price = price;
                self.fire_next(ExitReason::Downing, policy)
            }
        }
    }

    /// Sell confidence crossed the threshold: fire the next stage early
    pub fn on_deterioration(&mut self, policy: &ExitPolicy) -> Option<SellOrder> {
        if !self.can_fire() || policy.strategy != ExitStrategy::Staged {
            return None;
        }
        self.fire_next(ExitReason::SignalDeterioration, policy)
    }

    /// Token's SOL invested reached THRESHOLD_SELL: sell everything
    pub fn on_threshold_sell(&mut self) -> Option<SellOrder> {
        if !self.can_fire() {
            return None;
        }
        self.start(self.full_order(ExitReason::ThresholdSell, PositionState::FullyExited))
    }

    /// Sell a fraction of the remaining amount outside the stage schedule
    pub fn partial_exit(&mut self, fraction: f64, reason: ExitReason) -> Option<SellOrder> {
        if !self.can_fire() || fraction <= 0.0 {
            return None;
        }
        let tokens = fraction_of(self.remaining, fraction.min(1.0) * 100.0);
        self.start(SellOrder {
            mint: self.mint,
            tokens,
            reason,
            stage: None,
            completion: PositionState::FullyExited,
            retry: false,
        })
    }

    /// Liquidate everything regardless of the stage schedule
    ///
    /// If a sell is already in flight, the liquidation is issued as soon as
    /// that sell settles.
    pub fn force_exit(&mut self, reason: ExitReason) -> Option<SellOrder> {
        if self.is_terminal() || self.remaining == 0 {
            return None;
        }
        match &self.pending {
            Some(p) if p.in_flight => {
                self.forced_after = Some(reason);
                None
            }
            _ => {
                self.pending = None;
                self.liquidate(reason)
            }
        }
    }

    /// A pending sell whose retry time has come
    pub fn retry_due(&mut self, now: Instant) -> Option<SellOrder> {
        let pending = self.pending.as_mut()?;
        match pending.retry_at {
            Some(at) if !pending.in_flight && now >= at => {
                pending.in_flight = true;
                pending.retry_at = None;
                pending.order.retry = true;
                Some(pending.order.clone())
            }
            _ => None,
        }
    }

    /// When a failed sell should be retried
    pub fn retry_at(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|p| p.retry_at)
    }

    /// Apply a filled sell
    ///
    /// Returns a follow-up order when a forced exit was deferred, or when the
    /// last stage filled and a residual is left to sell.
    pub fn on_sell_filled(&mut self, sold: u64) -> Option<SellOrder> {
        let pending = self.pending.take()?;
        let sold = sold.min(self.remaining);
        self.remaining -= sold;

        if let Some(k) = pending.order.stage {
            let entry = self.entry_amount.max(1) as f64;
            if let Some(stage) = self.stages.get_mut(k) {
                stage.consumed = true;
                stage.sold_pct_of_entry = sold as f64 / entry * 100.0;
            }
        }

        self.failing_since = None;
        self.escalated = false;
        self.state = if self.remaining == 0 {
            pending.order.completion
        } else {
            PositionState::PartiallyExited(self.consumed_stages())
        };

        if self.remaining == 0 {
            self.forced_after = None;
            return None;
        }
        if let Some(reason) = self.forced_after.take() {
            return self.liquidate(reason);
        }
        if pending.order.stage.is_some() && self.next_stage().is_none() {
            return self.start(self.full_order(pending.order.reason, PositionState::FullyExited));
        }
        None
    }

    /// Record a failed sell; the order stays pending and is retried later
    pub fn on_sell_failed(&mut self, policy: &ExitPolicy, now: Instant) -> Option<FailureAction> {
        let forced = self.forced_after.take();
        let full = self.full_order(ExitReason::TimerStop, PositionState::ForceLiquidated);
        let pending = self.pending.as_mut()?;

        if let Some(reason) = forced {
            pending.order = SellOrder { reason, ..full };
        }

        let retry_at = now + policy.retry_interval;
        pending.in_flight = false;
        pending.retry_at = Some(retry_at);

        let since = *self.failing_since.get_or_insert(now);
        let failing_for = now.saturating_duration_since(since);
        let escalate = !self.escalated && failing_for >= policy.escalate_after;
        if escalate {
            self.escalated = true;
        }

        Some(FailureAction {
            retry_at,
            escalate,
            failing_for,
        })
    }

    fn fire_next(&mut self, reason: ExitReason, policy: &ExitPolicy) -> Option<SellOrder> {
        match self.next_stage() {
            Some(k) => self.fire_stage(k, reason, policy),
            // Residual after the last stage
            None => self.start(self.full_order(reason, PositionState::FullyExited)),
        }
    }

    fn fire_stage(&mut self, k: usize, reason: ExitReason, policy: &ExitPolicy) -> Option<SellOrder> {
        let tokens = if policy.sell_all {
            self.remaining
        } else {
            fraction_of(self.remaining, self.stages[k].percent)
        };
        self.start(SellOrder {
            mint: self.mint,
            tokens,
            reason,
            stage: Some(k),
            completion: PositionState::FullyExited,
            retry: false,
        })
    }

    fn liquidate(&mut self, reason: ExitReason) -> Option<SellOrder> {
        self.start(self.full_order(reason, PositionState::ForceLiquidated))
    }

    fn full_order(&self, reason: ExitReason, completion: PositionState) -> SellOrder {
        SellOrder {
            mint: self.mint,
            tokens: self.remaining,
            reason,
            stage: None,
            completion,
            retry: false,
        }
    }

    fn start(&mut self, order: SellOrder) -> Option<SellOrder> {
        self.pending = Some(Pending {
            order: order.clone(),
            in_flight: true,
            retry_at: None,
        });
        Some(order)
    }
}

/// `percent` of `amount`, at least one token while anything remains
fn fraction_of(amount: u64, percent: f64) -> u64 {
    let tokens = (amount as f64 * percent / 100.0).floor() as u64;
    tokens.clamp(amount.min(1), amount)
}
