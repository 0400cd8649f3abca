//! Price triggers for held positions
//!
//! Take-profit / stop-loss apply in TP/SL mode; drop-from-peak ("downing")
//! applies in staged mode. Both are best effort: a price that gaps through a
//! level between two ticks is only seen on the next tick.

use std::time::Duration;

use crate::config::{ExitConfig, ExitStrategy};

/// Price-based trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerType {
    TakeProfit { pnl_pct: f64 },
    StopLoss { pnl_pct: f64 },
    /// Drop from the running peak
    Downing { drop_pct: f64 },
}

/// Exit settings resolved from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPolicy {
    pub strategy: ExitStrategy,
    pub take_profit_pct: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub downing_pct: f64,
    pub sell_all: bool,
    pub retry_interval: Duration,
    pub escalate_after: Duration,
}

impl ExitPolicy {
    pub fn from_config(config: &ExitConfig) -> Self {
        Self {
            strategy: config.strategy,
            take_profit_pct: config.take_profit_enabled.then_some(config.take_profit_pct),
            stop_loss_pct: config.stop_loss_enabled.then_some(config.stop_loss_pct),
            downing_pct: config.downing_percent,
            sell_all: config.sell_all_tokens,
            retry_interval: Duration::from_millis(config.retry_interval_ms),
            escalate_after: Duration::from_secs(config.time_exceed_secs),
        }
    }
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::from_config(&ExitConfig::default())
    }
}

/// Profit or loss of `price` against `entry`, in percent
pub fn pnl_pct(entry: f64, price: f64) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    (price - entry) / entry * 100.0
}

/// Check whether a price tick fires a trigger
pub fn check_triggers(policy: &ExitPolicy, entry: f64, peak: f64, price: f64) -> Option<TriggerType> {
    match policy.strategy {
        ExitStrategy::TakeProfitStopLoss => {
            let pnl_pct = pnl_pct(entry, price);
            if let Some(tp) = policy.take_profit_pct {
                if pnl_pct >= tp {
                    return Some(TriggerType::TakeProfit { pnl_pct });
                }
            }
            if let Some(sl) = policy.stop_loss_pct {
                if pnl_pct <= -sl {
                    return Some(TriggerType::StopLoss { pnl_pct });
                }
            }
            None
        }
        ExitStrategy::Staged => {
            if policy.downing_pct <= 0.0 || peak <= 0.0 {
                return None;
            }
            let drop_pct = (peak - price) / peak * 100.0;
            (drop_pct >= policy.downing_pct).then_some(TriggerType::Downing { drop_pct })
        }
    }
}
