//! Candidate snapshots, filter criteria and decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::stream::events::{option_pubkey_serde, pubkey_serde};

/// Snapshot of a token's metrics at one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    #[serde(with = "pubkey_serde")]
    pub mint: Pubkey,
    /// Wallet that launched the token, when the source knows it
    #[serde(default, with = "option_pubkey_serde")]
    pub creator: Option<Pubkey>,
    pub market_cap: f64,
    pub volume: f64,
    pub buy_count: u32,
    pub sell_count: u32,
    /// Launcher wallet balance in SOL
    pub launcher_sol_balance: f64,
    /// Developer's initial buy in SOL
    pub dev_buy_sol: f64,
    /// Total SOL invested in the bonding curve
    pub sol_invested: f64,
    /// Price in SOL per token
    pub price: f64,
    pub launched_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl TokenCandidate {
    /// Age of the token at observation time, in milliseconds
    pub fn age_ms(&self) -> u64 {
        (self.observed_at - self.launched_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// SOL invested in lamports
    pub fn sol_invested_lamports(&self) -> u64 {
        (self.sol_invested * 1e9).max(0.0) as u64
    }
}

/// Inclusive bound for one signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRange {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,
}

impl SignalRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            enabled: true,
            min,
            max,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Normalized distance to the nearest finite bound, 1.0 for half-open ranges
    pub fn margin(&self, value: f64) -> f64 {
        if !self.min.is_finite() || !self.max.is_finite() {
            return 1.0;
        }
        let half_width = (self.max - self.min) / 2.0;
        if half_width <= 0.0 {
            return 1.0;
        }
        let nearest = (value - self.min).min(self.max - value);
        (nearest / half_width).clamp(0.0, 1.0)
    }
}

impl fmt::Display for SignalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "disabled");
        }
        if self.max.is_finite() {
            write!(f, "[{}, {}]", self.min, self.max)
        } else {
            write!(f, "[{}, inf)", self.min)
        }
    }
}

/// Bounds applied to every candidate
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub market_cap: SignalRange,
    pub volume: SignalRange,
    pub buy_sell_count: SignalRange,
    pub sol_invested: SignalRange,
    pub launcher_balance: SignalRange,
    pub dev_buy: SignalRange,
    /// Maximum launch age in ms, 0 disables the check
    pub max_launch_age_ms: u64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            market_cap: SignalRange::new(8.0, 15.0),
            volume: SignalRange::new(5.0, 12.0),
            buy_sell_count: SignalRange::new(50.0, 2000.0),
            sol_invested: SignalRange::new(1.0, f64::INFINITY),
            launcher_balance: SignalRange::new(0.0, 1.0),
            dev_buy: SignalRange::new(5.0, 30.0),
            max_launch_age_ms: 300_000,
        }
    }
}

impl FilterCriteria {
    /// Criteria with every signal disabled
    pub fn disabled() -> Self {
        let mut criteria = Self::default();
        for range in criteria.ranges_mut() {
            range.enabled = false;
        }
        criteria.max_launch_age_ms = 0;
        criteria
    }

    pub fn named_ranges(&self) -> [(&'static str, SignalRange); 6] {
        [
            ("market cap", self.market_cap),
            ("volume", self.volume),
            ("buy/sell count", self.buy_sell_count),
            ("SOL invested", self.sol_invested),
            ("launcher balance", self.launcher_balance),
            ("dev buy", self.dev_buy),
        ]
    }

    fn ranges_mut(&mut self) -> [&mut SignalRange; 6] {
        [
            &mut self.market_cap,
            &mut self.volume,
            &mut self.buy_sell_count,
            &mut self.sol_invested,
            &mut self.launcher_balance,
            &mut self.dev_buy,
        ]
    }

    /// Number of signals that can block a candidate
    pub fn enabled_count(&self) -> usize {
        let ranges = self.named_ranges().iter().filter(|(_, r)| r.enabled).count();
        ranges + usize::from(self.max_launch_age_ms > 0)
    }
}

/// One quantitative signal checked by the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    MarketCap,
    Volume,
    BuySellCount,
    SolInvested,
    LauncherBalance,
    DevBuy,
    LaunchAge,
}

impl Signal {
    /// Weight of this signal in the confidence mean
    pub fn weight(&self) -> f64 {
        match self {
            Signal::MarketCap => 1.5,
            Signal::Volume => 1.2,
            Signal::BuySellCount => 1.0,
            Signal::SolInvested => 1.0,
            Signal::LauncherBalance => 0.8,
            Signal::DevBuy => 1.0,
            Signal::LaunchAge => 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Signal::MarketCap => "market_cap",
            Signal::Volume => "volume",
            Signal::BuySellCount => "buy_sell_count",
            Signal::SolInvested => "sol_invested",
            Signal::LauncherBalance => "launcher_balance",
            Signal::DevBuy => "dev_buy",
            Signal::LaunchAge => "launch_age",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a candidate failed one signal
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub signal: Signal,
    pub value: f64,
    pub range: SignalRange,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} outside {}", self.signal, self.value, self.range)
    }
}

/// Filter verdict for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub accept: bool,
    /// Weighted mean of per-signal scores, in [0, 1]
    pub confidence: f64,
    pub reasons: Vec<Rejection>,
}

impl Decision {
    pub fn rejected_by(&self, signal: Signal) -> bool {
        self.reasons.iter().any(|r| r.signal == signal)
    }

    /// Sell confidence when re-reviewing a held token
    pub fn sell_confidence(&self) -> f64 {
        1.0 - self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin() {
        let range = SignalRange::new(8.0, 16.0);
        assert_eq!(range.margin(12.0), 1.0);
        assert_eq!(range.margin(8.0), 0.0);
        assert_eq!(range.margin(10.0), 0.5);

        let open = SignalRange::new(1.0, f64::INFINITY);
        assert_eq!(open.margin(1.0), 1.0);
    }

    #[test]
    fn test_disabled_criteria() {
        let criteria = FilterCriteria::disabled();
        assert_eq!(criteria.enabled_count(), 0);
        assert_eq!(FilterCriteria::default().enabled_count(), 7);
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection {
            signal: Signal::MarketCap,
            value: 20.0,
            range: SignalRange::new(8.0, 15.0),
        };
        assert_eq!(rejection.to_string(), "market_cap 20 outside [8, 15]");
    }
}
