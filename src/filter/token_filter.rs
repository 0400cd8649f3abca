//! Token filtering logic
//!
//! Checks each enabled signal of a candidate against its configured range and
//! scores how comfortably the candidate sits inside them.

use tracing::{debug, warn};

use crate::filter::types::{Decision, FilterCriteria, Rejection, Signal, SignalRange, TokenCandidate};

/// Evaluate a candidate against criteria
///
/// Accepts iff every enabled signal passes. Confidence is the weighted mean
/// of per-signal scores: 0 for a failed signal, `0.5 + 0.5 * margin` for a
/// passing one. With no enabled signals the candidate is accepted at 1.0.
pub fn evaluate(candidate: &TokenCandidate, criteria: &FilterCriteria) -> Decision {
    let mut reasons = Vec::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for (signal, value, range) in signal_values(candidate, criteria) {
        if !range.enabled {
            continue;
        }
        let weight = signal.weight();
        total_weight += weight;

        if range.contains(value) {
            let score = 0.5 + 0.5 * range.margin(value);
            weighted += weight * score;
            debug!(mint = %candidate.mint, %signal, value, score, "signal passed");
        } else {
            debug!(mint = %candidate.mint, %signal, value, range = %range, "signal failed");
            reasons.push(Rejection {
                signal,
                value,
                range,
            });
        }
    }

    let confidence = if total_weight > 0.0 {
        weighted / total_weight
    } else {
        1.0
    };

    Decision {
        accept: reasons.is_empty(),
        confidence,
        reasons,
    }
}

fn signal_values(
    candidate: &TokenCandidate,
    criteria: &FilterCriteria,
) -> [(Signal, f64, SignalRange); 7] {
    let launch_age = SignalRange {
        enabled: criteria.max_launch_age_ms > 0,
        min: f64::NEG_INFINITY,
        max: criteria.max_launch_age_ms as f64,
    };
    [
        (Signal::MarketCap, candidate.market_cap, criteria.market_cap),
        (Signal::Volume, candidate.volume, criteria.volume),
        (
            Signal::BuySellCount,
            candidate.buy_count as f64 + candidate.sell_count as f64,
            criteria.buy_sell_count,
        ),
        (Signal::SolInvested, candidate.sol_invested, criteria.sol_invested),
        (
            Signal::LauncherBalance,
            candidate.launcher_sol_balance,
            criteria.launcher_balance,
        ),
        (Signal::DevBuy, candidate.dev_buy_sol, criteria.dev_buy),
        (Signal::LaunchAge, candidate.age_ms() as f64, launch_age),
    ]
}

/// Token filter based on configuration
pub struct TokenFilter {
    criteria: FilterCriteria,
    min_buy_confidence: f64,
    min_sell_confidence: f64,
}

impl TokenFilter {
    /// Create a new token filter from config
    pub fn new(criteria: FilterCriteria, min_buy_confidence: f64, min_sell_confidence: f64) -> Self {
        if criteria.enabled_count() == 0 {
            warn!("All filter signals are disabled; every candidate will be accepted");
        }
        Self {
            criteria,
            min_buy_confidence,
            min_sell_confidence,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn evaluate(&self, candidate: &TokenCandidate) -> Decision {
        evaluate(candidate, &self.criteria)
    }

    /// Accepted and confident enough to buy
    pub fn is_buy(&self, decision: &Decision) -> bool {
        decision.accept && decision.confidence >= self.min_buy_confidence
    }

    /// Sell confidence from a fresh snapshot of a held token, if it warrants an early exit
    pub fn deterioration(&self, candidate: &TokenCandidate) -> Option<f64> {
        let sell_confidence = self.evaluate(candidate).sell_confidence();
        (sell_confidence >= self.min_sell_confidence).then_some(sell_confidence)
    }
}
