//! Rate limiting for re-reviews of held tokens

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::time::{Duration, Instant};

/// Decides when a held token's fresh snapshot should be re-run through the filter
///
/// A token is reviewed at most once per cycle unless its price moved by at
/// least the configured percentage since the last review.
pub struct ReviewGate {
    cycle: Duration,
    price_delta_pct: f64,
    last: DashMap<Pubkey, (Instant, f64)>,
}

impl ReviewGate {
    pub fn new(cycle: Duration, price_delta_pct: f64) -> Self {
        Self {
            cycle,
            price_delta_pct,
            last: DashMap::new(),
        }
    }

    /// Check and record a review at `now`
    pub fn should_review(&self, mint: &Pubkey, price: f64, now: Instant) -> bool {
        let mut entry = match self.last.entry(*mint) {
            Entry::Vacant(vacant) => {
                vacant.insert((now, price));
                return true;
            }
            Entry::Occupied(occupied) => occupied,
        };
        let (at, last_price) = *entry.get();

        let moved = if last_price > 0.0 {
            ((price - last_price) / last_price).abs() * 100.0 >= self.price_delta_pct
        } else {
            price > 0.0
        };

        if moved || now.saturating_duration_since(at) >= self.cycle {
            entry.insert((now, price));
            true
        } else {
            false
        }
    }

    pub fn forget(&self, mint: &Pubkey) {
        self.last.remove(mint);
    }
}
