//! Simulated submission
//!
//! Used for simulation and paper trading: no network traffic, every intent
//! "lands" immediately with a fresh, unique signature.

use solana_sdk::signature::Signature;
use std::time::{Duration, Instant};
use tracing::info;

use crate::trading::intent::TransactionIntent;
use crate::trading::venue::{VenueKind, VenueOutcome, VenueResult};

/// Synthetic successful result for an intent
pub fn simulate(intent: &TransactionIntent) -> VenueResult {
    let started = Instant::now();
    let signature = Signature::new_unique();

    info!(
        intent = %intent.id,
        side = %intent.side,
        mint = %intent.mint,
        origin = %intent.origin,
        %signature,
        "[SIMULATED] intent filled"
    );

    VenueResult {
        venue: VenueKind::Simulated,
        outcome: VenueOutcome::Success,
        latency: started.elapsed().max(Duration::from_micros(1)),
        signature: Some(signature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::trading::intent::{IntentFactory, IntentMode, IntentOrigin};
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_simulated_signatures_are_unique() {
        let factory = IntentFactory::new(&Config::default());
        let intent = factory.buy(Pubkey::new_unique(), 1, IntentMode::Normal, IntentOrigin::Filter);

        let a = simulate(&intent);
        let b = simulate(&intent);
        assert!(a.is_success());
        assert_eq!(a.venue, VenueKind::Simulated);
        assert_ne!(a.signature, b.signature);
    }
}
