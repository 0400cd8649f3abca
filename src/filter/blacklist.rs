//! Mints and creator wallets that are never bought

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;

use crate::filter::types::TokenCandidate;

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    keys: HashSet<Pubkey>,
}

impl Blacklist {
    pub fn from_keys(keys: impl IntoIterator<Item = Pubkey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &Pubkey) -> bool {
        self.keys.contains(key)
    }

    /// The listed key that blocks this candidate, mint first
    pub fn blocks(&self, candidate: &TokenCandidate) -> Option<Pubkey> {
        if self.contains(&candidate.mint) {
            return Some(candidate.mint);
        }
        candidate.creator.filter(|creator| self.contains(creator))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(mint: Pubkey, creator: Option<Pubkey>) -> TokenCandidate {
        let now = Utc::now();
        TokenCandidate {
            mint,
            creator,
            market_cap: 10.0,
            volume: 8.0,
            buy_count: 10,
            sell_count: 5,
            launcher_sol_balance: 0.5,
            dev_buy_sol: 1.0,
            sol_invested: 2.0,
            price: 0.000_001,
            launched_at: now,
            observed_at: now,
        }
    }

    #[test]
    fn test_blocks_mint_or_creator() {
        let (mint, creator) = (Pubkey::new_unique(), Pubkey::new_unique());
        let list = Blacklist::from_keys([mint, creator]);
        assert_eq!(list.len(), 2);

        assert_eq!(list.blocks(&candidate(mint, None)), Some(mint));
        assert_eq!(list.blocks(&candidate(Pubkey::new_unique(), Some(creator))), Some(creator));
        assert_eq!(list.blocks(&candidate(Pubkey::new_unique(), Some(Pubkey::new_unique()))), None);
        assert_eq!(list.blocks(&candidate(Pubkey::new_unique(), None)), None);
    }

    #[test]
    fn test_empty_list_blocks_nothing() {
        let list = Blacklist::default();
        assert!(list.is_empty());
        assert_eq!(list.blocks(&candidate(Pubkey::new_unique(), Some(Pubkey::new_unique()))), None);
    }
}
