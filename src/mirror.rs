//! Copy-trading mirror
//!
//! Turns trades of target wallets into buy/sell actions. Only the first
//! configured wallet is followed unless multi-target mode is on.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::CopyTradingConfig;
use crate::stream::events::WalletTrade;
use crate::trading::intent::Side;

/// What the mirror has seen of one target wallet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetWalletState {
    pub wallet: Pubkey,
    pub last_action: Option<Side>,
    pub last_sequence: Option<u64>,
    /// Tokens the wallet is observed to hold, per mint
    pub holdings: HashMap<Pubkey, Holding>,
}

/// Observed balance of one mint in a target wallet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub tokens: u64,
    pub last_trade: DateTime<Utc>,
}

impl TargetWalletState {
    fn new(wallet: Pubkey) -> Self {
        Self {
            wallet,
            ..Default::default()
        }
    }
}

/// Holdings untouched for this many hours are forgotten
pub const HOLDING_TTL_HOURS: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MirrorAction {
    Buy {
        wallet: Pubkey,
        mint: Pubkey,
        lamports: u64,
    },
    /// Sell this fraction (0..=1) of our position in `mint`
    Sell {
        wallet: Pubkey,
        mint: Pubkey,
        fraction: f64,
    },
}

pub struct CopyTradeMirror {
    enabled: bool,
    percent: f64,
    mc_threshold_to_buy: f64,
    mc_threshold_to_follow: f64,
    targets: Vec<Pubkey>,
    states: DashMap<Pubkey, TargetWalletState>,
}

impl CopyTradeMirror {
    pub fn from_config(config: &CopyTradingConfig) -> Self {
        let targets: Vec<Pubkey> = if config.multi_target_mode {
            config.target_wallets.clone()
        } else {
            config.target_wallets.iter().take(1).copied().collect()
        };

        if config.enabled {
            info!(
                "Copy trading enabled for {} of {} target wallets",
                targets.len(),
                config.target_wallets.len()
            );
        }

        let states = targets
            .iter()
            .map(|w| (*w, TargetWalletState::new(*w)))
            .collect();

        Self {
            enabled: config.enabled,
            percent: config.buy_sell_percent,
            mc_threshold_to_buy: config.mc_threshold_to_buy,
            mc_threshold_to_follow: config.mc_threshold_to_follow,
            targets,
            states,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.targets.is_empty()
    }

    pub fn is_target(&self, wallet: &Pubkey) -> bool {
        self.states.contains_key(wallet)
    }

    pub fn targets(&self) -> &[Pubkey] {
        &self.targets
    }

    pub fn state(&self, wallet: &Pubkey) -> Option<TargetWalletState> {
        self.states.get(wallet).map(|s| s.clone())
    }

    /// Record a target trade and decide what to mirror
    pub fn observe(&self, trade: &WalletTrade) -> Option<MirrorAction> {
        if !self.enabled {
            return None;
        }
        let mut state = self.states.get_mut(&trade.wallet)?;

        if matches!(state.last_sequence, Some(seen) if trade.sequence <= seen) {
            debug!(
                "Skipping stale trade from {} (seq {} <= {:?})",
                trade.wallet, trade.sequence, state.last_sequence
            );
            return None;
        }
        state.last_sequence = Some(trade.sequence);
        state.last_action = Some(trade.side);

        match trade.side {
            Side::Buy => {
                let holding = state.holdings.entry(trade.mint).or_insert(Holding {
                    tokens: 0,
                    last_trade: trade.observed_at,
                });
                holding.tokens += trade.token_amount;
                holding.last_trade = trade.observed_at;
                self.buy_action(trade)
            }
            Side::Sell => {
                let held = state.holdings.get(&trade.mint).map(|h| h.tokens).unwrap_or(0);
                let fraction = if held == 0 {
                    1.0
                } else {
                    (trade.token_amount as f64 / held as f64).min(1.0)
                };
                let left = held.saturating_sub(trade.token_amount);
                if left == 0 {
                    state.holdings.remove(&trade.mint);
                } else {
                    state.holdings.insert(
                        trade.mint,
                        Holding {
                            tokens: left,
                            last_trade: trade.observed_at,
                        },
                    );
                }
                Some(MirrorAction::Sell {
                    wallet: trade.wallet,
                    mint: trade.mint,
                    fraction,
                })
            }
        }
    }

    /// Drop holdings not traded within `ttl`; returns how many were dropped
    pub fn prune(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> usize {
        let mut dropped = 0;
        for mut state in self.states.iter_mut() {
            let before = state.holdings.len();
            state.holdings.retain(|_, h| now - h.last_trade < ttl);
            dropped += before - state.holdings.len();
        }
        if dropped > 0 {
            debug!("Forgot {} idle target holdings", dropped);
        }
        dropped
    }

    fn buy_action(&self, trade: &WalletTrade) -> Option<MirrorAction> {
        let mc = trade.market_cap;
        if !(mc < self.mc_threshold_to_follow && mc <= self.mc_threshold_to_buy) {
            debug!(
                "Not mirroring buy of {}: market cap {} outside thresholds",
                trade.mint, mc
            );
            return None;
        }

        let lamports = (trade.lamports as f64 * self.percent / 100.0).floor() as u64;
        (lamports > 0).then_some(MirrorAction::Buy {
            wallet: trade.wallet,
            mint: trade.mint,
            lamports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(targets: Vec<Pubkey>, multi: bool) -> CopyTradingConfig {
        CopyTradingConfig {
            enabled: true,
            buy_sell_percent: 50.0,
            target_wallets: targets,
            multi_target_mode: multi,
            mc_threshold_to_buy: 1_000_000.0,
            mc_threshold_to_follow: 500_000.0,
        }
    }

    fn trade(wallet: Pubkey, mint: Pubkey, side: Side, tokens: u64, mc: f64, seq: u64) -> WalletTrade {
        WalletTrade {
            wallet,
            mint,
            side,
            lamports: 2_000_000_000,
            token_amount: tokens,
            market_cap: mc,
            sequence: seq,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_market_cap_scenario() {
        let wallet = Pubkey::new_unique();
        let mirror = CopyTradeMirror::from_config(&config(vec![wallet], false));
        let mint = Pubkey::new_unique();

        // below both thresholds: mirrored at BUY_SELL_PERCENT
        assert_eq!(
            mirror.observe(&trade(wallet, mint, Side::Buy, 1_000, 300_000.0, 1)),
            Some(MirrorAction::Buy {
                wallet,
                mint,
                lamports: 1_000_000_000
            })
        );
        // at the follow threshold: ignored
        assert!(mirror
            .observe(&trade(wallet, Pubkey::new_unique(), Side::Buy, 1_000, 500_000.0, 2))
            .is_none());
    }

    #[test]
    fn test_sell_mirrors_fraction_of_observed_holding() {
        let wallet = Pubkey::new_unique();
        let mirror = CopyTradeMirror::from_config(&config(vec![wallet], false));
        let mint = Pubkey::new_unique();

        mirror.observe(&trade(wallet, mint, Side::Buy, 1_000, 100.0, 1));
        let action = mirror.observe(&trade(wallet, mint, Side::Sell, 250, 100.0, 2));
        assert_eq!(
            action,
            Some(MirrorAction::Sell {
                wallet,
                mint,
                fraction: 0.25
            })
        );
        assert_eq!(mirror.state(&wallet).unwrap().holdings[&mint].tokens, 750);

        let action = mirror.observe(&trade(wallet, mint, Side::Sell, 750, 100.0, 3));
        assert!(matches!(action, Some(MirrorAction::Sell { fraction, .. }) if fraction == 1.0));
        assert!(mirror.state(&wallet).unwrap().holdings.is_empty());
    }

    #[test]
    fn test_prune_forgets_idle_holdings() {
        let wallet = Pubkey::new_unique();
        let mirror = CopyTradeMirror::from_config(&config(vec![wallet], false));
        let (idle, active) = (Pubkey::new_unique(), Pubkey::new_unique());

        let mut old = trade(wallet, idle, Side::Buy, 1_000, 100.0, 1);
        old.observed_at = Utc::now() - chrono::Duration::hours(7);
        mirror.observe(&old);
        mirror.observe(&trade(wallet, active, Side::Buy, 1_000, 100.0, 2));

        assert_eq!(mirror.prune(Utc::now(), chrono::Duration::hours(HOLDING_TTL_HOURS)), 1);
        let holdings = mirror.state(&wallet).unwrap().holdings;
        assert!(!holdings.contains_key(&idle));
        assert!(holdings.contains_key(&active));
    }

    #[test]
    fn test_stale_sequence_ignored() {
        let wallet = Pubkey::new_unique();
        let mirror = CopyTradeMirror::from_config(&config(vec![wallet], false));
        let mint = Pubkey::new_unique();

        assert!(mirror.observe(&trade(wallet, mint, Side::Buy, 10, 100.0, 5)).is_some());
        assert!(mirror.observe(&trade(wallet, mint, Side::Buy, 10, 100.0, 5)).is_none());
        assert!(mirror.observe(&trade(wallet, mint, Side::Sell, 10, 100.0, 4)).is_none());
        assert_eq!(mirror.state(&wallet).unwrap().last_action, Some(Side::Buy));
    }

    #[test]
    fn test_first_wallet_only_without_multi_target() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let single = CopyTradeMirror::from_config(&config(vec![a, b], false));
        assert!(single.is_target(&a));
        assert!(!single.is_target(&b));
        assert!(single
            .observe(&trade(b, Pubkey::new_unique(), Side::Buy, 1, 1.0, 1))
            .is_none());

        let multi = CopyTradeMirror::from_config(&config(vec![a, b], true));
        assert!(multi.is_target(&b));
    }

    #[test]
    fn test_disabled_mirror_emits_nothing() {
        let wallet = Pubkey::new_unique();
        let mut cfg = config(vec![wallet], false);
        cfg.enabled = false;
        let mirror = CopyTradeMirror::from_config(&cfg);
        assert!(!mirror.is_enabled());
        assert!(mirror
            .observe(&trade(wallet, Pubkey::new_unique(), Side::Buy, 1, 1.0, 1))
            .is_none());
    }
}
