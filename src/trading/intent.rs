//! Transaction intents
//!
//! An intent is the immutable description of one trade the engine wants to
//! land. Venue-specific transactions are produced from it by the signer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::position::exit::ExitReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Trade size: SOL in for buys, tokens out for sells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    Lamports(u64),
    Tokens(u64),
}

impl Amount {
    pub fn lamports(&self) -> Option<u64> {
        match self {
            Amount::Lamports(l) => Some(*l),
            Amount::Tokens(_) => None,
        }
    }

    pub fn tokens(&self) -> Option<u64> {
        match self {
            Amount::Tokens(t) => Some(*t),
            Amount::Lamports(_) => None,
        }
    }
}

/// Compute-budget settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFee {
    pub unit_price_micro_lamports: u64,
    pub unit_limit: u32,
}

/// Deadline class of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentMode {
    /// MAX_WAIT_TIME
    Normal,
    /// LIMIT_WAIT_TIME
    Limit,
}

/// What produced an intent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntentOrigin {
    Filter,
    InverseBuy,
    CopyTrade { wallet: Pubkey },
    Exit(ExitReason),
}

impl fmt::Display for IntentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentOrigin::Filter => write!(f, "filter"),
            IntentOrigin::InverseBuy => write!(f, "inverse_buy"),
            IntentOrigin::CopyTrade { wallet } => write!(f, "copy_trade({})", wallet),
            IntentOrigin::Exit(reason) => write!(f, "exit({})", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionIntent {
    pub id: Uuid,
    pub side: Side,
    pub mint: Pubkey,
    pub amount: Amount,
    pub priority_fee: PriorityFee,
    pub slippage_bps: u32,
    pub mode: IntentMode,
    pub deadline: Instant,
    pub simulated: bool,
    pub origin: IntentOrigin,
    pub created_at: DateTime<Utc>,
}

impl TransactionIntent {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Builds intents with the configured fee, slippage and deadlines
#[derive(Debug, Clone)]
pub struct IntentFactory {
    priority_fee: PriorityFee,
    slippage_bps: u32,
    max_wait: Duration,
    limit_wait: Duration,
    simulated: bool,
}

impl IntentFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            priority_fee: PriorityFee {
                unit_price_micro_lamports: config.trading.unit_price_micro_lamports(),
                unit_limit: config.trading.unit_limit,
            },
            slippage_bps: config.trading.slippage_bps,
            max_wait: Duration::from_millis(config.trading.max_wait_time_ms),
            limit_wait: Duration::from_millis(config.advanced.limit_wait_time_ms),
            simulated: config.mode.trading_mode().is_simulated(),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn buy(&self, mint: Pubkey, lamports: u64, mode: IntentMode, origin: IntentOrigin) -> TransactionIntent {
        self.build(Side::Buy, mint, Amount::Lamports(lamports), mode, origin)
    }

    pub fn sell(&self, mint: Pubkey, tokens: u64, mode: IntentMode, origin: IntentOrigin) -> TransactionIntent {
        self.build(Side::Sell, mint, Amount::Tokens(tokens), mode, origin)
    }

    fn build(
        &self,
        side: Side,
        mint: Pubkey,
        amount: Amount,
        mode: IntentMode,
        origin: IntentOrigin,
    ) -> TransactionIntent {
        let wait = match mode {
            IntentMode::Normal => self.max_wait,
            IntentMode::Limit => self.limit_wait,
        };
        TransactionIntent {
            id: Uuid::new_v4(),
            side,
            mint,
            amount,
            priority_fee: self.priority_fee,
            slippage_bps: self.slippage_bps,
            mode,
            deadline: Instant::now() + wait,
            simulated: self.simulated,
            origin,
            created_at: Utc::now(),
        }
    }
}
