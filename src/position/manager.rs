//! Position book
//!
//! Positions are keyed per mint. Each entry sits behind its own async mutex so
//! work on one token never waits on another.

use chrono::Utc;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::position::exit::{Position, PositionState};

pub type PositionHandle = Arc<Mutex<Position>>;

/// Daily trading statistics (estimated from observed prices)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyStats {
    pub date: String,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_profit_sol: f64,
    pub total_loss_sol: f64,
    pub net_pnl_sol: f64,
}

impl DailyStats {
    pub fn new() -> Self {
        Self {
            date: Utc::now().format("%Y-%m-%d").to_string(),
            ..Default::default()
        }
    }

    pub fn record_trade(&mut self, pnl_sol: f64) {
        self.total_trades += 1;
        if pnl_sol >= 0.0 {
            self.winning_trades += 1;
            self.total_profit_sol += pnl_sol;
        } else {
            self.losing_trades += 1;
            self.total_loss_sol += pnl_sol.abs();
        }
        self.net_pnl_sol = self.total_profit_sol - self.total_loss_sol;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        (self.winning_trades as f64 / self.total_trades as f64) * 100.0
    }
}

/// Read-only view of a position for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSummary {
    pub mint: Pubkey,
    pub state: PositionState,
    pub entry_amount: u64,
    pub remaining: u64,
    pub entry_price: f64,
    pub last_price: f64,
    pub sold_pct_of_entry: f64,
}

impl PositionSummary {
    pub fn unrealized_pnl_pct(&self) -> f64 {
        crate::position::auto_sell::pnl_pct(self.entry_price, self.last_price)
    }
}

#[derive(Default)]
pub struct PositionBook {
    positions: DashMap<Pubkey, PositionHandle>,
    daily_stats: std::sync::Mutex<DailyStats>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self {
            positions: DashMap::new(),
            daily_stats: std::sync::Mutex::new(DailyStats::new()),
        }
    }

    /// Insert a freshly opened position; fails if a live one exists for the mint
    pub async fn open(&self, position: Position) -> Result<PositionHandle> {
        let mint = position.mint;
        if let Some(existing) = self.get(&mint) {
            if !existing.lock().await.is_terminal() {
                return Err(Error::PositionExists(mint.to_string()));
            }
        }

        let handle = Arc::new(Mutex::new(position));
        self.positions.insert(mint, handle.clone());
        info!("Opened position in {}", mint);
        Ok(handle)
    }

    pub fn get(&self, mint: &Pubkey) -> Option<PositionHandle> {
        self.positions.get(mint).map(|e| e.value().clone())
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.positions.contains_key(mint)
    }

    pub fn mints(&self) -> Vec<Pubkey> {
        self.positions.iter().map(|e| *e.key()).collect()
    }

    /// Drop a position once it reached a terminal state
    pub async fn remove_if_closed(&self, mint: &Pubkey) -> bool {
        let Some(handle) = self.get(mint) else {
            return false;
        };
        let closed = handle.lock().await.is_terminal();
        if closed {
            self.positions.remove(mint);
            info!("Closed position in {}", mint);
        }
        closed
    }

    /// Positions that are not yet terminal
    pub async fn open_count(&self) -> usize {
        let mut count = 0;
        for handle in self.handles() {
            if !handle.lock().await.is_terminal() {
                count += 1;
            }
        }
        count
    }

    /// Whether any live position still has a sell pending or a stage ahead
    pub async fn has_scheduled_exits(&self) -> bool {
        for handle in self.handles() {
            if handle.lock().await.has_scheduled_exit() {
                return true;
            }
        }
        false
    }

    /// Live positions, for end-of-run reporting
    pub async fn summaries(&self) -> Vec<PositionSummary> {
        let mut out = Vec::new();
        for handle in self.handles() {
            let p = handle.lock().await;
            if p.is_terminal() {
                continue;
            }
            out.push(PositionSummary {
                mint: p.mint,
                state: p.state,
                entry_amount: p.entry_amount,
                remaining: p.remaining,
                entry_price: p.entry_price,
                last_price: p.last_price,
                sold_pct_of_entry: p.sold_pct_of_entry(),
            });
        }
        out
    }

    fn handles(&self) -> Vec<PositionHandle> {
        self.positions.iter().map(|e| e.value().clone()).collect()
    }

    /// Record an estimated realized P&L; stats roll over at UTC midnight
    pub fn record_trade(&self, pnl_sol: f64) {
        let mut stats = self.daily_stats.lock().unwrap_or_else(|e| e.into_inner());
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if stats.date != today {
            *stats = DailyStats::new();
        }
        stats.record_trade(pnl_sol);
    }

    pub fn daily_stats(&self) -> DailyStats {
        self.daily_stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
