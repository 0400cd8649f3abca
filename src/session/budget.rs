//! Daily buy budget
//!
//! The whole budget state lives in one atomic word: the UTC day index in the
//! top 16 bits and the lamports spent that day in the low 48 bits. Buys reserve
//! before dispatch and either commit or roll back; a reservation dropped
//! without a commit is rolled back.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

const SPENT_BITS: u32 = 48;
const SPENT_MASK: u64 = (1 << SPENT_BITS) - 1;
const DAY_MASK: u64 = 0xFFFF;

fn pack(day: u64, spent: u64) -> u64 {
    ((day & DAY_MASK) << SPENT_BITS) | (spent & SPENT_MASK)
}

fn unpack(word: u64) -> (u64, u64) {
    (word >> SPENT_BITS, word & SPENT_MASK)
}

/// Days since the Unix epoch, truncated to 16 bits
pub fn utc_day_index() -> u64 {
    (Utc::now().timestamp().div_euclid(86_400) as u64) & DAY_MASK
}

/// The later of the clock's day and the stored day, modulo the 16-bit wrap
fn current_day(clock_day: u64, stored_day: u64) -> u64 {
    if clock_day.wrapping_sub(stored_day) & DAY_MASK < 0x8000 {
        clock_day
    } else {
        stored_day
    }
}

#[derive(Debug)]
pub struct Budget {
    cap_lamports: u64,
    word: AtomicU64,
}

impl Budget {
    pub fn new(cap_lamports: u64) -> Self {
        Self {
            cap_lamports: cap_lamports.min(SPENT_MASK),
            word: AtomicU64::new(pack(utc_day_index(), 0)),
        }
    }

    pub fn cap(&self) -> u64 {
        self.cap_lamports
    }

    /// Lamports spent today
    pub fn spent(&self) -> u64 {
        let (d, spent) = unpack(self.word.load(Ordering::Acquire));
        if current_day(utc_day_index(), d) == d {
            spent
        } else {
            0
        }
    }

    pub fn remaining(&self) -> u64 {
        self.cap_lamports.saturating_sub(self.spent())
    }

    #[cfg(test)]
    fn spent_on(&self, day: u64) -> u64 {
        match unpack(self.word.load(Ordering::Acquire)) {
            (d, spent) if d == day => spent,
            _ => 0,
        }
    }

    /// Reserve `lamports` from today's budget
    pub fn reserve(self: &Arc<Self>, lamports: u64) -> Result<Reservation> {
        self.reserve_on(utc_day_index, lamports)
    }

    /// The clock is read on every attempt; a day older than the stored one
    /// counts against the stored day.
    fn reserve_on(self: &Arc<Self>, clock: impl Fn() -> u64, lamports: u64) -> Result<Reservation> {
        let cap = self.cap_lamports;
        let mut day = 0;
        let mut spent_today = 0;
        let result = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (d, spent) = unpack(word);
                day = current_day(clock(), d);
                spent_today = if d == day { spent } else { 0 };
                let next = spent_today.checked_add(lamports)?;
                (next <= cap).then(|| pack(day, next))
            });

        match result {
            Ok(_) => {
                debug!("Reserved {} lamports of daily budget", lamports);
                Ok(Reservation {
                    budget: self.clone(),
                    day,
                    lamports,
                    settled: false,
                })
            }
            Err(_) => Err(Error::BudgetExceeded {
                requested: lamports,
                remaining: cap.saturating_sub(spent_today),
            }),
        }
    }

    fn release(&self, day: u64, lamports: u64) {
        // A reservation from a previous day has nothing left to restore
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (d, spent) = unpack(word);
                (d == day).then(|| pack(d, spent.saturating_sub(lamports)))
            });
    }
}

/// Lamports held against the budget until committed or rolled back
#[derive(Debug)]
#[must_use = "a dropped reservation is rolled back"]
pub struct Reservation {
    budget: Arc<Budget>,
    day: u64,
    lamports: u64,
    settled: bool,
}

impl Reservation {
    pub fn lamports(&self) -> u64 {
        self.lamports
    }

    pub fn commit(mut self) {
        self.settled = true;
    }

    pub fn rollback(mut self) {
        self.settled = true;
        self.budget.release(self.day, self.lamports);
        debug!("Rolled back {} lamports of daily budget", self.lamports);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            self.budget.release(self.day, self.lamports);
        }
    }
}
