//! Token filtering module
//!
//! Range checks over candidate snapshots, the mint/creator blacklist, and the
//! review gate used when a held token's snapshot is re-scored for sell
//! confidence.

pub mod blacklist;
pub mod review;
pub mod token_filter;
pub mod types;

pub use blacklist::Blacklist;
pub use review::ReviewGate;
pub use token_filter::{evaluate, TokenFilter};
pub use types::{Decision, FilterCriteria, Rejection, Signal, SignalRange, TokenCandidate};
