//! Memecoin trade engine library
//!
//! Filters token candidates, gates buys by trading window and daily budget,
//! races relay venues to land intents and drives staged or TP/SL exits.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod mirror;
pub mod notify;
pub mod position;
pub mod session;
pub mod stream;
pub mod trading;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, EngineSummary};
pub use error::{Error, Result};
