//! Trading module - intents, venues and submission routing
//!
//! Venues:
//! - Jito block engine (transaction or bundle)
//! - ZeroSlot / Nozomi relays (JSON-RPC)
//! - bloXroute trader API
//! - Direct RPC (fallback when no relay is enabled)

pub mod bloxroute;
pub mod intent;
pub mod jito;
pub mod relay;
pub mod router;
pub mod rpc;
pub mod signer;
pub mod simulation;
#[cfg(test)]
pub(crate) mod stub_http;
pub mod venue;

pub use intent::{Amount, IntentFactory, IntentMode, IntentOrigin, PriorityFee, Side, TransactionIntent};
pub use router::{ExecutionRouter, SubmissionLedger};
pub use signer::{RouteParams, SignedTransaction, TransactionSigner, Tip};
pub use venue::{Venue, VenueKind, VenueOutcome, VenueResult};
