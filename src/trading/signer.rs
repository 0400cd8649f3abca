//! Signing interface
//!
//! Key custody and transaction construction live outside the engine. The
//! router asks the signer for one variant per venue; all variants of one
//! intent must be mutually exclusive on-chain (for example by sharing a
//! durable nonce) so that at most one lands.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::error::Result;
use crate::trading::intent::{PriorityFee, TransactionIntent};
use crate::trading::venue::{encode_wire, VenueKind};

/// Tip paid to a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    pub lamports: u64,
    pub recipient: Option<Pubkey>,
}

impl Tip {
    pub const NONE: Tip = Tip {
        lamports: 0,
        recipient: None,
    };
}

/// Per-venue parameters baked into the signed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteParams {
    pub venue: VenueKind,
    pub tip: Tip,
    pub priority_fee: PriorityFee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub signature: Signature,
    /// Serialized transaction bytes
    pub wire: Vec<u8>,
}

impl SignedTransaction {
    pub fn base64(&self) -> String {
        encode_wire(&self.wire)
    }
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, intent: &TransactionIntent, route: &RouteParams) -> Result<SignedTransaction>;
}
