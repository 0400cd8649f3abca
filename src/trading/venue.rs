//! Venue abstraction shared by every submission backend

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use solana_sdk::signature::Signature;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::trading::intent::{PriorityFee, TransactionIntent};
use crate::trading::signer::{SignedTransaction, Tip};

/// Submission backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VenueKind {
    Jito,
    ZeroSlot,
    Nozomi,
    BloxRoute,
    Rpc,
    Simulated,
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VenueKind::Jito => "jito",
            VenueKind::ZeroSlot => "zeroslot",
            VenueKind::Nozomi => "nozomi",
            VenueKind::BloxRoute => "bloxroute",
            VenueKind::Rpc => "rpc",
            VenueKind::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VenueOutcome {
    Success,
    Failure(String),
    Timeout,
    Cancelled,
}

/// Outcome of one venue attempt for one intent
#[derive(Debug, Clone, PartialEq)]
pub struct VenueResult {
    pub venue: VenueKind,
    pub outcome: VenueOutcome,
    pub latency: Duration,
    pub signature: Option<Signature>,
}

impl VenueResult {
    pub fn is_success(&self) -> bool {
        self.outcome == VenueOutcome::Success
    }
}

/// One relay or RPC endpoint able to land a signed transaction
#[async_trait]
pub trait Venue: Send + Sync {
    fn kind(&self) -> VenueKind;

    /// Tip this venue expects inside the transaction
    fn tip(&self) -> Tip;

    /// Compute-budget settings for this venue
    fn priority_fee(&self, intent: &TransactionIntent) -> PriorityFee {
        intent.priority_fee
    }

    /// Single submission attempt; dropping the future abandons it
    async fn submit(&self, tx: &SignedTransaction) -> Result<Signature>;
}

/// Minimal JSON-RPC 2.0 client over reqwest
#[derive(Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    venue: VenueKind,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, venue: VenueKind) -> Self {
        Self {
            http,
            url: url.into(),
            venue,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| self.failure(format!("HTTP {}: {}", status, e)))?;

        if let Some(err) = payload.get("error") {
            return Err(Error::VenueRejected {
                venue: self.venue,
                reason: err.to_string(),
            });
        }
        if !status.is_success() {
            return Err(self.failure(format!("HTTP {}", status)));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| self.failure("response without result".to_string()))
    }

    /// `sendTransaction` with a base64 payload
    pub async fn send_transaction(&self, tx: &SignedTransaction, options: Value) -> Result<Signature> {
        let result = self
            .call("sendTransaction", json!([tx.base64(), options]))
            .await?;
        parse_signature(self.venue, &result)
    }

    fn failure(&self, reason: String) -> Error {
        Error::VenueFailure {
            venue: self.venue,
            reason,
        }
    }
}

pub fn encode_wire(wire: &[u8]) -> String {
    STANDARD.encode(wire)
}

/// Parse a base58 signature returned by a venue
pub fn parse_signature(venue: VenueKind, value: &Value) -> Result<Signature> {
    let s = value.as_str().ok_or_else(|| Error::VenueFailure {
        venue,
        reason: format!("unexpected result {}", value),
    })?;
    Signature::from_str(s).map_err(|e| Error::VenueFailure {
        venue,
        reason: format!("bad signature {:?}: {}", s, e),
    })
}
