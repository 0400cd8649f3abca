//! Plain JSON-RPC relays (ZeroSlot, Nozomi)
//!
//! Both accept a standard `sendTransaction` call and expect the tip transfer
//! to be inside the transaction itself.

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::signature::Signature;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::trading::signer::{SignedTransaction, Tip};
use crate::trading::venue::{JsonRpcClient, Venue, VenueKind};

pub struct RelayVenue {
    kind: VenueKind,
    config: RelayConfig,
    rpc: JsonRpcClient,
}

impl RelayVenue {
    pub fn zero_slot(http: reqwest::Client, config: RelayConfig) -> Self {
        Self::new(VenueKind::ZeroSlot, http, config)
    }

    pub fn nozomi(http: reqwest::Client, config: RelayConfig) -> Self {
        Self::new(VenueKind::Nozomi, http, config)
    }

    fn new(kind: VenueKind, http: reqwest::Client, config: RelayConfig) -> Self {
        info!("{} venue initialized", kind);
        Self {
            kind,
            rpc: JsonRpcClient::new(http, config.url.clone(), kind),
            config,
        }
    }
}

#[async_trait]
impl Venue for RelayVenue {
    fn kind(&self) -> VenueKind {
        self.kind
    }

    fn tip(&self) -> Tip {
        Tip {
            lamports: self.config.tip_value,
            recipient: self.config.tip_account,
        }
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<Signature> {
        self.rpc
            .send_transaction(tx, json!({"encoding": "base64", "skipPreflight": true}))
            .await
    }
}
