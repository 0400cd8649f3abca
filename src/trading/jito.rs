//! Jito block-engine venue
//!
//! Submits either a single transaction (`/api/v1/transactions`) or a one-item
//! bundle (`/api/v1/bundles`) depending on BUNDLE_CHECK. The tip goes to one
//! of the published tip accounts, picked at random per transaction.

use async_trait::async_trait;
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::JitoConfig;
use crate::error::Result;
use crate::trading::intent::{PriorityFee, TransactionIntent};
use crate::trading::signer::{SignedTransaction, Tip};
use crate::trading::venue::{JsonRpcClient, Venue, VenueKind};

/// Jito tip accounts (mainnet)
pub const JITO_TIP_ACCOUNTS: [&str; 8] = [
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
];

lazy_static! {
    static ref TIP_ACCOUNTS: Vec<Pubkey> = JITO_TIP_ACCOUNTS
        .iter()
        .filter_map(|s| Pubkey::from_str(s).ok())
        .collect();
}

/// Jito client for transaction and bundle submission
pub struct JitoVenue {
    config: JitoConfig,
    transactions: JsonRpcClient,
    bundles: JsonRpcClient,
}

impl JitoVenue {
    pub fn new(http: reqwest::Client, config: JitoConfig) -> Self {
        let base = config.block_engine_url.trim_end_matches('/').to_string();
        info!(
            "Jito venue initialized for {} (bundle: {})",
            base, config.bundle
        );
        Self {
            transactions: JsonRpcClient::new(
                http.clone(),
                format!("{}/api/v1/transactions", base),
                VenueKind::Jito,
            ),
            bundles: JsonRpcClient::new(http, format!("{}/api/v1/bundles", base), VenueKind::Jito),
            config,
        }
    }

    /// Get a random tip account
    pub fn tip_account() -> Option<Pubkey> {
        TIP_ACCOUNTS.choose(&mut rand::thread_rng()).copied()
    }
}

#[async_trait]
impl Venue for JitoVenue {
    fn kind(&self) -> VenueKind {
        VenueKind::Jito
    }

    fn tip(&self) -> Tip {
        Tip {
            lamports: self.config.tip_value,
            recipient: Self::tip_account(),
        }
    }

    fn priority_fee(&self, intent: &TransactionIntent) -> PriorityFee {
        PriorityFee {
            unit_price_micro_lamports: self.config.priority_fee,
            unit_limit: intent.priority_fee.unit_limit,
        }
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<Signature> {
        if self.config.bundle {
            let bundle_id = self
                .bundles
                .call("sendBundle", json!([[tx.base64()], {"encoding": "base64"}]))
                .await?;
            debug!(%bundle_id, signature = %tx.signature, "Jito bundle accepted");
            Ok(tx.signature)
        } else {
            self.transactions
                .send_transaction(tx, json!({"encoding": "base64"}))
                .await
        }
    }
}
