//! Event types delivered by the ingestion source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::filter::types::TokenCandidate;
use crate::trading::intent::Side;

/// Everything the engine reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// New or refreshed token snapshot
    Candidate(TokenCandidate),
    /// Trade by a watched wallet
    WalletTrade(WalletTrade),
    /// Price / liquidity tick for a token
    Market(MarketUpdate),
    /// Health of the upstream source
    Source(SourceStatus),
}

impl EngineEvent {
    /// Whether this event travels in the priority lane
    pub fn is_priority(&self) -> bool {
        !matches!(self, EngineEvent::Candidate(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Candidate(_) => "candidate",
            EngineEvent::WalletTrade(_) => "wallet_trade",
            EngineEvent::Market(_) => "market",
            EngineEvent::Source(_) => "source",
        }
    }
}

/// Trade observed from a target wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTrade {
    #[serde(with = "pubkey_serde")]
    pub wallet: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub mint: Pubkey,
    pub side: Side,
    /// SOL moved by the trade, in lamports
    pub lamports: u64,
    /// Tokens moved by the trade
    pub token_amount: u64,
    pub market_cap: f64,
    /// Monotonic per-wallet sequence (slot or stream index)
    pub sequence: u64,
    pub observed_at: DateTime<Utc>,
}

/// Price tick for a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketUpdate {
    #[serde(with = "pubkey_serde")]
    pub mint: Pubkey,
    /// Price in SOL per token
    pub price: f64,
    /// Total SOL invested in the token, in SOL
    pub sol_invested: f64,
    pub market_cap: f64,
    pub observed_at: DateTime<Utc>,
}

impl MarketUpdate {
    pub fn sol_invested_lamports(&self) -> u64 {
        (self.sol_invested * 1e9).max(0.0) as u64
    }
}

/// Upstream connection state
///
/// Workers may apply status events out of order; `observed_at` decides which
/// one is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub connected: bool,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl SourceStatus {
    pub fn up() -> Self {
        Self {
            connected: true,
            detail: None,
            observed_at: Utc::now(),
        }
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self {
            connected: false,
            detail: Some(detail.into()),
            observed_at: Utc::now(),
        }
    }
}

/// Serialize a `Pubkey` as its base58 string
pub mod pubkey_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(de::Error::custom)
    }
}

/// Optional `Pubkey` as a base58 string or null
pub mod option_pubkey_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => serializer.collect_str(key),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Pubkey::from_str(&s).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let line = r#"{"type":"market","mint":"11111111111111111111111111111112","price":0.5,"sol_invested":3.0,"market_cap":10.0,"observed_at":"2024-05-01T12:00:00Z"}"#;
        let event: EngineEvent = serde_json::from_str(line).unwrap();
        match &event {
            EngineEvent::Market(update) => {
                assert_eq!(update.mint.to_string(), "11111111111111111111111111111112");
                assert_eq!(update.sol_invested_lamports(), 3_000_000_000);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(event.is_priority());
    }

    #[test]
    fn test_source_status_default_detail() {
        let before = Utc::now();
        let event: EngineEvent = serde_json::from_str(r#"{"type":"source","connected":false}"#).unwrap();
        let EngineEvent::Source(status) = event else {
            panic!("expected a source event");
        };
        assert!(!status.connected);
        assert_eq!(status.detail, None);
        assert!(status.observed_at >= before);
    }

    #[test]
    fn test_candidate_creator_is_optional() {
        let line = r#"{"type":"candidate","mint":"11111111111111111111111111111112","market_cap":1.0,"volume":1.0,"buy_count":1,"sell_count":1,"launcher_sol_balance":0.1,"dev_buy_sol":1.0,"sol_invested":1.0,"price":0.1,"launched_at":"2024-05-01T12:00:00Z","observed_at":"2024-05-01T12:00:01Z"}"#;
        let EngineEvent::Candidate(candidate) = serde_json::from_str(line).unwrap() else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.creator, None);

        let creator = Pubkey::new_unique();
        let json = line.replace("\"price\"", &format!("\"creator\":\"{}\",\"price\"", creator));
        let EngineEvent::Candidate(candidate) = serde_json::from_str(&json).unwrap() else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.creator, Some(creator));
    }
}
