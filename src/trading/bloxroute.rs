//! bloXroute trader API venue

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use tracing::info;

use crate::config::BloxRouteConfig;
use crate::error::{Error, Result};
use crate::trading::signer::{SignedTransaction, Tip};
use crate::trading::venue::{Venue, VenueKind};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    signature: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct BloxRouteVenue {
    http: reqwest::Client,
    endpoint: String,
    config: BloxRouteConfig,
}

impl BloxRouteVenue {
    pub fn new(http: reqwest::Client, config: BloxRouteConfig) -> Self {
        let endpoint = config.endpoint();
        info!("bloXroute venue initialized for {}", endpoint);
        Self {
            http,
            endpoint,
            config,
        }
    }

    /// Submit somewhere other than the configured network's endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn failure(reason: impl Into<String>) -> Error {
        Error::VenueFailure {
            venue: VenueKind::BloxRoute,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Venue for BloxRouteVenue {
    fn kind(&self) -> VenueKind {
        VenueKind::BloxRoute
    }

    fn tip(&self) -> Tip {
        Tip {
            lamports: self.config.tip_value,
            recipient: self.config.tip_account,
        }
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<Signature> {
        let body = json!({
            "transaction": {"content": tx.base64()},
            "frontRunningProtection": false,
            "useStakedRPCs": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", &self.config.auth_header)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        let status = response.status();
        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("HTTP {}: {}", status, e)))?;

        match parsed.signature {
            Some(sig) if status.is_success() => {
                Signature::from_str(&sig).map_err(|e| Self::failure(format!("bad signature: {}", e)))
            }
            _ if status.is_client_error() => Err(Error::VenueRejected {
                venue: VenueKind::BloxRoute,
                reason: parsed.message.unwrap_or_else(|| status.to_string()),
            }),
            _ => Err(Self::failure(
                parsed.message.unwrap_or_else(|| format!("HTTP {}", status)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::stub_http;

    fn venue(url: &str) -> BloxRouteVenue {
        let config = BloxRouteConfig {
            auth_header: "secret-token".to_string(),
            ..BloxRouteConfig::default()
        };
        BloxRouteVenue::new(stub_http::client(), config).with_endpoint(url)
    }

    fn signed() -> SignedTransaction {
        SignedTransaction {
            signature: Signature::new_unique(),
            wire: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_submit_sends_auth_and_parses_signature() {
        let expected = Signature::new_unique();
        let body = format!(r#"{{"signature":"{}"}}"#, expected);
        let (url, request) = stub_http::respond_once(200, body).await;

        let signature = venue(&url).submit(&signed()).await.unwrap();
        assert_eq!(signature, expected);

        let request = request.await.unwrap();
        assert!(request.to_ascii_lowercase().contains("authorization: secret-token"));
        assert!(request.contains(r#""content":"AQID""#));
    }

    #[tokio::test]
    async fn test_client_error_is_a_rejection() {
        let (url, _request) =
            stub_http::respond_once(400, r#"{"message":"invalid transaction"}"#.to_string()).await;

        let err = venue(&url).submit(&signed()).await.unwrap_err();
        let Error::VenueRejected { venue, reason } = &err else {
            panic!("expected a rejection, got {:?}", err);
        };
        assert_eq!(*venue, VenueKind::BloxRoute);
        assert_eq!(reason, "invalid transaction");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let body = r#"{"message":"overloaded"}"#.to_string();
        let (url, _request) = stub_http::respond_once(503, body).await;

        let err = venue(&url).submit(&signed()).await.unwrap_err();
        assert!(matches!(&err, Error::VenueFailure { reason, .. } if reason == "overloaded"));
        assert!(err.is_retryable());
    }
}
