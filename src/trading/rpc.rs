//! Direct RPC submission, used when no relay is enabled

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::signature::Signature;

use crate::error::Result;
use crate::trading::signer::{SignedTransaction, Tip};
use crate::trading::venue::{JsonRpcClient, Venue, VenueKind};

pub struct RpcVenue {
    rpc: JsonRpcClient,
}

impl RpcVenue {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(http, url, VenueKind::Rpc),
        }
    }
}

#[async_trait]
impl Venue for RpcVenue {
    fn kind(&self) -> VenueKind {
        VenueKind::Rpc
    }

    fn tip(&self) -> Tip {
        Tip::NONE
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<Signature> {
        // Single attempt; the router retries within the intent deadline
        self.rpc
            .send_transaction(
                tx,
                json!({"encoding": "base64", "skipPreflight": true, "maxRetries": 0}),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::trading::stub_http;

    fn signed() -> SignedTransaction {
        SignedTransaction {
            signature: Signature::new_unique(),
            wire: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_send_transaction_returns_signature() {
        let expected = Signature::new_unique();
        let (url, request) = stub_http::respond_once(
            200,
            format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#, expected),
        )
        .await;

        let signature = RpcVenue::new(stub_http::client(), url).submit(&signed()).await.unwrap();
        assert_eq!(signature, expected);

        let request = request.await.unwrap();
        assert!(request.contains(r#""method":"sendTransaction""#));
        assert!(request.contains("AQID"));
        assert!(request.contains(r#""skipPreflight":true"#));
    }

    #[tokio::test]
    async fn test_error_body_is_a_rejection() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Blockhash not found"}}"#;
        let (url, _request) = stub_http::respond_once(200, body.to_string()).await;

        let err = RpcVenue::new(stub_http::client(), url).submit(&signed()).await.unwrap_err();
        let Error::VenueRejected { venue, reason } = &err else {
            panic!("expected a rejection, got {:?}", err);
        };
        assert_eq!(*venue, VenueKind::Rpc);
        assert!(reason.contains("Blockhash not found"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = RpcVenue::new(stub_http::client(), url).submit(&signed()).await.unwrap_err();
        assert!(matches!(err, Error::VenueFailure { venue: VenueKind::Rpc, .. }));
    }
}
