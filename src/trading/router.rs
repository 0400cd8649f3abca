//! Execution router
//!
//! Races every enabled relay for an intent under its deadline. The first venue
//! to accept wins and the rest are cancelled through a per-intent
//! `CancellationToken`. With no relay enabled, the intent goes to direct RPC
//! with exponential backoff, bounded by COUNTER attempts and the deadline.
//! Simulated intents never leave the process.

use backoff::{future::retry, ExponentialBackoff};
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use solana_sdk::signature::Signature;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::trading::bloxroute::BloxRouteVenue;
use crate::trading::intent::TransactionIntent;
use crate::trading::jito::JitoVenue;
use crate::trading::relay::RelayVenue;
use crate::trading::rpc::RpcVenue;
use crate::trading::signer::{RouteParams, TransactionSigner};
use crate::trading::simulation;
use crate::trading::venue::{Venue, VenueKind, VenueOutcome, VenueResult};

/// How long a signature stays in the ledger past its intent's deadline
pub const LEDGER_RETENTION: Duration = Duration::from_secs(90);

/// Where a submitted signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub intent_id: Uuid,
    pub venue: VenueKind,
    pub expires_at: Instant,
}

/// Every signature handed to a venue, keyed for deduplication of confirmations
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    entries: DashMap<Signature, LedgerEntry>,
}

impl SubmissionLedger {
    /// Record a signature submitted for `intent`; false if it was already known
    pub fn record(&self, signature: Signature, intent: &TransactionIntent, venue: VenueKind) -> bool {
        let entry = LedgerEntry {
            intent_id: intent.id,
            venue,
            expires_at: intent.deadline + LEDGER_RETENTION,
        };
        self.entries.insert(signature, entry).is_none()
    }

    /// Forget signatures whose retention ran out; returns how many were dropped
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn lookup(&self, signature: &Signature) -> Option<LedgerEntry> {
        self.entries.get(signature).map(|e| *e)
    }

    /// Signatures submitted for one intent
    pub fn signatures_for(&self, intent_id: Uuid) -> Vec<Signature> {
        self.entries
            .iter()
            .filter(|e| e.value().intent_id == intent_id)
            .map(|e| *e.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct VenueSlot {
    venue: Arc<dyn Venue>,
    permits: Arc<Semaphore>,
}

pub struct ExecutionRouter {
    relays: Vec<VenueSlot>,
    rpc: Option<VenueSlot>,
    signer: Option<Arc<dyn TransactionSigner>>,
    ledger: Arc<SubmissionLedger>,
    rpc_attempts: u32,
    max_inflight: usize,
}

impl ExecutionRouter {
    pub fn new(signer: Option<Arc<dyn TransactionSigner>>, rpc_attempts: u32, max_inflight: usize) -> Self {
        Self {
            relays: Vec::new(),
            rpc: None,
            signer,
            ledger: Arc::new(SubmissionLedger::default()),
            rpc_attempts: rpc_attempts.max(1),
            max_inflight: max_inflight.max(1),
        }
    }

    /// Build the router with every venue the configuration enables
    pub fn from_config(config: &Config, signer: Option<Arc<dyn TransactionSigner>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let mut router = Self::new(signer, config.trading.counter, config.trading.venue_max_inflight);

        if config.jito.use_jito {
            router = router.with_relay(Arc::new(JitoVenue::new(http.clone(), config.jito.clone())));
        }
        if config.zero_slot.enabled() {
            router = router.with_relay(Arc::new(RelayVenue::zero_slot(
                http.clone(),
                config.zero_slot.clone(),
            )));
        }
        if config.nozomi.enabled() {
            router = router.with_relay(Arc::new(RelayVenue::nozomi(http.clone(), config.nozomi.clone())));
        }
        if config.blox_route.enabled() {
            router = router.with_relay(Arc::new(BloxRouteVenue::new(
                http.clone(),
                config.blox_route.clone(),
            )));
        }
        router = router.with_rpc(Arc::new(RpcVenue::new(http, config.trading.rpc_http.clone())));

        info!(
            "Execution router ready: relays [{}], rpc fallback {}",
            router.relay_kinds().iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", "),
            if router.relays.is_empty() { "active" } else { "standby" }
        );
        Ok(router)
    }

    pub fn with_relay(mut self, venue: Arc<dyn Venue>) -> Self {
        let slot = self.slot(venue);
        self.relays.push(slot);
        self
    }

    pub fn with_rpc(mut self, venue: Arc<dyn Venue>) -> Self {
        self.rpc = Some(self.slot(venue));
        self
    }

    fn slot(&self, venue: Arc<dyn Venue>) -> VenueSlot {
        VenueSlot {
            venue,
            permits: Arc::new(Semaphore::new(self.max_inflight)),
        }
    }

    pub fn relay_kinds(&self) -> Vec<VenueKind> {
        self.relays.iter().map(|s| s.venue.kind()).collect()
    }

    pub fn ledger(&self) -> Arc<SubmissionLedger> {
        self.ledger.clone()
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// Submit an intent; `AllVenuesFailed` carries every attempt
    pub async fn submit(&self, intent: &TransactionIntent) -> Result<VenueResult> {
        if intent.simulated {
            let result = simulation::simulate(intent);
            if let Some(signature) = result.signature {
                self.ledger.record(signature, intent, result.venue);
            }
            return Ok(result);
        }

        if intent.is_expired(Instant::now()) {
            return Err(Error::DeadlineExpired(intent.id));
        }

        let signer = self
            .signer
            .clone()
            .ok_or_else(|| Error::Signer("no transaction signer configured".to_string()))?;

        let result = if !self.relays.is_empty() {
            self.race(intent, signer).await
        } else if let Some(rpc) = &self.rpc {
            self.rpc_with_retry(rpc, intent, signer).await
        } else {
            Err(Error::AllVenuesFailed {
                intent_id: intent.id,
                attempts: Vec::new(),
            })
        };

        match &result {
            Ok(winner) => info!(
                intent = %intent.id,
                side = %intent.side,
                mint = %intent.mint,
                venue = %winner.venue,
                latency_ms = winner.latency.as_millis() as u64,
                "Intent landed"
            ),
            Err(e) => warn!(intent = %intent.id, mint = %intent.mint, "Intent failed: {}", e),
        }
        result
    }

    async fn race(&self, intent: &TransactionIntent, signer: Arc<dyn TransactionSigner>) -> Result<VenueResult> {
        let cancel = CancellationToken::new();
        let mut inflight: FuturesUnordered<_> = self
            .relays
            .iter()
            .map(|slot| attempt(slot, intent, signer.clone(), &self.ledger, cancel.child_token()))
            .collect();

        let mut attempts = Vec::with_capacity(self.relays.len());
        while let Some(result) = inflight.next().await {
            if result.is_success() {
                cancel.cancel();
                while let Some(sibling) = inflight.next().await {
                    debug!(venue = %sibling.venue, outcome = ?sibling.outcome, "Sibling attempt finished");
                }
                return Ok(result);
            }
            debug!(venue = %result.venue, outcome = ?result.outcome, "Venue attempt failed");
            attempts.push(result);
        }

        Err(Error::AllVenuesFailed {
            intent_id: intent.id,
            attempts,
        })
    }

    async fn rpc_with_retry(
        &self,
        rpc: &VenueSlot,
        intent: &TransactionIntent,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<VenueResult> {
        let cancel = CancellationToken::new();
        let count = AtomicU32::new(0);
        let attempts = Mutex::new(Vec::new());

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_millis(200),
            max_elapsed_time: Some(intent.remaining(Instant::now())),
            ..Default::default()
        };

        let outcome = retry(backoff, || async {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            let result = attempt(rpc, intent, signer.clone(), &self.ledger, cancel.child_token()).await;
            match &result.outcome {
                VenueOutcome::Success => Ok(result),
                VenueOutcome::Failure(reason) if n < self.rpc_attempts && !intent.is_expired(Instant::now()) => {
                    warn!(attempt = n, "RPC submission failed, retrying: {}", reason);
                    lock(&attempts).push(result);
                    Err(backoff::Error::transient(()))
                }
                _ => {
                    lock(&attempts).push(result);
                    Err(backoff::Error::permanent(()))
                }
            }
        })
        .await;

        outcome.map_err(|()| Error::AllVenuesFailed {
            intent_id: intent.id,
            attempts: std::mem::take(&mut *lock(&attempts)),
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One venue attempt: sign the venue variant, record it, submit before the deadline
async fn attempt(
    slot: &VenueSlot,
    intent: &TransactionIntent,
    signer: Arc<dyn TransactionSigner>,
    ledger: &SubmissionLedger,
    cancel: CancellationToken,
) -> VenueResult {
    let venue = slot.venue.kind();
    let started = Instant::now();
    let deadline = tokio::time::Instant::from_std(intent.deadline);

    let submission = async {
        let _permit = slot
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        let route = RouteParams {
            venue,
            tip: slot.venue.tip(),
            priority_fee: slot.venue.priority_fee(intent),
        };
        let signed = signer.sign(intent, &route).await?;
        ledger.record(signed.signature, intent, venue);
        slot.venue.submit(&signed).await
    };

    let (outcome, signature) = tokio::select! {
        biased;
        _ = cancel.cancelled() => (VenueOutcome::Cancelled, None),
        result = tokio::time::timeout_at(deadline, submission) => match result {
            Err(_) => (VenueOutcome::Timeout, None),
            Ok(Ok(signature)) => (VenueOutcome::Success, Some(signature)),
            Ok(Err(e)) => (VenueOutcome::Failure(e.to_string()), None),
        },
    };

    VenueResult {
        venue,
        outcome,
        latency: started.elapsed(),
        signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::intent::{IntentFactory, IntentMode, IntentOrigin};
    use crate::trading::signer::{SignedTransaction, Tip};
    use async_trait::async_trait;
    use solana_sdk::pubkey::Pubkey;

    struct FakeSigner;

    #[async_trait]
    impl TransactionSigner for FakeSigner {
        async fn sign(&self, _intent: &TransactionIntent, _route: &RouteParams) -> Result<SignedTransaction> {
            Ok(SignedTransaction {
                signature: Signature::new_unique(),
                wire: vec![1, 2, 3],
            })
        }
    }

    struct FakeVenue {
        kind: VenueKind,
        delay: Duration,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl FakeVenue {
        fn new(kind: VenueKind, delay_ms: u64) -> Arc<Self> {
            Self::failing(kind, delay_ms, 0)
        }

        fn failing(kind: VenueKind, delay_ms: u64, fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                kind,
                delay: Duration::from_millis(delay_ms),
                fail_first,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Venue for FakeVenue {
        fn kind(&self) -> VenueKind {
            self.kind
        }

        fn tip(&self) -> Tip {
            Tip::NONE
        }

        async fn submit(&self, tx: &SignedTransaction) -> Result<Signature> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.fail_first {
                return Err(Error::VenueFailure {
                    venue: self.kind,
                    reason: "node is behind".to_string(),
                });
            }
            Ok(tx.signature)
        }
    }

    fn intent_with_wait(max_wait_ms: u64, simulated: bool) -> TransactionIntent {
        let mut config = Config::default();
        config.trading.max_wait_time_ms = max_wait_ms;
        config.mode.simulation_mode = simulated;
        IntentFactory::new(&config).buy(
            Pubkey::new_unique(),
            1_000_000_000,
            IntentMode::Normal,
            IntentOrigin::Filter,
        )
    }

    fn signer() -> Option<Arc<dyn TransactionSigner>> {
        Some(Arc::new(FakeSigner))
    }

    #[tokio::test]
    async fn test_fastest_venue_wins() {
        let jito = FakeVenue::new(VenueKind::Jito, 200);
        let zero_slot = FakeVenue::new(VenueKind::ZeroSlot, 150);
        let router = ExecutionRouter::new(signer(), 10, 4)
            .with_relay(jito.clone())
            .with_relay(zero_slot.clone());

        let intent = intent_with_wait(650, false);
        let started = Instant::now();
        let result = router.submit(&intent).await.unwrap();

        assert_eq!(result.venue, VenueKind::ZeroSlot);
        assert!(result.signature.is_some());
        assert!(started.elapsed() < Duration::from_millis(200));
        // both venue variants were signed and recorded
        assert_eq!(router.ledger().signatures_for(intent.id).len(), 2);
        let winner = router.ledger().lookup(&result.signature.unwrap()).unwrap();
        assert_eq!(winner.venue, VenueKind::ZeroSlot);
    }

    #[tokio::test]
    async fn test_deadline_fails_all_venues() {
        let router = ExecutionRouter::new(signer(), 10, 4)
            .with_relay(FakeVenue::new(VenueKind::Jito, 500))
            .with_relay(FakeVenue::new(VenueKind::Nozomi, 500));

        let intent = intent_with_wait(100, false);
        let started = Instant::now();
        match router.submit(&intent).await {
            Err(Error::AllVenuesFailed { intent_id, attempts }) => {
                assert_eq!(intent_id, intent.id);
                assert_eq!(attempts.len(), 2);
                assert!(attempts.iter().all(|a| a.outcome == VenueOutcome::Timeout));
            }
            other => panic!("expected AllVenuesFailed, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_failures_are_collected() {
        let router = ExecutionRouter::new(signer(), 10, 4)
            .with_relay(FakeVenue::failing(VenueKind::Jito, 10, 1))
            .with_relay(FakeVenue::failing(VenueKind::BloxRoute, 20, 1));

        let err = router.submit(&intent_with_wait(650, false)).await.unwrap_err();
        match err {
            Error::AllVenuesFailed { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts
                    .iter()
                    .all(|a| matches!(a.outcome, VenueOutcome::Failure(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_double_submit() {
        let jito = FakeVenue::new(VenueKind::Jito, 10);
        let router = ExecutionRouter::new(None, 10, 4).with_relay(jito.clone());
        let intent = intent_with_wait(650, true);

        let first = router.submit(&intent).await.unwrap();
        let second = router.submit(&intent).await.unwrap();

        assert_eq!(first.venue, VenueKind::Simulated);
        assert_ne!(first.signature, second.signature);
        assert_eq!(jito.calls.load(Ordering::SeqCst), 0);
        assert_eq!(router.ledger().len(), 2);
    }

    #[tokio::test]
    async fn test_rpc_retries_until_success() {
        let rpc = FakeVenue::failing(VenueKind::Rpc, 5, 2);
        let router = ExecutionRouter::new(signer(), 10, 4).with_rpc(rpc.clone());

        let result = router.submit(&intent_with_wait(650, false)).await.unwrap();
        assert_eq!(result.venue, VenueKind::Rpc);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rpc_respects_counter() {
        let rpc = FakeVenue::failing(VenueKind::Rpc, 5, 100);
        let router = ExecutionRouter::new(signer(), 2, 4).with_rpc(rpc.clone());

        match router.submit(&intent_with_wait(650, false)).await {
            Err(Error::AllVenuesFailed { attempts, .. }) => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_relays_take_precedence_over_rpc() {
        let rpc = FakeVenue::new(VenueKind::Rpc, 1);
        let router = ExecutionRouter::new(signer(), 10, 4)
            .with_relay(FakeVenue::new(VenueKind::Nozomi, 20))
            .with_rpc(rpc.clone());

        let result = router.submit(&intent_with_wait(650, false)).await.unwrap();
        assert_eq!(result.venue, VenueKind::Nozomi);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_live_without_signer() {
        let router = ExecutionRouter::new(None, 10, 4).with_relay(FakeVenue::new(VenueKind::Jito, 1));
        let err = router.submit(&intent_with_wait(650, false)).await.unwrap_err();
        assert!(matches!(err, Error::Signer(_)));
    }

    #[test]
    fn test_ledger_dedup() {
        let ledger = SubmissionLedger::default();
        let sig = Signature::new_unique();
        let intent = intent_with_wait(650, false);
        assert!(ledger.record(sig, &intent, VenueKind::Jito));
        assert!(!ledger.record(sig, &intent, VenueKind::Jito));
        assert_eq!(ledger.lookup(&sig).map(|e| e.intent_id), Some(intent.id));
    }

    #[test]
    fn test_ledger_prunes_after_retention() {
        let ledger = SubmissionLedger::default();
        let intent = intent_with_wait(650, false);
        ledger.record(Signature::new_unique(), &intent, VenueKind::Jito);
        ledger.record(Signature::new_unique(), &intent, VenueKind::Rpc);

        assert_eq!(ledger.prune(intent.deadline), 0);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.prune(intent.deadline + LEDGER_RETENTION), 2);
        assert!(ledger.is_empty());
    }
}
