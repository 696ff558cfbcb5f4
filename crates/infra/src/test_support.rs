//! Fixtures and fault-injection doubles shared by the crate's tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use uuid::Uuid;

use cardissue_cards::{ActivationChannel, Card, CardClass, DeliveryPreference, Expiry, NewCard};
use cardissue_core::{AccountId, CardId, CustomerId, OutboxEntryId, ProposalId};
use cardissue_events::{
    CardIssuanceRequested, DeliveryType, MessagePublisher, PublishError, PublishedMessage,
};
use cardissue_vault::{InMemoryTokenVault, PanGenerator, VaultKey};

use crate::config::IssuanceConfig;
use crate::store::{
    CardRepository, CardStore, ChangeSet, CommitOutcome, IdempotencyRecord, IdempotencyStore,
    InMemoryStore, OutboxEntry, OutboxStore, StoreError, UnitOfWork,
};
use crate::workflows::{ActivationRequest, CardIssuanceWorkflow, IssuanceRequest};

/// Fixed instant `secs` seconds after 2026-10-16T00:00:00Z.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

fn new_card(expiry: Expiry, pan_token: &str, cvv_token: &str) -> NewCard {
    NewCard {
        customer_id: CustomerId::new(),
        proposal_id: ProposalId::new(),
        account_id: AccountId::new(),
        product_code: "VISA_GOLD".to_string(),
        card_class: CardClass::Virtual,
        pan_token: pan_token.to_string(),
        cvv_token: cvv_token.to_string(),
        expiry,
        credit_limit: 250_000,
        correlation_id: "corr-fixture".to_string(),
    }
}

pub fn card_with_tokens(pan_token: &str, cvv_token: &str) -> Card {
    let now = Utc::now();
    let expiry = Expiry::years_from(now, 3).unwrap();
    let mut card = Card::request(new_card(expiry, pan_token, cvv_token), now).unwrap();
    card.mark_issued(now).unwrap();
    card
}

/// An `ISSUED` card valid for three years from the real clock.
pub fn issued_card() -> Card {
    card_with_tokens(
        &format!("tok_pan_{}", Uuid::new_v4().simple()),
        &format!("tok_cvv_{}", Uuid::new_v4().simple()),
    )
}

/// An `ISSUED` card belonging to `proposal_id`.
pub fn issued_card_for_proposal(proposal_id: ProposalId) -> Card {
    let now = Utc::now();
    let expiry = Expiry::years_from(now, 3).unwrap();
    let new = NewCard {
        proposal_id,
        ..new_card(
            expiry,
            &format!("tok_pan_{}", Uuid::new_v4().simple()),
            &format!("tok_cvv_{}", Uuid::new_v4().simple()),
        )
    };
    let mut card = Card::request(new, now).unwrap();
    card.mark_issued(now).unwrap();
    card
}

/// An `ISSUED` card whose expiry lapsed at the end of 2021.
pub fn expired_issued_card() -> Card {
    let then = Utc.with_ymd_and_hms(2020, 1, 15, 12, 0, 0).unwrap();
    let expiry = Expiry::new(12, 2021).unwrap();
    let mut card = Card::request(new_card(expiry, "tok_pan_old", "tok_cvv_old"), then).unwrap();
    card.mark_issued(then).unwrap();
    card
}

pub fn activation_request(card_id: CardId, channel: ActivationChannel) -> ActivationRequest {
    ActivationRequest {
        card_id,
        credential: "123456".to_string(),
        channel,
        correlation_id: "corr-activation".to_string(),
    }
}

pub fn vault() -> Arc<InMemoryTokenVault> {
    Arc::new(InMemoryTokenVault::new(&VaultKey::generate()))
}

pub fn issuance_workflow<S: CardStore>(
    store: Arc<S>,
    vault: Arc<InMemoryTokenVault>,
) -> CardIssuanceWorkflow<S, InMemoryTokenVault> {
    CardIssuanceWorkflow::new(
        store,
        vault,
        Arc::new(PanGenerator::with_rng(StdRng::from_entropy())),
        IssuanceConfig::default(),
    )
}

/// Valid request carrying a fresh idempotency key.
pub fn issuance_request(card_count: u8, delivery: DeliveryPreference) -> IssuanceRequest {
    IssuanceRequest {
        customer_id: CustomerId::new(),
        proposal_id: ProposalId::new(),
        account_id: AccountId::new(),
        product_code: "VISA_GOLD".to_string(),
        card_count,
        limit_per_card: 500_000,
        delivery,
        correlation_id: format!("corr-{}", Uuid::new_v4()),
        idempotency_key: Some(format!("idem-{}", Uuid::new_v4())),
    }
}

/// Approved two-card intake event with a fresh idempotency key.
pub fn issuance_requested(delivery_type: DeliveryType) -> CardIssuanceRequested {
    CardIssuanceRequested {
        customer_id: CustomerId::new(),
        proposal_id: ProposalId::new(),
        account_id: AccountId::new(),
        product_code: "MASTERCARD_GOLD".to_string(),
        card_count: 2,
        limit_per_card: 300_000,
        delivery_type,
        correlation_id: format!("corr-{}", Uuid::new_v4()),
        idempotency_key: Some(format!("idem-{}", Uuid::new_v4())),
        credit_score: 720,
        requested_at: Utc::now(),
    }
}

/// Store wrapper that fails a configurable number of commits or fetches.
pub struct FailingStore {
    inner: Arc<InMemoryStore>,
    failing_commits: AtomicU32,
    failing_fetches: AtomicU32,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing_commits: AtomicU32::new(0),
            failing_fetches: AtomicU32::new(0),
        }
    }

    pub fn fail_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, n: u32) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CardRepository for FailingStore {
    async fn get(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        self.inner.get(id).await
    }

    async fn get_many(&self, ids: &[CardId]) -> Result<Vec<Card>, StoreError> {
        self.inner.get_many(ids).await
    }

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Card>, StoreError> {
        self.inner.list_by_customer(customer_id).await
    }

    async fn list_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<Card>, StoreError> {
        self.inner.list_by_proposal(proposal_id).await
    }
}

#[async_trait]
impl IdempotencyStore for FailingStore {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.inner.find(key).await
    }
}

#[async_trait]
impl UnitOfWork for FailingStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, StoreError> {
        if Self::take(&self.failing_commits) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        self.inner.commit(changes).await
    }
}

#[async_trait]
impl OutboxStore for FailingStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        if Self::take(&self.failing_fetches) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        self.inner.fetch_pending(limit).await
    }

    async fn mark_sent(&self, id: OutboxEntryId, sent_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.mark_sent(id, sent_at).await
    }

    async fn purge_sent_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.purge_sent_before(cutoff).await
    }
}

enum Failure {
    FirstCalls(u32),
    Topic(String),
}

/// Publisher that fails on purpose and records when each call happened.
pub struct FlakyPublisher {
    failure: Failure,
    calls: Mutex<Vec<(String, Instant)>>,
    delivered: Mutex<Vec<PublishedMessage>>,
}

impl FlakyPublisher {
    /// Fail the first `n` calls, then succeed.
    pub fn failing_first(n: u32) -> Self {
        Self::with(Failure::FirstCalls(n))
    }

    /// Always fail on `topic`.
    pub fn failing_topic(topic: &str) -> Self {
        Self::with(Failure::Topic(topic.to_string()))
    }

    fn with(failure: Failure) -> Self {
        Self {
            failure,
            calls: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, topic: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(t, _)| t == topic).count()
    }

    /// Elapsed time between consecutive calls.
    pub fn gaps(&self) -> Vec<std::time::Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }

    pub fn delivered(&self) -> Vec<PublishedMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for FlakyPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((topic.to_string(), Instant::now()));
            calls.len() as u32
        };

        let fail = match &self.failure {
            Failure::FirstCalls(n) => call_number <= *n,
            Failure::Topic(t) => t == topic,
        };
        if fail {
            return Err(PublishError::Unavailable(format!("injected failure #{call_number}")));
        }

        self.delivered.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

/// Publisher that looks at the store while each publish is in flight and
/// records whether the entry being published was still pending.
pub struct PendingCheckPublisher {
    store: Arc<InMemoryStore>,
    pending_while_publishing: Mutex<Vec<(String, bool)>>,
}

impl PendingCheckPublisher {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            pending_while_publishing: Mutex::new(Vec::new()),
        }
    }

    /// `(payload, still pending)` per publish call, in call order.
    pub fn observations(&self) -> Vec<(String, bool)> {
        self.pending_while_publishing.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for PendingCheckPublisher {
    async fn publish(&self, _topic: &str, payload: &str) -> Result<(), PublishError> {
        let pending = self
            .store
            .fetch_pending(usize::MAX)
            .await
            .unwrap()
            .iter()
            .any(|e| e.payload == payload);
        self.pending_while_publishing
            .lock()
            .unwrap()
            .push((payload.to_string(), pending));
        Ok(())
    }
}
