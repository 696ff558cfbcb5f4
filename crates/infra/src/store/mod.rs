//! Storage ports for cards, idempotency records and the transactional outbox.
//!
//! ## Design
//!
//! - Reads go through narrow per-concern traits (`CardRepository`,
//!   `IdempotencyStore`, `OutboxStore`).
//! - Every workflow write goes through [`UnitOfWork::commit`], which applies a
//!   whole [`ChangeSet`] or nothing. Card mutations and the outbox entries they
//!   produce are therefore never observable apart.
//! - Idempotency keys are unique at the storage level: a change set whose key
//!   is already recorded is rejected with [`CommitOutcome::DuplicateKey`].

pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardissue_cards::Card;
use cardissue_core::{CardId, CustomerId, ExpectedVersion, OutboxEntryId, ProposalId};
use cardissue_events::IntegrationEvent;

pub use in_memory::InMemoryStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),
}

/// Caller-supplied key mapped to the cards produced for it. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub card_ids: Vec<CardId>,
    pub created_at: DateTime<Utc>,
}

/// One not-yet-guaranteed-delivered integration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    pub topic: String,
    /// JSON payload.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// `None` while pending. Never cleared once set.
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OutboxEntryId::new(),
            topic: topic.into(),
            payload: payload.into(),
            created_at,
            sent_at: None,
        }
    }

    /// Serialize an integration event into a pending entry on its own topic.
    pub fn for_event<E: IntegrationEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event.topic(), event.to_payload()?, event.occurred_at()))
    }

    pub fn is_pending(&self) -> bool {
        self.sent_at.is_none()
    }
}

/// A card write guarded by an optimistic concurrency expectation.
#[derive(Debug, Clone)]
pub struct CardWrite {
    pub card: Card,
    pub expected: ExpectedVersion,
}

/// Everything one workflow step persists, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub cards: Vec<CardWrite>,
    pub idempotency: Option<IdempotencyRecord>,
    pub outbox: Vec<OutboxEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a card that must not exist yet.
    pub fn insert_card(mut self, card: Card) -> Self {
        self.cards.push(CardWrite {
            card,
            expected: ExpectedVersion::Absent,
        });
        self
    }

    /// Replace a stored card currently at `expected_version`.
    pub fn update_card(mut self, card: Card, expected_version: u64) -> Self {
        self.cards.push(CardWrite {
            card,
            expected: ExpectedVersion::Exact(expected_version),
        });
        self
    }

    pub fn with_idempotency(mut self, record: IdempotencyRecord) -> Self {
        self.idempotency = Some(record);
        self
    }

    pub fn append(mut self, entry: OutboxEntry) -> Self {
        self.outbox.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.idempotency.is_none() && self.outbox.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The change set's idempotency key was already recorded; nothing was written.
    DuplicateKey(IdempotencyRecord),
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn get(&self, id: CardId) -> Result<Option<Card>, StoreError>;

    /// Cards for `ids`, in the order of `ids`. Missing ids are skipped.
    async fn get_many(&self, ids: &[CardId]) -> Result<Vec<Card>, StoreError>;

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Card>, StoreError>;

    async fn list_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<Card>, StoreError>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Up to `limit` pending entries, oldest first.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError>;

    async fn mark_sent(&self, id: OutboxEntryId, sent_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete sent entries created before `cutoff`. Returns how many were removed.
    async fn purge_sent_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, StoreError>;
}

/// Convenience bound for stores that back the card workflows.
pub trait CardStore: CardRepository + IdempotencyStore + UnitOfWork {}

impl<T: CardRepository + IdempotencyStore + UnitOfWork> CardStore for T {}
