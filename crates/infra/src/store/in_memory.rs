use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cardissue_cards::Card;
use cardissue_core::{AggregateRoot, CardId, CustomerId, OutboxEntryId, ProposalId};

use super::{
    CardRepository, ChangeSet, CommitOutcome, IdempotencyRecord, IdempotencyStore, OutboxEntry,
    OutboxStore, StoreError, UnitOfWork,
};

#[derive(Debug, Default)]
struct State {
    cards: HashMap<CardId, Card>,
    idempotency: HashMap<String, IdempotencyRecord>,
    outbox: Vec<OutboxEntry>,
}

/// In-memory reference store.
///
/// One lock guards all three tables, so a commit is trivially atomic and the
/// idempotency uniqueness check cannot interleave with another commit.
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every outbox entry, pending or sent, in insertion order.
    pub fn outbox_entries(&self) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.read()?.outbox.clone())
    }

    pub fn card_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.cards.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl CardRepository for InMemoryStore {
    async fn get(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        Ok(self.read()?.cards.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[CardId]) -> Result<Vec<Card>, StoreError> {
        let state = self.read()?;
        Ok(ids.iter().filter_map(|id| state.cards.get(id).cloned()).collect())
    }

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Card>, StoreError> {
        let state = self.read()?;
        Ok(state
            .cards
            .values()
            .filter(|c| c.customer_id() == customer_id)
            .cloned()
            .collect())
    }

    async fn list_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<Card>, StoreError> {
        let state = self.read()?;
        Ok(state
            .cards
            .values()
            .filter(|c| c.proposal_id() == proposal_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStore {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self.read()?.idempotency.get(key).cloned())
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        let state = self.read()?;
        let mut pending: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|e| e.is_pending())
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_sent(&self, id: OutboxEntryId, sent_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.outbox.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                if entry.sent_at.is_none() {
                    entry.sent_at = Some(sent_at);
                }
                Ok(())
            }
            // Already purged.
            None => Ok(()),
        }
    }

    async fn purge_sent_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.write()?;
        let before = state.outbox.len();
        state
            .outbox
            .retain(|e| e.sent_at.is_none() || e.created_at >= cutoff);
        Ok(before - state.outbox.len())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, StoreError> {
        let mut state = self.write()?;

        if let Some(record) = &changes.idempotency {
            if let Some(existing) = state.idempotency.get(&record.key) {
                return Ok(CommitOutcome::DuplicateKey(existing.clone()));
            }
        }

        // Validate every write before applying any of them.
        for write in &changes.cards {
            let id = *write.card.id();
            let stored = state.cards.get(&id).map(|c| c.version());
            if !write.expected.matches(stored) {
                return Err(StoreError::Conflict(format!(
                    "card {id}: expected {:?}, found {stored:?}",
                    write.expected
                )));
            }
        }

        for write in changes.cards {
            state.cards.insert(*write.card.id(), write.card);
        }
        if let Some(record) = changes.idempotency {
            state.idempotency.insert(record.key.clone(), record);
        }
        state.outbox.extend(changes.outbox);

        Ok(CommitOutcome::Committed)
    }
}
