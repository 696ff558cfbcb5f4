//! Idempotent card issuance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use cardissue_cards::{Card, CardClass, DeliveryPreference, Expiry, NewCard, plan_card_classes};
use cardissue_core::{AccountId, AggregateRoot, CustomerId, ProposalId};
use cardissue_events::{CardIssued, IssuedCard};
use cardissue_vault::{PanGenerator, TokenVault, pan::DEFAULT_PAN_LEN};

use crate::config::IssuanceConfig;
use crate::store::{CardStore, ChangeSet, CommitOutcome, IdempotencyRecord, OutboxEntry};

use super::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    pub customer_id: CustomerId,
    pub proposal_id: ProposalId,
    pub account_id: AccountId,
    pub product_code: String,
    /// 1 or 2.
    pub card_count: u8,
    /// Credit limit per card in minor currency units.
    pub limit_per_card: u64,
    pub delivery: DeliveryPreference,
    pub correlation_id: String,
    /// Blank keys are treated as absent.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// New cards were issued by this call.
    Created(Vec<Card>),
    /// The idempotency key was already recorded; these are the original cards.
    ReplayedExisting(Vec<Card>),
}

impl IssuanceOutcome {
    pub fn cards(&self) -> &[Card] {
        match self {
            IssuanceOutcome::Created(cards) | IssuanceOutcome::ReplayedExisting(cards) => cards,
        }
    }

    pub fn into_cards(self) -> Vec<Card> {
        match self {
            IssuanceOutcome::Created(cards) | IssuanceOutcome::ReplayedExisting(cards) => cards,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, IssuanceOutcome::ReplayedExisting(_))
    }
}

/// Issues one or two cards per request.
///
/// All writes (cards, idempotency record, `card.issued` outbox entry) go
/// through a single [`ChangeSet`]. A failure anywhere before the commit leaves
/// nothing behind except orphaned vault entries, so retrying with the same key
/// is always allowed.
pub struct CardIssuanceWorkflow<S, V, R = StdRng> {
    store: Arc<S>,
    vault: Arc<V>,
    pans: Arc<PanGenerator<R>>,
    config: IssuanceConfig,
}

impl<S, V, R> CardIssuanceWorkflow<S, V, R>
where
    S: CardStore,
    V: TokenVault,
    R: RngCore + Send,
{
    pub fn new(
        store: Arc<S>,
        vault: Arc<V>,
        pans: Arc<PanGenerator<R>>,
        config: IssuanceConfig,
    ) -> Self {
        Self {
            store,
            vault,
            pans,
            config,
        }
    }

    pub async fn issue(&self, request: IssuanceRequest) -> Result<IssuanceOutcome, WorkflowError> {
        let classes = validate(&request)?;
        let key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        if let Some(key) = &key {
            if let Some(record) = self.store.find(key).await? {
                debug!(idempotency_key = %key, "issuance replayed from idempotency record");
                return self.replay(record).await;
            }
        }

        let now = Utc::now();
        let mut cards = Vec::with_capacity(classes.len());
        for class in classes {
            cards.push(self.build_card(&request, class, now).await?);
        }

        let event = CardIssued {
            proposal_id: request.proposal_id,
            customer_id: request.customer_id,
            account_id: request.account_id,
            correlation_id: request.correlation_id.clone(),
            issued_at: now,
            cards: cards.iter().map(issued_card).collect(),
        };

        let mut changes = ChangeSet::new();
        for card in &cards {
            changes = changes.insert_card(card.clone());
        }
        if let Some(key) = &key {
            changes = changes.with_idempotency(IdempotencyRecord {
                key: key.clone(),
                card_ids: cards.iter().map(|c| *c.id()).collect(),
                created_at: now,
            });
        }
        changes = changes.append(OutboxEntry::for_event(&event)?);

        match self.store.commit(changes).await? {
            CommitOutcome::Committed => {
                info!(
                    customer_id = %request.customer_id,
                    proposal_id = %request.proposal_id,
                    correlation_id = %request.correlation_id,
                    cards = cards.len(),
                    "cards issued"
                );
                Ok(IssuanceOutcome::Created(cards))
            }
            CommitOutcome::DuplicateKey(record) => {
                // Lost the race for this key; this attempt's vault entries stay orphaned.
                warn!(
                    idempotency_key = %record.key,
                    correlation_id = %request.correlation_id,
                    "concurrent issuance with the same key, replaying the winner"
                );
                self.replay(record).await
            }
        }
    }

    async fn build_card(
        &self,
        request: &IssuanceRequest,
        class: CardClass,
        now: DateTime<Utc>,
    ) -> Result<Card, WorkflowError> {
        let bin = self.config.bin_for(&request.product_code);
        let pan = self.pans.generate_pan(bin, DEFAULT_PAN_LEN)?;
        let cvv = self.pans.generate_cvv();

        let pan_token = self.vault.store_pan(&pan).await?;
        let cvv_token = self.vault.store_cvv(&cvv).await?;

        let mut card = Card::request(
            NewCard {
                customer_id: request.customer_id,
                proposal_id: request.proposal_id,
                account_id: request.account_id,
                product_code: request.product_code.clone(),
                card_class: class,
                pan_token,
                cvv_token,
                expiry: Expiry::years_from(now, self.config.validity_years)?,
                credit_limit: request.limit_per_card,
                correlation_id: request.correlation_id.clone(),
            },
            now,
        )?;
        card.mark_issued(now)?;
        Ok(card)
    }

    async fn replay(&self, record: IdempotencyRecord) -> Result<IssuanceOutcome, WorkflowError> {
        let cards = self.store.get_many(&record.card_ids).await?;
        if cards.len() != record.card_ids.len() {
            return Err(WorkflowError::TransientDependencyFailure(format!(
                "idempotency record {} references missing cards",
                record.key
            )));
        }
        Ok(IssuanceOutcome::ReplayedExisting(cards))
    }
}

fn validate(request: &IssuanceRequest) -> Result<Vec<CardClass>, WorkflowError> {
    if request.customer_id.is_nil() {
        return Err(WorkflowError::invalid_argument("customer_id cannot be empty"));
    }
    if request.proposal_id.is_nil() {
        return Err(WorkflowError::invalid_argument("proposal_id cannot be empty"));
    }
    if request.account_id.is_nil() {
        return Err(WorkflowError::invalid_argument("account_id cannot be empty"));
    }
    if request.product_code.trim().is_empty() {
        return Err(WorkflowError::invalid_argument("product_code cannot be empty"));
    }
    if request.limit_per_card == 0 {
        return Err(WorkflowError::invalid_argument("limit_per_card must be positive"));
    }
    if request.correlation_id.trim().is_empty() {
        return Err(WorkflowError::invalid_argument("correlation_id cannot be empty"));
    }
    Ok(plan_card_classes(request.delivery, request.card_count)?)
}

fn issued_card(card: &Card) -> IssuedCard {
    IssuedCard {
        card_id: *card.id(),
        pan_token: card.pan_token().to_string(),
        expiry: card.expiry().to_string(),
        card_class: card.card_class().as_str().to_string(),
        status: card.status().as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CardRepository, InMemoryStore};
    use crate::test_support::{FailingStore, issuance_request, issuance_workflow, vault};
    use cardissue_cards::CardStatus;
    use cardissue_events::topics;

    #[tokio::test]
    async fn issues_one_virtual_card() {
        let store = Arc::new(InMemoryStore::new());
        let workflow = issuance_workflow(store.clone(), vault());

        let mut request = issuance_request(1, DeliveryPreference::virtual_only());
        request.idempotency_key = None;
        let outcome = workflow.issue(request).await.unwrap();

        assert!(!outcome.is_replay());
        let cards = outcome.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_class(), CardClass::Virtual);
        assert_eq!(cards[0].status(), CardStatus::Issued);
        assert!(cards[0].pan_token().starts_with("tok_pan_"));
        assert!(cards[0].cvv_token().starts_with("tok_cvv_"));
    }

    #[tokio::test]
    async fn pan_uses_product_bin() {
        let store = Arc::new(InMemoryStore::new());
        let vault = vault();
        let workflow = issuance_workflow(store.clone(), vault.clone());

        let mut request = issuance_request(1, DeliveryPreference::physical_only());
        request.product_code = "MASTERCARD_PLATINUM".to_string();
        let outcome = workflow.issue(request).await.unwrap();

        let pan = vault.retrieve(outcome.cards()[0].pan_token()).await.unwrap();
        assert!(pan.starts_with("453912"));
        assert!(cardissue_vault::is_luhn_valid(&pan));
    }

    #[tokio::test]
    async fn invalid_requests_have_no_side_effects() {
        let store = Arc::new(InMemoryStore::new());
        let vault = vault();
        let workflow = issuance_workflow(store.clone(), vault.clone());

        let bad = [
            IssuanceRequest { card_count: 3, ..issuance_request(1, DeliveryPreference::both()) },
            IssuanceRequest { limit_per_card: 0, ..issuance_request(1, DeliveryPreference::both()) },
            IssuanceRequest {
                correlation_id: " ".to_string(),
                ..issuance_request(1, DeliveryPreference::both())
            },
            IssuanceRequest {
                customer_id: CustomerId::nil(),
                ..issuance_request(1, DeliveryPreference::both())
            },
            issuance_request(1, DeliveryPreference::default()),
        ];
        for request in bad {
            let err = workflow.issue(request).await.unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidArgument(_)), "{err:?}");
        }

        assert_eq!(store.card_count().unwrap(), 0);
        assert!(store.outbox_entries().unwrap().is_empty());
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn blank_key_is_not_registered() {
        let store = Arc::new(InMemoryStore::new());
        let workflow = issuance_workflow(store.clone(), vault());

        let mut request = issuance_request(1, DeliveryPreference::virtual_only());
        request.idempotency_key = Some("   ".to_string());
        let first = workflow.issue(request.clone()).await.unwrap();
        let second = workflow.issue(request).await.unwrap();

        assert!(!second.is_replay());
        assert_ne!(first.cards()[0].id(), second.cards()[0].id());
        assert_eq!(store.card_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn commit_failure_leaves_key_free_for_retry() {
        let inner = Arc::new(InMemoryStore::new());
        let failing = Arc::new(FailingStore::new(inner.clone()));
        failing.fail_commits(1);

        let workflow = issuance_workflow(failing.clone(), vault());
        let request = issuance_request(2, DeliveryPreference::both());

        let err = workflow.issue(request.clone()).await.unwrap_err();
        assert_eq!(err.kind(), crate::workflows::ErrorKind::TransientDependencyFailure);
        assert_eq!(inner.card_count().unwrap(), 0);
        assert!(inner.outbox_entries().unwrap().is_empty());

        let retried = workflow.issue(request).await.unwrap();
        assert!(!retried.is_replay());
        assert_eq!(retried.cards().len(), 2);

        let entries = inner.outbox_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].topic, topics::CARD_ISSUED);
        let stored = inner.get_many(&[*retried.cards()[0].id()]).await.unwrap();
        assert_eq!(stored.len(), 1);
    }
}
