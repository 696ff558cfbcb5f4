//! Customer card portfolio with masked PANs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use cardissue_cards::{Card, CardClass, CardStatus};
use cardissue_core::{AggregateRoot, CardId, CustomerId};
use cardissue_vault::{TokenVault, mask_pan, mask_token};

use crate::store::CardRepository;

use super::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub card_id: CardId,
    pub masked_pan: String,
    pub card_class: CardClass,
    pub status: CardStatus,
    pub credit_limit: u64,
    pub issued_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    /// "MM/YY"
    pub expiry: String,
    pub expired: bool,
}

pub struct ListCustomerCards<S, V> {
    store: Arc<S>,
    vault: Arc<V>,
}

impl<S: CardRepository, V: TokenVault> ListCustomerCards<S, V> {
    pub fn new(store: Arc<S>, vault: Arc<V>) -> Self {
        Self { store, vault }
    }

    /// The customer's cards, newest first.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<CardSummary>, WorkflowError> {
        if customer_id.is_nil() {
            return Err(WorkflowError::invalid_argument("customer_id cannot be empty"));
        }

        let mut cards = self.store.list_by_customer(customer_id).await?;
        cards.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(a.id())));

        let now = Utc::now();
        let mut summaries = Vec::with_capacity(cards.len());
        for card in &cards {
            summaries.push(CardSummary {
                card_id: *card.id(),
                masked_pan: self.masked_pan(card).await,
                card_class: card.card_class(),
                status: card.status(),
                credit_limit: card.credit_limit(),
                issued_at: card.created_at(),
                activated_at: card.activated_at(),
                expiry: card.expiry().to_string(),
                expired: card.is_expired(now),
            });
        }
        Ok(summaries)
    }

    async fn masked_pan(&self, card: &Card) -> String {
        let token = card.pan_token();
        match self.vault.retrieve(token).await {
            Ok(pan) => match mask_pan(&pan) {
                Some(masked) => masked,
                None => {
                    warn!(card_id = %card.id(), "vault returned a malformed PAN");
                    mask_token(token)
                }
            },
            Err(e) => {
                warn!(card_id = %card.id(), error = %e, "could not resolve PAN token");
                mask_token(token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeSet, InMemoryStore, UnitOfWork};
    use crate::test_support::{card_with_tokens, issuance_request, issuance_workflow, vault};
    use cardissue_cards::DeliveryPreference;

    #[tokio::test]
    async fn lists_masked_cards_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        let vault = vault();
        let workflow = issuance_workflow(store.clone(), vault.clone());

        let request = issuance_request(2, DeliveryPreference::both());
        let customer = request.customer_id;
        let issued = workflow.issue(request).await.unwrap();

        let summaries = ListCustomerCards::new(store, vault.clone()).list(customer).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].issued_at >= summaries[1].issued_at);
        for summary in &summaries {
            let card = issued.cards().iter().find(|c| *c.id() == summary.card_id).unwrap();
            let pan = vault.retrieve(card.pan_token()).await.unwrap();
            assert_eq!(summary.masked_pan, format!("{} **** **** {}", &pan[..4], &pan[12..]));
            assert!(!summary.masked_pan.contains(&pan[4..12]));
            assert!(!summary.expired);
            assert_eq!(summary.status, CardStatus::Issued);
        }
    }

    #[tokio::test]
    async fn unresolvable_token_falls_back_to_token_tail() {
        let store = Arc::new(InMemoryStore::new());
        let card = card_with_tokens("tok_pan_deadbeef", "tok_cvv_1");
        let customer = card.customer_id();
        store.commit(ChangeSet::new().insert_card(card)).await.unwrap();

        let summaries = ListCustomerCards::new(store, vault()).list(customer).await.unwrap();

        assert_eq!(summaries[0].masked_pan, "**** **** **** beef");
    }

    #[tokio::test]
    async fn nil_customer_is_invalid() {
        let listing = ListCustomerCards::new(Arc::new(InMemoryStore::new()), vault());
        assert!(matches!(
            listing.list(CustomerId::nil()).await,
            Err(WorkflowError::InvalidArgument(_))
        ));
    }
}
