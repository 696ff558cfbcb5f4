//! Consumer for inbound `card.issuance.requested` events.

use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use rand::rngs::StdRng;
use tracing::warn;

use cardissue_cards::DeliveryPreference;
use cardissue_events::{CardIssuanceFailed, CardIssuanceRequested, DeliveryType};
use cardissue_vault::TokenVault;

use crate::store::{CardStore, ChangeSet, OutboxEntry};

use super::error::WorkflowError;
use super::issuance::{CardIssuanceWorkflow, IssuanceOutcome, IssuanceRequest};

pub const MIN_CREDIT_SCORE: i32 = 0;
pub const MAX_CREDIT_SCORE: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Issued(IssuanceOutcome),
    /// Refused before any card was created; a `card.issuance.failed` event was queued.
    Rejected { reason: String },
}

impl IntakeOutcome {
    pub fn issued(self) -> Option<IssuanceOutcome> {
        match self {
            IntakeOutcome::Issued(outcome) => Some(outcome),
            IntakeOutcome::Rejected { .. } => None,
        }
    }
}

/// Applies the credit-score gate, then hands the request to the issuance workflow.
///
/// Client errors are also reported downstream through `card.issuance.failed`.
/// Transient failures propagate untouched so the broker redelivers the event.
pub struct IssuanceRequestedHandler<S, V, R = StdRng> {
    issuance: Arc<CardIssuanceWorkflow<S, V, R>>,
    store: Arc<S>,
    min_credit_score: i32,
}

impl<S, V, R> IssuanceRequestedHandler<S, V, R>
where
    S: CardStore,
    V: TokenVault,
    R: RngCore + Send,
{
    pub fn new(
        issuance: Arc<CardIssuanceWorkflow<S, V, R>>,
        store: Arc<S>,
        min_credit_score: i32,
    ) -> Self {
        Self {
            issuance,
            store,
            min_credit_score,
        }
    }

    pub async fn handle(&self, event: CardIssuanceRequested) -> Result<IntakeOutcome, WorkflowError> {
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&event.credit_score) {
            return Err(WorkflowError::invalid_argument(format!(
                "credit score {} outside {MIN_CREDIT_SCORE}..={MAX_CREDIT_SCORE}",
                event.credit_score
            )));
        }

        if event.credit_score < self.min_credit_score {
            let reason = format!(
                "credit score {} below minimum {}",
                event.credit_score, self.min_credit_score
            );
            self.report_failure(&event, &reason).await?;
            return Ok(IntakeOutcome::Rejected { reason });
        }

        let request = IssuanceRequest {
            customer_id: event.customer_id,
            proposal_id: event.proposal_id,
            account_id: event.account_id,
            product_code: event.product_code.clone(),
            card_count: event.card_count,
            limit_per_card: event.limit_per_card,
            delivery: delivery_preference(event.delivery_type),
            correlation_id: event.correlation_id.clone(),
            idempotency_key: event.idempotency_key.clone(),
        };

        match self.issuance.issue(request).await {
            Ok(outcome) => Ok(IntakeOutcome::Issued(outcome)),
            Err(e @ WorkflowError::InvalidArgument(_)) => {
                self.report_failure(&event, &e.to_string()).await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn report_failure(
        &self,
        event: &CardIssuanceRequested,
        reason: &str,
    ) -> Result<(), WorkflowError> {
        let failed = CardIssuanceFailed {
            customer_id: event.customer_id,
            reason: reason.to_string(),
            attempted_at: Utc::now(),
        };
        self.store
            .commit(ChangeSet::new().append(OutboxEntry::for_event(&failed)?))
            .await?;

        warn!(
            customer_id = %event.customer_id,
            correlation_id = %event.correlation_id,
            reason = %reason,
            "card issuance rejected"
        );
        Ok(())
    }
}

fn delivery_preference(delivery: DeliveryType) -> DeliveryPreference {
    match delivery {
        DeliveryType::Virtual => DeliveryPreference::virtual_only(),
        DeliveryType::Physical => DeliveryPreference::physical_only(),
        DeliveryType::Both => DeliveryPreference::both(),
    }
}
