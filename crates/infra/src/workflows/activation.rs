//! Card activation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use cardissue_cards::{ActivationChannel, CardStatus};
use cardissue_core::{AggregateRoot, CardId, CustomerId};
use cardissue_events::CardActivated;

use crate::store::{CardStore, ChangeSet, OutboxEntry};

use super::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub card_id: CardId,
    /// OTP or CVV typed by the cardholder.
    pub credential: String,
    /// `APP` or `OTP`. `FIRST_PURCHASE` is set by the authorization path, not here.
    pub channel: ActivationChannel,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResult {
    pub card_id: CardId,
    pub customer_id: CustomerId,
    pub status: CardStatus,
    pub activated_at: DateTime<Utc>,
    pub channel: ActivationChannel,
    pub correlation_id: String,
}

pub struct CardActivationWorkflow<S> {
    store: Arc<S>,
}

impl<S: CardStore> CardActivationWorkflow<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn activate(&self, request: ActivationRequest) -> Result<ActivationResult, WorkflowError> {
        validate(&request)?;

        let mut card = self
            .store
            .get(request.card_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("card {}", request.card_id)))?;

        let now = Utc::now();
        if !card.can_activate(now) {
            return Err(WorkflowError::InvalidState(format!(
                "card {} cannot be activated (status {}, expiry {})",
                request.card_id,
                card.status(),
                card.expiry()
            )));
        }

        verify_credential(&request.credential)?;

        let loaded_version = card.version();
        card.activate(request.channel, now)?;

        let event = CardActivated {
            card_id: request.card_id,
            customer_id: card.customer_id(),
            status: card.status().as_str().to_string(),
            activated_at: now,
            channel: request.channel.as_str().to_string(),
            correlation_id: request.correlation_id.clone(),
        };

        // A concurrent activation surfaces as a version conflict, i.e. InvalidState.
        self.store
            .commit(
                ChangeSet::new()
                    .update_card(card.clone(), loaded_version)
                    .append(OutboxEntry::for_event(&event)?),
            )
            .await?;

        info!(
            card_id = %request.card_id,
            customer_id = %card.customer_id(),
            channel = %request.channel,
            correlation_id = %request.correlation_id,
            "card activated"
        );

        Ok(ActivationResult {
            card_id: request.card_id,
            customer_id: card.customer_id(),
            status: card.status(),
            activated_at: now,
            channel: request.channel,
            correlation_id: request.correlation_id,
        })
    }
}

fn validate(request: &ActivationRequest) -> Result<(), WorkflowError> {
    let credential = request.credential.as_str();
    if credential.trim().is_empty() {
        return Err(WorkflowError::invalid_argument("credential cannot be empty"));
    }
    if !(3..=6).contains(&credential.len()) || !credential.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WorkflowError::invalid_argument("credential must be 3 to 6 digits"));
    }
    if !matches!(request.channel, ActivationChannel::App | ActivationChannel::Otp) {
        return Err(WorkflowError::invalid_argument(format!(
            "channel {} is not accepted for activation",
            request.channel
        )));
    }
    if request.card_id.is_nil() {
        return Err(WorkflowError::invalid_argument("card_id cannot be empty"));
    }
    if request.correlation_id.trim().is_empty() {
        return Err(WorkflowError::invalid_argument("correlation_id cannot be empty"));
    }
    Ok(())
}

/// Placeholder policy: any well-formed numeric credential is accepted. A real
/// deployment checks the OTP or CVV against its issuer here.
fn verify_credential(credential: &str) -> Result<(), WorkflowError> {
    if (3..=6).contains(&credential.len()) && credential.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(WorkflowError::invalid_argument("credential rejected"))
    }
}
