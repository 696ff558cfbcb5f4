//! Integration event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardissue_core::{AccountId, CardId, CustomerId, ProposalId};

use crate::event::{IntegrationEvent, topics};

/// One card inside a [`CardIssued`] event. The PAN is represented by its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCard {
    pub card_id: CardId,
    pub pan_token: String,
    /// "MM/YY"
    pub expiry: String,
    pub card_class: String,
    pub status: String,
}

/// Event: cards were issued for a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIssued {
    pub proposal_id: ProposalId,
    pub customer_id: CustomerId,
    pub account_id: AccountId,
    pub correlation_id: String,
    pub issued_at: DateTime<Utc>,
    pub cards: Vec<IssuedCard>,
}

impl IntegrationEvent for CardIssued {
    fn topic(&self) -> &'static str {
        topics::CARD_ISSUED
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Event: a card was activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardActivated {
    pub card_id: CardId,
    pub customer_id: CustomerId,
    pub status: String,
    pub activated_at: DateTime<Utc>,
    pub channel: String,
    pub correlation_id: String,
}

impl IntegrationEvent for CardActivated {
    fn topic(&self) -> &'static str {
        topics::CARD_ACTIVATED
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.activated_at
    }
}

/// Event: an issuance request was rejected before any card was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIssuanceFailed {
    pub customer_id: CustomerId,
    pub reason: String,
    pub attempted_at: DateTime<Utc>,
}

impl IntegrationEvent for CardIssuanceFailed {
    fn topic(&self) -> &'static str {
        topics::CARD_ISSUANCE_FAILED
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.attempted_at
    }
}

/// How the upstream system asks for cards to be delivered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    Virtual,
    Physical,
    Both,
}

/// Inbound event: an approved proposal asks for cards to be issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIssuanceRequested {
    pub customer_id: CustomerId,
    pub proposal_id: ProposalId,
    pub account_id: AccountId,
    pub product_code: String,
    pub card_count: u8,
    /// Credit limit per card, in minor currency units.
    pub limit_per_card: u64,
    pub delivery_type: DeliveryType,
    pub correlation_id: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub credit_score: i32,
    pub requested_at: DateTime<Utc>,
}
