//! Card aggregate and its lifecycle.
//!
//! A card moves `REQUESTED -> ISSUED -> ACTIVE`; each transition bumps the
//! aggregate version. Only vault tokens are held, never the PAN or CVV.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardissue_core::{
    AccountId, AggregateRoot, CardId, CustomerId, DomainError, DomainResult, ProposalId,
};

use crate::expiry::Expiry;

/// Card lifecycle status.
///
/// `REQUESTED → ISSUED → {ACTIVATION_PENDING | ACTIVE}`; `BLOCKED` is reachable
/// from any non-terminal state but is driven outside this module. Expiry is
/// computed from [`Expiry`], never stored as a status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Requested,
    Issued,
    ActivationPending,
    Active,
    Blocked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Requested => "REQUESTED",
            CardStatus::Issued => "ISSUED",
            CardStatus::ActivationPending => "ACTIVATION_PENDING",
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
        }
    }
}

impl core::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical plastic or virtual-only card.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardClass {
    Virtual,
    Physical,
}

impl CardClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardClass::Virtual => "VIRTUAL",
            CardClass::Physical => "PHYSICAL",
        }
    }
}

impl core::fmt::Display for CardClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel through which a card was activated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationChannel {
    App,
    Otp,
    FirstPurchase,
}

impl ActivationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationChannel::App => "APP",
            ActivationChannel::Otp => "OTP",
            ActivationChannel::FirstPurchase => "FIRST_PURCHASE",
        }
    }
}

impl core::fmt::Display for ActivationChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationChannel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APP" => Ok(ActivationChannel::App),
            "OTP" => Ok(ActivationChannel::Otp),
            "FIRST_PURCHASE" => Ok(ActivationChannel::FirstPurchase),
            other => Err(DomainError::invalid_argument(format!(
                "unknown activation channel: {other:?}"
            ))),
        }
    }
}

/// Everything needed to request a new card. Sensitive values arrive as vault tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCard {
    pub customer_id: CustomerId,
    pub proposal_id: ProposalId,
    pub account_id: AccountId,
    pub product_code: String,
    pub card_class: CardClass,
    pub pan_token: String,
    pub cvv_token: String,
    pub expiry: Expiry,
    /// Approved credit limit in minor currency units.
    pub credit_limit: u64,
    pub correlation_id: String,
}

/// Aggregate root: Card.
///
/// Holds vault tokens only; a cleartext PAN or CVV can never be stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    customer_id: CustomerId,
    proposal_id: ProposalId,
    account_id: AccountId,
    product_code: String,
    card_class: CardClass,
    pan_token: String,
    cvv_token: String,
    expiry: Expiry,
    credit_limit: u64,
    correlation_id: String,
    status: CardStatus,
    activation_channel: Option<ActivationChannel>,
    activated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Card {
    /// Create a card in `REQUESTED`.
    pub fn request(new: NewCard, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.customer_id.is_nil() {
            return Err(DomainError::invalid_argument("customer_id cannot be empty"));
        }
        if new.proposal_id.is_nil() {
            return Err(DomainError::invalid_argument("proposal_id cannot be empty"));
        }
        if new.account_id.is_nil() {
            return Err(DomainError::invalid_argument("account_id cannot be empty"));
        }
        if new.product_code.trim().is_empty() {
            return Err(DomainError::invalid_argument("product_code cannot be empty"));
        }
        if new.pan_token.trim().is_empty() || new.cvv_token.trim().is_empty() {
            return Err(DomainError::invalid_argument("card tokens cannot be empty"));
        }
        if new.expiry.is_passed(now) {
            return Err(DomainError::invalid_argument(format!(
                "expiry {} must lie in the future",
                new.expiry
            )));
        }
        if new.credit_limit == 0 {
            return Err(DomainError::invalid_argument("credit_limit must be positive"));
        }
        if new.correlation_id.trim().is_empty() {
            return Err(DomainError::invalid_argument("correlation_id cannot be empty"));
        }

        Ok(Self {
            id: CardId::new(),
            customer_id: new.customer_id,
            proposal_id: new.proposal_id,
            account_id: new.account_id,
            product_code: new.product_code,
            card_class: new.card_class,
            pan_token: new.pan_token,
            cvv_token: new.cvv_token,
            expiry: new.expiry,
            credit_limit: new.credit_limit,
            correlation_id: new.correlation_id,
            status: CardStatus::Requested,
            activation_channel: None,
            activated_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// `REQUESTED → ISSUED`.
    pub fn mark_issued(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != CardStatus::Requested {
            return Err(DomainError::invalid_state(format!(
                "card {} cannot be marked ISSUED from {}",
                self.id, self.status
            )));
        }
        self.status = CardStatus::Issued;
        self.touch(now);
        Ok(())
    }

    /// `ISSUED | ACTIVATION_PENDING → ACTIVE`, only while not expired.
    pub fn activate(&mut self, channel: ActivationChannel, now: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.status, CardStatus::Issued | CardStatus::ActivationPending) {
            return Err(DomainError::invalid_state(format!(
                "card {} cannot be activated from {}",
                self.id, self.status
            )));
        }
        if self.is_expired(now) {
            return Err(DomainError::invalid_state(format!(
                "card {} expired at {}",
                self.id, self.expiry
            )));
        }

        self.status = CardStatus::Active;
        self.activation_channel = Some(channel);
        self.activated_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn can_activate(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, CardStatus::Issued | CardStatus::ActivationPending)
            && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_passed(now)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    pub fn card_id(&self) -> CardId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn proposal_id(&self) -> ProposalId {
        self.proposal_id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn product_code(&self) -> &str {
        &self.product_code
    }

    pub fn card_class(&self) -> CardClass {
        self.card_class
    }

    pub fn pan_token(&self) -> &str {
        &self.pan_token
    }

    pub fn cvv_token(&self) -> &str {
        &self.cvv_token
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub fn credit_limit(&self) -> u64 {
        self.credit_limit
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn activation_channel(&self) -> Option<ActivationChannel> {
        self.activation_channel
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl AggregateRoot for Card {
    type Id = CardId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
