use chrono::{DateTime, Utc};
use serde::Serialize;

/// Well-known topic names.
pub mod topics {
    pub const CARD_ISSUED: &str = "card.issued";
    pub const CARD_ACTIVATED: &str = "card.activated";
    pub const CARD_ISSUANCE_FAILED: &str = "card.issuance.failed";
}

/// An event published to external consumers.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - delivered **at-least-once** (consumers must be idempotent)
/// - serialized as JSON into the outbox before publication
pub trait IntegrationEvent: Serialize + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable topic the event is published on (e.g. "card.issued").
    fn topic(&self) -> &'static str;

    /// When the fact happened (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Serialize into the outbox payload form.
    fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
