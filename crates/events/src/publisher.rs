//! Outbound transport abstraction (mechanics only).
//!
//! A `MessagePublisher` pushes a serialized event onto an external transport
//! (message broker, webhook, log sink). The outbox dispatcher is its only caller.
//!
//! ## Delivery Guarantees
//!
//! Publication is **at-least-once**: the dispatcher may call `publish` again for
//! an entry whose previous publish succeeded but whose `mark_sent` did not
//! complete. Consumers must be idempotent.
//!
//! `publish` returning `Ok(())` means the transport confirmed the message. Only
//! then may the outbox entry be marked sent.

use std::sync::Arc;

use thiserror::Error;

/// Transport failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The transport could not be reached or timed out; retrying may succeed.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The transport refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Domain-agnostic outbound message transport.
#[async_trait::async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

#[async_trait::async_trait]
impl<P> MessagePublisher for Arc<P>
where
    P: MessagePublisher + ?Sized,
{
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        (**self).publish(topic, payload).await
    }
}
