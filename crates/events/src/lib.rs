//! Integration events and the outbound transport boundary.
//!
//! Payloads in this crate are the JSON contracts seen by downstream consumers.
//! They carry card tokens only; cleartext PAN/CVV never appear here.

pub mod event;
pub mod in_memory_publisher;
pub mod integration;
pub mod logging_publisher;
pub mod publisher;

pub use event::{IntegrationEvent, topics};
pub use in_memory_publisher::{InMemoryPublisher, PublishedMessage};
pub use integration::{
    CardActivated, CardIssuanceFailed, CardIssuanceRequested, CardIssued, DeliveryType, IssuedCard,
};
pub use logging_publisher::TracingPublisher;
pub use publisher::{MessagePublisher, PublishError};
