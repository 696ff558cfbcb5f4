//! Transactional-outbox dispatcher.
//!
//! Workflows append events to the outbox in the same commit as the card change
//! that produced them. The dispatcher is the only reader: it publishes pending
//! entries oldest first with bounded retry and backoff, marks them sent, and
//! purges sent entries past the retention window.
//!
//! Delivery is at-least-once. An entry is marked sent only after the transport
//! confirmed the publish, so a crash or cancellation in between republishes it.

pub mod dispatcher;
pub mod retry;

pub use dispatcher::{
    CycleReport, DispatchOutcome, DispatcherHandle, DispatcherStats, OutboxDispatcher,
};
pub use retry::RetryPolicy;
