//! Infrastructure layer: storage ports, workflows, outbox dispatcher, config.

pub mod config;
pub mod outbox;
pub mod store;
pub mod workflows;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, ConfigError, DispatcherConfig, IssuanceConfig, VaultConfig};
pub use outbox::{
    CycleReport, DispatchOutcome, DispatcherHandle, DispatcherStats, OutboxDispatcher, RetryPolicy,
};
pub use store::{
    CardRepository, CardStore, ChangeSet, CommitOutcome, IdempotencyRecord, IdempotencyStore,
    InMemoryStore, OutboxEntry, OutboxStore, StoreError, UnitOfWork,
};
pub use workflows::{
    ActivationRequest, ActivationResult, CardActivationWorkflow, CardIssuanceWorkflow, CardSummary,
    ErrorKind, IntakeOutcome, IssuanceOutcome, IssuanceRequest, IssuanceRequestedHandler,
    ListCustomerCards, WorkflowError,
};
