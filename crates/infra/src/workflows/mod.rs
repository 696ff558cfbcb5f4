//! Request-path workflows: issuance, activation, event intake and portfolio reads.
//!
//! Each workflow validates at the boundary, mutates aggregates in memory and
//! persists through one [`UnitOfWork::commit`](crate::store::UnitOfWork::commit).
//! Dropping a workflow future before the commit leaves nothing observable.

pub mod activation;
pub mod error;
pub mod intake;
pub mod issuance;
pub mod portfolio;

pub use activation::{ActivationRequest, ActivationResult, CardActivationWorkflow};
pub use error::{ErrorKind, WorkflowError};
pub use intake::{IntakeOutcome, IssuanceRequestedHandler};
pub use issuance::{CardIssuanceWorkflow, IssuanceOutcome, IssuanceRequest};
pub use portfolio::{CardSummary, ListCustomerCards};
