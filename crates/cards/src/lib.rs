//! Card domain module.
//!
//! This crate contains the card aggregate and its lifecycle rules, implemented
//! purely as deterministic domain logic (no IO, no storage, no clock reads:
//! callers pass `now` explicitly).

pub mod card;
pub mod delivery;
pub mod expiry;

pub use card::{ActivationChannel, Card, CardClass, CardStatus, NewCard};
pub use delivery::{DeliveryPreference, plan_card_classes};
pub use expiry::Expiry;
