//! Worker wiring: builds the card services over one store, vault and transport.

pub mod app;

pub use app::App;
