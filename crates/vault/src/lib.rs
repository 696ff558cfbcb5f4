//! Card secrets: PAN/CVV generation and tokenization.
//!
//! Cleartext PANs and CVVs exist only transiently inside this crate. Everything
//! that crosses into the card aggregate or storage is an opaque vault token.

pub mod error;
pub mod key;
pub mod mask;
pub mod memory;
pub mod pan;
pub mod vault;

pub use error::VaultError;
pub use key::VaultKey;
pub use mask::{mask_pan, mask_token};
pub use memory::InMemoryTokenVault;
pub use pan::{PanGenerator, is_luhn_valid, luhn_check_digit};
pub use vault::TokenVault;
