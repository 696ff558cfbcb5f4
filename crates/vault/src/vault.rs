use async_trait::async_trait;

use crate::error::VaultError;

/// Tokenization boundary for card secrets.
///
/// Implementations encrypt the value, keep the ciphertext under a fresh opaque
/// token and hand back only the token. `retrieve` is for internal masking.
#[async_trait]
pub trait TokenVault: Send + Sync {
    /// Tokenize a 16-digit PAN. Tokens look like `tok_pan_<hex>`.
    async fn store_pan(&self, pan: &str) -> Result<String, VaultError>;

    /// Tokenize a 3 or 4 digit CVV. Tokens look like `tok_cvv_<hex>`.
    async fn store_cvv(&self, cvv: &str) -> Result<String, VaultError>;

    async fn retrieve(&self, token: &str) -> Result<String, VaultError>;
}

#[async_trait]
impl<V: TokenVault + ?Sized> TokenVault for std::sync::Arc<V> {
    async fn store_pan(&self, pan: &str) -> Result<String, VaultError> {
        (**self).store_pan(pan).await
    }

    async fn store_cvv(&self, cvv: &str) -> Result<String, VaultError> {
        (**self).store_cvv(cvv).await
    }

    async fn retrieve(&self, token: &str) -> Result<String, VaultError> {
        (**self).retrieve(token).await
    }
}
