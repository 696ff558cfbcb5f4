use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error("vault unavailable: {0}")]
    Unavailable(String),

    #[error("invalid vault key: {0}")]
    InvalidKey(String),
}

impl VaultError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
