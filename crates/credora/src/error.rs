use thiserror::Error;

/// Errors returned by Credora operations.
#[derive(Debug, Error)]
pub enum CredoraError {
    /// A payment header was not valid base64.
    #[error("invalid payment header: {0}")]
    InvalidHeader(String),

    /// A decoded payload parsed but violates the payment model.
    #[error("invalid payment payload: {0}")]
    InvalidPayload(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
