//! Gateway-specific error types.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur during a single model exchange.
///
/// These stay internal to the gateway: after retries are exhausted the
/// public [`crate::gateway::ModelGateway::call`] contract signals failure
/// with an empty string so every caller treats "no answer" uniformly.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from the completion endpoint.
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The completion arrived with no choices or an empty message.
    #[error("model returned an empty completion")]
    EmptyCompletion,

    /// The API key environment variable is unset.
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    /// The configured endpoint could not be resolved.
    #[error("invalid model endpoint: {0}")]
    InvalidEndpoint(String),
}
