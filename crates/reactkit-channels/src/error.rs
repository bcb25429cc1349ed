use thiserror::Error;

/// Errors surfaced by a chat transport.
///
/// `Clone` so a single failure can be handed to every caller waiting on a
/// shared (debounced) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The platform asked us to slow down.
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request never reached the platform or the connection dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// A non-success HTTP status without a structured API error body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A structured API error. The platform rejected the request itself, so
    /// repeating it will not help.
    #[error("API error {code}: {message}")]
    Api { code: u32, message: String },

    /// The bot lacks access to the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The message, channel or reaction no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl TransportError {
    /// Permanent errors are returned by the retry capability immediately.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            TransportError::Api { .. } | TransportError::Forbidden(_) | TransportError::NotFound(_)
        )
    }
}
