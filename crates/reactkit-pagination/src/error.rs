use reactkit_buttons::ButtonError;
use reactkit_channels::TransportError;
use thiserror::Error;

/// `Clone` because debounced edits hand the same outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// The source produced nothing, not even for the first page.
    #[error("track {track:?} has no content")]
    EmptyContent { track: String },

    #[error("no track bound to {symbol:?}")]
    UnknownTrack { symbol: String },

    #[error("track {symbol:?} is defined twice")]
    DuplicateTrack { symbol: String },

    #[error("a paginator needs at least one track")]
    NoTracks,

    #[error("paginator has not been posted yet")]
    NotInitialized,

    #[error("paginator has already been posted")]
    AlreadyInitialized,

    #[error("page {index} of track {track:?} is not cached")]
    PageNotCached { track: String, index: usize },

    /// A page source failed for its own reasons.
    #[error("page source failed: {0}")]
    Source(String),

    #[error(transparent)]
    Button(#[from] ButtonError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<PaginationError> for ButtonError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::Button(e) => e,
            PaginationError::Transport(e) => ButtonError::Transport(e),
            other => ButtonError::Handler(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaginationError>;
