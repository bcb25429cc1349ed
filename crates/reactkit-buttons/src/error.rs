use reactkit_channels::TransportError;
use reactkit_core::{ChannelId, MessageId, Permission};
use thiserror::Error;

/// Errors produced by the reaction-button layer.
///
/// `Clone` so a failure can be both returned and forwarded to the manager's
/// error sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ButtonError {
    /// A context is already registered for this message.
    #[error("message {message_id} already has reaction buttons registered")]
    DuplicateRegistration { message_id: MessageId },

    /// The bot lacks a permission it needs in a guild channel.
    #[error("missing permissions {missing:?} in channel {channel_id}")]
    PermissionDenied {
        channel_id: ChannelId,
        missing: Vec<Permission>,
    },

    /// A button with this symbol is already bound on the message.
    #[error("a button for {symbol} already exists")]
    ButtonExists { symbol: String },

    /// The context was cancelled while the operation was in flight.
    #[error("reaction buttons on message {message_id} were cancelled")]
    Cancelled { message_id: MessageId },

    /// A handler reported a failure of its own.
    #[error("button handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, ButtonError>;
