use std::sync::Arc;

use async_trait::async_trait;
use reactkit_core::{ChannelId, MessageId, Permission, UserId};

use crate::error::TransportError;

/// A channel messages can be posted to (guild text channel, DM, …).
///
/// Implementations must be `Send + Sync` so handles can be shared between the
/// button registry, its expiry timers and reaction handlers.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    /// Whether the channel belongs to a guild. Only guild channels carry
    /// permissions; everywhere else every permission is implicitly granted.
    fn is_guild(&self) -> bool;

    /// Check that `user` holds every permission in `permissions`.
    ///
    /// Non-guild channels always answer `true`.
    async fn has_permissions(
        &self,
        user: UserId,
        permissions: &[Permission],
    ) -> Result<bool, TransportError>;

    /// Post a new message with `content` and return a handle to it.
    async fn create_message(&self, content: &str)
        -> Result<Arc<dyn ChatMessage>, TransportError>;
}

/// A single posted message the bot can edit and react to.
#[async_trait]
pub trait ChatMessage: Send + Sync {
    fn id(&self) -> MessageId;

    fn channel(&self) -> Arc<dyn MessageChannel>;

    /// Content as of the last create or edit.
    fn content(&self) -> String;

    async fn edit(&self, content: &str) -> Result<(), TransportError>;

    /// Add the bot's own reaction with `symbol`.
    async fn add_reaction(&self, symbol: &str) -> Result<(), TransportError>;

    /// Remove the bot's own reaction with `symbol`.
    async fn remove_own_reaction(&self, symbol: &str) -> Result<(), TransportError>;

    /// Remove every user's reaction with `symbol`. Needs `ManageMessages`.
    async fn remove_reaction_emoji(&self, symbol: &str) -> Result<(), TransportError>;

    /// Remove every reaction from the message. Needs `ManageMessages`.
    async fn remove_all_reactions(&self) -> Result<(), TransportError>;
}
