use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use reactkit_channels::{ChatMessage, RetryPolicy};
use reactkit_core::{ButtonsConfig, MessageId, ReactionEmoji, UserId};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::context::{ButtonOptions, ContextSettings, ReactionButtonsContext};
use crate::error::{ButtonError, Result};
use crate::table::ButtonTable;

/// Live contexts keyed by the message they are bound to.
pub(crate) type Registry = DashMap<MessageId, Arc<ReactionButtonsContext>>;

/// Registry of reaction-button contexts and router for inbound reactions.
///
/// At most one context exists per message. Registration claims the slot
/// synchronously, before any transport call, so a second registration for
/// the same message fails even while the first is still placing reactions.
pub struct ReactionButtonManager {
    bot_user: UserId,
    config: ButtonsConfig,
    retry: RetryPolicy,
    registry: Arc<Registry>,
    /// Failures from timer-driven cancellation are sent here, if set.
    errors: Option<mpsc::Sender<ButtonError>>,
}

impl ReactionButtonManager {
    pub fn new(bot_user: UserId, config: ButtonsConfig) -> Self {
        Self {
            bot_user,
            config,
            retry: RetryPolicy::default(),
            registry: Arc::new(DashMap::new()),
            errors: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Forward errors that have no caller to return to, such as a failed
    /// button removal after expiry. Uses `try_send`, so a full channel drops
    /// the error instead of stalling teardown.
    pub fn with_error_sink(mut self, errors: mpsc::Sender<ButtonError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn bot_user(&self) -> UserId {
        self.bot_user
    }

    pub fn config(&self) -> &ButtonsConfig {
        &self.config
    }

    /// Bind `handlers` to `message` and place the buttons.
    ///
    /// `allowed_users` restricts who may press them; empty means anyone.
    /// If initialization fails the registration is torn down again and the
    /// error returned, so the message can be registered afresh.
    #[instrument(skip_all, fields(message_id = %message.id()))]
    pub async fn add(
        &self,
        message: Arc<dyn ChatMessage>,
        allowed_users: Vec<UserId>,
        handlers: ButtonTable,
        options: ButtonOptions,
    ) -> Result<Arc<ReactionButtonsContext>> {
        let message_id = message.id();
        let settings = ContextSettings {
            bot_user: self.bot_user,
            allowed_users,
            expiration: options
                .expiration
                .unwrap_or_else(|| self.config.expiration()),
            remove_on_cancel: options
                .remove_on_expiry
                .unwrap_or(self.config.remove_on_expiry),
            retry: self.retry.clone(),
            errors: self.errors.clone(),
        };

        let context = match self.registry.entry(message_id) {
            Entry::Occupied(_) => {
                return Err(ButtonError::DuplicateRegistration { message_id });
            }
            Entry::Vacant(slot) => {
                let context = ReactionButtonsContext::new(
                    message,
                    handlers,
                    settings,
                    Arc::downgrade(&self.registry),
                );
                slot.insert(Arc::clone(&context));
                context
            }
        };

        if let Err(e) = context.initialize().await {
            warn!(error = %e, "reaction button initialization failed, releasing registration");
            context.cancel().await;
            return Err(e);
        }

        info!(buttons = ?context.symbols(), expires_in = ?context.expiration(), "reaction buttons registered");
        Ok(context)
    }

    pub async fn handle_reaction_add(
        &self,
        message_id: MessageId,
        emoji: ReactionEmoji,
        user: UserId,
    ) -> Result<bool> {
        self.dispatch(message_id, emoji, user, true).await
    }

    pub async fn handle_reaction_remove(
        &self,
        message_id: MessageId,
        emoji: ReactionEmoji,
        user: UserId,
    ) -> Result<bool> {
        self.dispatch(message_id, emoji, user, false).await
    }

    pub fn get(&self, message_id: MessageId) -> Option<Arc<ReactionButtonsContext>> {
        self.registry
            .get(&message_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Cancel the context bound to `message_id`. Returns whether one existed.
    pub async fn cancel(&self, message_id: MessageId) -> bool {
        match self.get(message_id) {
            Some(context) => {
                context.cancel().await;
                true
            }
            None => false,
        }
    }

    /// Cancel every live context.
    pub async fn cancel_all(&self) {
        let contexts: Vec<_> = self
            .registry
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for context in contexts {
            context.cancel().await;
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    async fn dispatch(
        &self,
        message_id: MessageId,
        emoji: ReactionEmoji,
        user: UserId,
        added: bool,
    ) -> Result<bool> {
        let Some(context) = self.get(message_id) else {
            return Ok(false);
        };
        context.handle_reaction_event(emoji, user, added).await
    }
}
