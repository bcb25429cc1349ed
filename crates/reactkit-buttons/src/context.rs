//! Per-message reaction button state machine.
//!
//! Lifecycle: `Initializing → Active ⇄ Disabled → Cancelled`. Only an
//! `Active` context dispatches inbound reactions. All guards run
//! synchronously under the context lock before any transport call, so
//! overlapping dispatches on the same message never observe a half-applied
//! transition.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use reactkit_channels::{retry, ChatMessage, RetryPolicy};
use reactkit_core::{MessageId, Permission, ReactionEmoji, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ButtonError, Result};
use crate::manager::Registry;
use crate::table::{ButtonHandler, ButtonTable};

/// Permissions the bot needs to place buttons in a guild channel.
const REQUIRED_PERMISSIONS: [Permission; 2] =
    [Permission::AddReactions, Permission::ReadMessageHistory];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Initializing,
    Active,
    Disabled,
    Cancelled,
}

/// Per-registration overrides of the manager defaults.
#[derive(Debug, Clone, Default)]
pub struct ButtonOptions {
    pub expiration: Option<Duration>,
    /// Whether cancellation removes the buttons from the message.
    pub remove_on_expiry: Option<bool>,
}

/// Delivered to a handler when one of its reactions is added or removed.
#[derive(Clone)]
pub struct ButtonEvent {
    pub context: Arc<ReactionButtonsContext>,
    pub emoji: ReactionEmoji,
    pub user: UserId,
    pub added: bool,
}

/// Settings fixed at registration time.
pub(crate) struct ContextSettings {
    pub bot_user: UserId,
    pub allowed_users: Vec<UserId>,
    pub expiration: Duration,
    pub remove_on_cancel: bool,
    pub retry: RetryPolicy,
    pub errors: Option<mpsc::Sender<ButtonError>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Initializing,
    Running,
    Cancelled,
}

struct ContextInner {
    lifecycle: Lifecycle,
    enabled: bool,
    handlers: ButtonTable,
    /// Set once any reaction has been placed on the message.
    placed: bool,
    timer: Option<JoinHandle<()>>,
}

pub struct ReactionButtonsContext {
    message: Arc<dyn ChatMessage>,
    settings: ContextSettings,
    self_ref: Weak<ReactionButtonsContext>,
    registry: Weak<Registry>,
    inner: Mutex<ContextInner>,
}

impl fmt::Debug for ReactionButtonsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionButtonsContext")
            .field("message_id", &self.message.id())
            .field("state", &self.state())
            .finish()
    }
}

impl ReactionButtonsContext {
    pub(crate) fn new(
        message: Arc<dyn ChatMessage>,
        handlers: ButtonTable,
        settings: ContextSettings,
        registry: Weak<Registry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            message,
            settings,
            self_ref: self_ref.clone(),
            registry,
            inner: Mutex::new(ContextInner {
                lifecycle: Lifecycle::Initializing,
                enabled: true,
                handlers,
                placed: false,
                timer: None,
            }),
        })
    }

    pub fn message_id(&self) -> MessageId {
        self.message.id()
    }

    pub fn message(&self) -> Arc<dyn ChatMessage> {
        Arc::clone(&self.message)
    }

    /// Users allowed to press the buttons. Empty means anyone.
    pub fn allowed_users(&self) -> &[UserId] {
        &self.settings.allowed_users
    }

    pub fn expiration(&self) -> Duration {
        self.settings.expiration
    }

    pub fn state(&self) -> ContextState {
        let inner = self.inner.lock().unwrap();
        match inner.lifecycle {
            Lifecycle::Cancelled => ContextState::Cancelled,
            Lifecycle::Initializing => ContextState::Initializing,
            Lifecycle::Running if inner.enabled => ContextState::Active,
            Lifecycle::Running => ContextState::Disabled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ContextState::Cancelled
    }

    /// Symbols of the currently bound buttons, in display order.
    pub fn symbols(&self) -> Vec<String> {
        self.inner.lock().unwrap().handlers.symbols()
    }

    pub fn enable(&self) {
        self.inner.lock().unwrap().enabled = true;
    }

    /// Keep the buttons but ignore every reaction until re-enabled.
    pub fn disable(&self) {
        self.inner.lock().unwrap().enabled = false;
    }

    /// Place one reaction per bound button and start the expiry timer.
    ///
    /// In guild channels the bot's permissions are checked first; a missing
    /// permission fails before any reaction is attempted.
    pub async fn initialize(&self) -> Result<()> {
        let channel = self.message.channel();
        if channel.is_guild()
            && !channel
                .has_permissions(self.settings.bot_user, &REQUIRED_PERMISSIONS)
                .await?
        {
            return Err(ButtonError::PermissionDenied {
                channel_id: channel.id(),
                missing: REQUIRED_PERMISSIONS.to_vec(),
            });
        }

        for symbol in self.symbols() {
            if self.is_cancelled() {
                return Err(self.cancelled_error());
            }
            retry(&self.settings.retry, "add_reaction", || {
                self.message.add_reaction(&symbol)
            })
            .await?;
            let cancelled = {
                let mut inner = self.inner.lock().unwrap();
                inner.placed = true;
                inner.lifecycle == Lifecycle::Cancelled
            };
            if cancelled {
                // cancel() ran while this reaction was in flight and could
                // not see it.
                if self.settings.remove_on_cancel {
                    self.remove_stray_reaction(&symbol).await;
                }
                return Err(self.cancelled_error());
            }
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.lifecycle == Lifecycle::Cancelled {
                return Err(self.cancelled_error());
            }
            inner.lifecycle = Lifecycle::Running;
            self.start_timer(&mut inner);
        }

        debug!(message_id = %self.message_id(), "reaction buttons initialized");
        Ok(())
    }

    /// Dispatch a reaction add (`added = true`) or removal to its handler.
    ///
    /// Returns whether a handler was invoked. Reactions are dropped when the
    /// context is not active, come from the bot itself, come from a user
    /// outside the allow-list, or use a symbol with no button.
    pub async fn handle_reaction_event(
        &self,
        emoji: ReactionEmoji,
        user: UserId,
        added: bool,
    ) -> Result<bool> {
        let handler = {
            let inner = self.inner.lock().unwrap();
            if inner.lifecycle != Lifecycle::Running || !inner.enabled {
                return Ok(false);
            }
            if user == self.settings.bot_user {
                return Ok(false);
            }
            if !self.settings.allowed_users.is_empty()
                && !self.settings.allowed_users.contains(&user)
            {
                debug!(message_id = %self.message_id(), user = %user, "reaction from unauthorized user ignored");
                return Ok(false);
            }
            match inner.handlers.get(emoji.symbol()) {
                Some(handler) => Arc::clone(handler),
                None => return Ok(false),
            }
        };

        let Some(context) = self.self_ref.upgrade() else {
            return Ok(false);
        };

        debug!(message_id = %self.message_id(), symbol = %emoji.symbol(), added, "dispatching button");
        handler(ButtonEvent {
            context,
            emoji,
            user,
            added,
        })
        .await?;
        Ok(true)
    }

    /// Bind a new button and place its reaction.
    ///
    /// The symbol is reserved before the reaction is placed, so a concurrent
    /// call for the same symbol fails immediately. If placing the reaction
    /// fails the reservation is released.
    pub async fn add_button(&self, symbol: impl Into<String>, handler: ButtonHandler) -> Result<()> {
        let symbol = symbol.into();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.lifecycle == Lifecycle::Cancelled {
                return Err(self.cancelled_error());
            }
            inner.handlers.insert(symbol.clone(), handler)?;
        }

        match retry(&self.settings.retry, "add_reaction", || {
            self.message.add_reaction(&symbol)
        })
        .await
        {
            Ok(()) => {
                self.inner.lock().unwrap().placed = true;
                Ok(())
            }
            Err(e) => {
                self.inner.lock().unwrap().handlers.remove(&symbol);
                Err(e.into())
            }
        }
    }

    /// Unbind a button and take its reaction off the message.
    ///
    /// With `ManageMessages` every user's reaction for the symbol is removed,
    /// otherwise only the bot's own. Returns whether the button existed.
    pub async fn remove_button(&self, symbol: &str) -> Result<bool> {
        if self.inner.lock().unwrap().handlers.remove(symbol).is_none() {
            return Ok(false);
        }

        if self.can_manage_reactions().await? {
            retry(&self.settings.retry, "remove_reaction_emoji", || {
                self.message.remove_reaction_emoji(symbol)
            })
            .await?;
        } else {
            retry(&self.settings.retry, "remove_own_reaction", || {
                self.message.remove_own_reaction(symbol)
            })
            .await?;
        }
        Ok(true)
    }

    /// Unbind every button and take the reactions off the message.
    ///
    /// With `ManageMessages` all reactions are cleared in one call, otherwise
    /// the bot's own reactions are removed one by one. The first failure is
    /// returned after every symbol has been attempted.
    pub async fn remove_all_buttons(&self) -> Result<()> {
        let symbols = {
            let mut inner = self.inner.lock().unwrap();
            let symbols = inner.handlers.symbols();
            inner.handlers.clear();
            symbols
        };
        if symbols.is_empty() {
            return Ok(());
        }

        if self.can_manage_reactions().await? {
            retry(&self.settings.retry, "remove_all_reactions", || {
                self.message.remove_all_reactions()
            })
            .await?;
            return Ok(());
        }

        let mut first_err = None;
        for symbol in &symbols {
            if let Err(e) = retry(&self.settings.retry, "remove_own_reaction", || {
                self.message.remove_own_reaction(symbol)
            })
            .await
            {
                warn!(message_id = %self.message_id(), symbol = %symbol, error = %e, "failed to remove button");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Stop the context: abort the expiry timer, leave the registry and, when
    /// configured, remove the buttons.
    ///
    /// Safe to call any number of times, including after expiry. Removal is
    /// best-effort; failures are logged and forwarded to the error sink.
    pub async fn cancel(&self) {
        let (timer, placed) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.lifecycle == Lifecycle::Cancelled {
                return;
            }
            inner.lifecycle = Lifecycle::Cancelled;
            (inner.timer.take(), inner.placed)
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        self.evict();

        if self.settings.remove_on_cancel && placed {
            if let Err(e) = self.remove_all_buttons().await {
                warn!(message_id = %self.message_id(), error = %e, "failed to remove buttons on cancel");
                self.report(e);
            }
        } else {
            self.inner.lock().unwrap().handlers.clear();
        }

        info!(message_id = %self.message_id(), "reaction buttons cancelled");
    }

    /// Spawn the expiry timer. Runs under the `inner` lock together with the
    /// transition to running, so a concurrent cancel() always sees the timer.
    fn start_timer(&self, inner: &mut ContextInner) {
        let Some(context) = self.self_ref.upgrade() else {
            return;
        };
        let expiration = self.settings.expiration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiration).await;
            // Detach first so cancel() does not abort the task running it.
            drop(context.inner.lock().unwrap().timer.take());
            info!(message_id = %context.message_id(), "reaction buttons expired");
            context.cancel().await;
        });

        if let Some(previous) = inner.timer.replace(timer) {
            previous.abort();
        }
    }

    async fn remove_stray_reaction(&self, symbol: &str) {
        if let Err(e) = retry(&self.settings.retry, "remove_own_reaction", || {
            self.message.remove_own_reaction(symbol)
        })
        .await
        {
            warn!(message_id = %self.message_id(), symbol = %symbol, error = %e, "failed to remove reaction placed after cancel");
            self.report(e.into());
        }
    }

    /// Remove this context from the registry, unless the slot already belongs
    /// to a newer registration.
    fn evict(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.message_id(), |_, current| {
                std::ptr::eq(Arc::as_ptr(current), self)
            });
        }
    }

    async fn can_manage_reactions(&self) -> Result<bool> {
        let channel = self.message.channel();
        if !channel.is_guild() {
            return Ok(false);
        }
        Ok(channel
            .has_permissions(self.settings.bot_user, &[Permission::ManageMessages])
            .await?)
    }

    fn report(&self, error: ButtonError) {
        if let Some(errors) = &self.settings.errors {
            if errors.try_send(error).is_err() {
                warn!(message_id = %self.message_id(), "error sink full or closed, dropping error");
            }
        }
    }

    fn cancelled_error(&self) -> ButtonError {
        ButtonError::Cancelled {
            message_id: self.message_id(),
        }
    }
}
