use std::sync::Arc;
use std::time::Duration;

use reactkit_buttons::{ReactionButtonManager, ReactionButtonsContext};
use reactkit_channels::MessageChannel;
use reactkit_core::UserId;
use tracing::instrument;

use crate::controller::PageController;
use crate::error::Result;

/// Per-paginator overrides.
#[derive(Debug, Clone, Default)]
pub struct PaginationOptions {
    /// Overrides the manager's default expiration.
    pub expiration: Option<Duration>,
}

/// Posts paginators and registers their buttons on a shared
/// [`ReactionButtonManager`].
pub struct PaginationManager {
    buttons: Arc<ReactionButtonManager>,
    default_expiration: Duration,
}

impl PaginationManager {
    pub fn new(buttons: Arc<ReactionButtonManager>, default_expiration: Duration) -> Self {
        Self {
            buttons,
            default_expiration,
        }
    }

    /// Use the button manager's configured expiration as the default.
    pub fn from_buttons(buttons: Arc<ReactionButtonManager>) -> Self {
        let default_expiration = buttons.config().expiration();
        Self::new(buttons, default_expiration)
    }

    pub fn buttons(&self) -> &Arc<ReactionButtonManager> {
        &self.buttons
    }

    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    #[instrument(skip_all, fields(channel_id = %channel.id()))]
    pub async fn add(
        &self,
        channel: Arc<dyn MessageChannel>,
        allowed_users: Vec<UserId>,
        controller: &Arc<PageController>,
        options: PaginationOptions,
    ) -> Result<Arc<ReactionButtonsContext>> {
        let expiration = options.expiration.unwrap_or(self.default_expiration);
        controller
            .initialize(channel, allowed_users, Some(expiration), &self.buttons)
            .await
    }
}
