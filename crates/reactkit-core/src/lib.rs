pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{ButtonsConfig, PaginationConfig, ReactkitConfig, RetryConfig};
pub use error::CoreError;
pub use types::{ChannelId, MessageId, Permission, ReactionEmoji, UserId};
