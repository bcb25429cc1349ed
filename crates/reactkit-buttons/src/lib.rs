//! Reaction buttons: bind emoji reactions on a single message to handlers.
//!
//! [`ReactionButtonManager`] owns the registry of live contexts, one per
//! message, and routes inbound reaction events to them. Each
//! [`ReactionButtonsContext`] enforces authorization, enable/disable and its
//! own expiry timer. [`Debouncer`] coalesces bursts of calls into at most a
//! leading and a trailing invocation per quiet window.

pub mod context;
pub mod debounce;
pub mod error;
pub mod manager;
pub mod table;

pub use context::{ButtonEvent, ButtonOptions, ContextState, ReactionButtonsContext};
pub use debounce::{DebounceFuture, Debouncer};
pub use error::{ButtonError, Result};
pub use manager::ReactionButtonManager;
pub use table::{handler, ButtonHandler, ButtonTable, HandlerFuture};
