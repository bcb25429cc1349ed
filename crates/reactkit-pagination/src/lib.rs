//! Reaction-driven pagination over cached, lazily fetched pages.

pub mod controller;
pub mod error;
pub mod manager;
pub mod source;

pub use controller::{PageController, PageOptions, SINGLE_TRACK};
pub use error::{PaginationError, Result};
pub use manager::{PaginationManager, PaginationOptions};
pub use source::{page_fn, FnPageSource, ListPages, PageSource, StaticPages};
