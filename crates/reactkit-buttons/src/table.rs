use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::context::ButtonEvent;
use crate::error::{ButtonError, Result};

pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// A button callback. The owning context travels inside the [`ButtonEvent`],
/// so handlers never need to capture it themselves.
pub type ButtonHandler = Arc<dyn Fn(ButtonEvent) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`ButtonHandler`].
pub fn handler<F, Fut>(f: F) -> ButtonHandler
where
    F: Fn(ButtonEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Reaction symbol → handler, in insertion order.
///
/// Symbols are unique: inserting one that is already present fails instead of
/// replacing the existing handler. Order is kept because it is the order the
/// reactions appear on the message.
#[derive(Clone, Default)]
pub struct ButtonTable {
    entries: Vec<(String, ButtonHandler)>,
}

impl ButtonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, handler: ButtonHandler) -> Result<()> {
        let symbol = symbol.into();
        if self.contains(&symbol) {
            return Err(ButtonError::ButtonExists { symbol });
        }
        self.entries.push((symbol, handler));
        Ok(())
    }

    /// Builder form of [`ButtonTable::insert`].
    pub fn with(mut self, symbol: impl Into<String>, handler: ButtonHandler) -> Result<Self> {
        self.insert(symbol, handler)?;
        Ok(self)
    }

    pub fn get(&self, symbol: &str) -> Option<&ButtonHandler> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, h)| h)
    }

    pub fn remove(&mut self, symbol: &str) -> Option<ButtonHandler> {
        let idx = self.entries.iter().position(|(s, _)| s == symbol)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.iter().any(|(s, _)| s == symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ButtonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(s, _)| s)).finish()
    }
}
