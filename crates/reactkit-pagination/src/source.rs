//! Page sources: where a track's page content comes from.
//!
//! A source is asked for one page index at a time and answers `None` past
//! its last page. It never needs to know its length up front; the controller
//! discovers the bound by probing.

use std::future::Future;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Render page `index` (0-based), or `None` if there is no such page.
    async fn page(&self, index: usize) -> Result<Option<String>>;
}

/// Pages that are fully rendered up front.
#[derive(Debug, Clone)]
pub struct StaticPages {
    pages: Vec<String>,
}

impl StaticPages {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn page(&self, index: usize) -> Result<Option<String>> {
        Ok(self.pages.get(index).cloned())
    }
}

/// A list of items laid out `per_page` at a time as a bulleted list with a
/// title and page footer.
#[derive(Debug, Clone)]
pub struct ListPages {
    title: String,
    items: Vec<String>,
    per_page: usize,
}

impl ListPages {
    pub fn new(title: impl Into<String>, items: Vec<String>, per_page: usize) -> Self {
        Self {
            title: title.into(),
            items,
            per_page: per_page.max(1),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.per_page)
    }
}

#[async_trait]
impl PageSource for ListPages {
    async fn page(&self, index: usize) -> Result<Option<String>> {
        let total = self.total_pages();
        if index >= total {
            return Ok(None);
        }
        let start = index * self.per_page;
        let end = (start + self.per_page).min(self.items.len());
        Ok(Some(format!(
            "**{}**\n- {}\n\nPage {}/{}",
            self.title,
            self.items[start..end].join("\n- "),
            index + 1,
            total
        )))
    }
}

/// Adapter turning an async closure into a [`PageSource`].
pub struct FnPageSource<F> {
    f: F,
}

pub fn page_fn<F, Fut>(f: F) -> FnPageSource<F>
where
    F: Fn(usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>>> + Send + 'static,
{
    FnPageSource { f }
}

#[async_trait]
impl<F, Fut> PageSource for FnPageSource<F>
where
    F: Fn(usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>>> + Send + 'static,
{
    async fn page(&self, index: usize) -> Result<Option<String>> {
        (self.f)(index).await
    }
}
