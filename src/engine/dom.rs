use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// One vocabulary entry: the term in the course language and its English
/// translation. Equality and ordering cover both fields, so the accumulator
/// deduplicates on the full pair and iterates in canonical output order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermPair {
    pub term: String,
    pub translation: String,
}

impl TermPair {
    pub fn new(term: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            translation: translation.into(),
        }
    }
}

/// Raw text pulled from one list-item container: the first heading-level
/// child and the first paragraph child. `None` means the child is missing
/// (or detached mid-read), which disqualifies the item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    pub term: Option<String>,
    pub translation: Option<String>,
}

/// Element shape a reveal strategy clicks. Matching is always structural or
/// text-based; the words page randomizes class names on every load, so
/// nothing here may reference a class or an absolute DOM path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// Enabled button whose accessible name (aria-label or text) contains
    /// the needle, case-insensitive.
    ButtonByAccessibleName(&'static str),
    /// Visible button whose text contains the needle, case-sensitive.
    ButtonByText(&'static str),
    /// Any text node inside the words section containing the needle
    /// (case-insensitive); clicks its nearest actionable ancestor.
    TextInListSection(&'static str),
}

/// The live words page, reduced to the operations the collection engine
/// needs. The production impl wraps a Chromium page; tests script a fake.
///
/// Reads (`rendered_items`, `heading_texts`) never mutate the page; only
/// `scroll_to_bottom` and `click_first` interact with it.
#[async_trait]
pub trait WordsDom: Send + Sync {
    /// Raw (heading, paragraph) text of every list-item container currently
    /// materialized, on-screen or not.
    async fn rendered_items(&self) -> Result<Vec<RawItem>>;

    /// Text of every heading element on the page.
    async fn heading_texts(&self) -> Result<Vec<String>>;

    /// Scroll the window to the full document height.
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Click the first element matching `target`. `Ok(false)` means no
    /// actionable match; lookup failures inside the page count as no match.
    async fn click_first(&self, target: ClickTarget) -> Result<bool>;

    /// Cooperative pause for asynchronous page content to materialize.
    async fn settle(&self, wait: Duration);
}
