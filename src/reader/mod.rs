//! Contracts for reading an already-rendered review listing.
//!
//! The extraction core only ever talks to a page through [`PageReader`] and to
//! a single review card through [`ReviewElement`]. Session setup, sign-in and
//! rendering happen before a reader is handed over.

pub mod html;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("No element matches '{0}'")]
    NotFound(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Reload failed: {0}")]
    Reload(String),

    #[error("Unexpected page markup: {0}")]
    Markup(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    /// True when the query ran fine and simply matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReaderError::NotFound(_))
    }
}

pub type ReaderResult<T> = Result<T, ReaderError>;

/// One rendered review card (or any element nested inside it).
pub trait ReviewElement: Sized {
    /// First descendant matching `selector`.
    fn find(&self, selector: &str) -> ReaderResult<Self>;

    /// All descendants matching `selector`, in document order. No match is
    /// an empty vec, not an error.
    fn find_all(&self, selector: &str) -> ReaderResult<Vec<Self>>;

    /// Visible text with whitespace runs collapsed.
    fn text(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    fn contains(&self, selector: &str) -> bool {
        self.find(selector).is_ok()
    }
}

/// A single browser-like session positioned on a page of the listing.
///
/// Calls are made one at a time; implementations may assume they are never
/// re-entered.
#[allow(async_fn_in_trait)]
pub trait PageReader {
    type Element: ReviewElement;

    async fn query_elements(&mut self, selector: &str) -> ReaderResult<Vec<Self::Element>>;

    async fn has_more_pages(&mut self) -> ReaderResult<bool>;

    async fn go_to_next_page(&mut self) -> ReaderResult<()>;

    async fn reload_current_page(&mut self) -> ReaderResult<()>;

    async fn current_page_number(&mut self) -> ReaderResult<u32>;
}
