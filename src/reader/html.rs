use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::{PageReader, ReaderError, ReaderResult, ReviewElement};
use crate::layout::Layout;

/// Owned snapshot of one element, re-parsed from its outer HTML so it can
/// outlive the page it came from.
#[derive(Debug, Clone)]
pub struct HtmlElement {
    fragment: Html,
}

impl HtmlElement {
    pub fn parse(outer_html: &str) -> Self {
        Self {
            fragment: Html::parse_fragment(outer_html),
        }
    }

    fn from_ref(el: ElementRef<'_>) -> Self {
        Self::parse(&el.html())
    }

    fn root(&self) -> Option<ElementRef<'_>> {
        self.fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
    }
}

impl ReviewElement for HtmlElement {
    fn find(&self, selector: &str) -> ReaderResult<Self> {
        let sel = parse_selector(selector)?;
        self.root()
            .and_then(|root| root.select(&sel).next())
            .map(Self::from_ref)
            .ok_or_else(|| ReaderError::NotFound(selector.to_string()))
    }

    fn find_all(&self, selector: &str) -> ReaderResult<Vec<Self>> {
        let sel = parse_selector(selector)?;
        Ok(self
            .root()
            .map(|root| root.select(&sel).map(Self::from_ref).collect())
            .unwrap_or_default())
    }

    fn text(&self) -> String {
        self.root()
            .map(|root| collapse_ws(&root.text().collect::<String>()))
            .unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.root()
            .and_then(|root| root.value().attr(name))
            .map(str::to_string)
    }
}

fn parse_selector(selector: &str) -> ReaderResult<Selector> {
    Selector::parse(selector).map_err(|_| ReaderError::Selector(selector.to_string()))
}

fn collapse_ws(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Snapshot reader ──

/// Page Reader over a directory of rendered listing pages saved as
/// `page-<n>.html`.
pub struct SnapshotReader {
    dir: PathBuf,
    page: u32,
    document: Html,
    layout: Layout,
}

impl SnapshotReader {
    pub async fn open(dir: impl Into<PathBuf>, first_page: u32, layout: Layout) -> ReaderResult<Self> {
        let dir = dir.into();
        let document = load_page(&dir, first_page).await?;
        info!(dir = %dir.display(), page = first_page, "Opened listing snapshots");
        Ok(Self {
            dir,
            page: first_page,
            document,
            layout,
        })
    }

    fn select_text(&self, selector: &str) -> ReaderResult<Option<String>> {
        let sel = parse_selector(selector)?;
        Ok(self
            .document
            .select(&sel)
            .next()
            .map(|el| collapse_ws(&el.text().collect::<String>())))
    }

    /// Whitespace-separated tokens of the first match, split per text node so
    /// adjacent buttons never fuse into one number.
    fn select_tokens(&self, selector: &str) -> ReaderResult<Option<Vec<String>>> {
        let sel = parse_selector(selector)?;
        Ok(self.document.select(&sel).next().map(|el| {
            el.text()
                .flat_map(str::split_whitespace)
                .map(str::to_string)
                .collect()
        }))
    }
}

pub fn snapshot_path(dir: &Path, page: u32) -> PathBuf {
    dir.join(format!("page-{}.html", page))
}

async fn load_page(dir: &Path, page: u32) -> ReaderResult<Html> {
    let path = snapshot_path(dir, page);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ReaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Html::parse_document(&raw))
}

impl PageReader for SnapshotReader {
    type Element = HtmlElement;

    async fn query_elements(&mut self, selector: &str) -> ReaderResult<Vec<HtmlElement>> {
        let sel = parse_selector(selector)?;
        Ok(self.document.select(&sel).map(HtmlElement::from_ref).collect())
    }

    async fn has_more_pages(&mut self) -> ReaderResult<bool> {
        let current = self.select_text(self.layout.current_page)?;
        let pages = self.select_tokens(self.layout.page_container)?;
        let (Some(current), Some(pages)) = (current, pages) else {
            debug!(page = self.page, "No pagination markup");
            return Ok(false);
        };

        let current: u32 = current
            .parse()
            .map_err(|_| ReaderError::Markup(format!("current page marker '{}'", current)))?;
        let last = pages.iter().filter_map(|p| p.parse::<u32>().ok()).last();
        Ok(last.is_some_and(|last| last != current))
    }

    async fn go_to_next_page(&mut self) -> ReaderResult<()> {
        let next = self.page + 1;
        self.document = load_page(&self.dir, next)
            .await
            .map_err(|e| ReaderError::Navigation(format!("page {}: {}", next, e)))?;
        self.page = next;
        Ok(())
    }

    async fn reload_current_page(&mut self) -> ReaderResult<()> {
        self.document = load_page(&self.dir, self.page)
            .await
            .map_err(|e| ReaderError::Reload(e.to_string()))?;
        Ok(())
    }

    async fn current_page_number(&mut self) -> ReaderResult<u32> {
        match self.select_text(self.layout.current_page)? {
            Some(marker) => marker
                .parse()
                .map_err(|_| ReaderError::Markup(format!("current page marker '{}'", marker))),
            None => Ok(self.page),
        }
    }
}

// ── Tests ──
