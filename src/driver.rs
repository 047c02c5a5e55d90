//! Pagination Driver: extract a page, then retry, advance or stop.
//!
//! ```text
//! Ready ──► Extracting ──► Advancing ──► Ready ...
//!   │            │             │
//!   └────────────┴─────────────┴──► Terminated(reason)
//! ```
//!
//! Every stop is a normal outcome; records gathered before the stop are
//! always returned.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::accumulator::ResultAccumulator;
use crate::boundary::DateBoundaryFilter;
use crate::layout::Layout;
use crate::reader::{PageReader, ReaderResult};
use crate::record::{self, Outcome};
use crate::settings::RunConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// No review cards, even after one reload.
    InvalidPage,
    LimitReached,
    DateBoundary,
    NoMorePages,
    NavigationFailure(String),
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::InvalidPage => "invalid_page",
            Termination::LimitReached => "limit_reached",
            Termination::DateBoundary => "date_boundary",
            Termination::NoMorePages => "no_more_pages",
            Termination::NavigationFailure(_) => "navigation_failure",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::InvalidPage => f.write_str("invalid page"),
            Termination::LimitReached => f.write_str("limit reached"),
            Termination::DateBoundary => f.write_str("date boundary"),
            Termination::NoMorePages => f.write_str("no more pages"),
            Termination::NavigationFailure(e) => write!(f, "navigation failure ({})", e),
        }
    }
}

/// Per-page tallies handed to the progress callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    pub page: u32,
    pub found: usize,
    pub kept: usize,
    pub featured: usize,
    pub blocked: usize,
    pub total_kept: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub records: ResultAccumulator,
    pub termination: Termination,
    pub first_page: u32,
    pub last_page: u32,
    pub elements_seen: u64,
}

enum State<E> {
    Ready,
    Extracting(Vec<E>),
    Advancing,
    Terminated(Termination),
}

pub struct PaginationDriver<'r, R: PageReader> {
    reader: &'r mut R,
    layout: Layout,
    limit: usize,
    settle: Duration,
    page_wait: Duration,
    first_page: u32,
    page: u32,
    next_index: u64,
    boundary: DateBoundaryFilter,
    results: ResultAccumulator,
}

impl<'r, R: PageReader> PaginationDriver<'r, R> {
    /// Bind to a reader already positioned on the first page to extract.
    pub async fn start(reader: &'r mut R, config: &RunConfig, layout: Layout) -> ReaderResult<Self> {
        let page = if config.start_from_url {
            let page = reader.current_page_number().await?;
            info!(page, "Starting from page {}", page);
            page
        } else {
            1
        };
        info!(limit = config.limit, "Scraping up to {} reviews", config.limit);

        Ok(Self {
            reader,
            layout,
            limit: config.limit,
            settle: config.settle,
            page_wait: config.page_wait,
            first_page: page,
            page,
            next_index: 0,
            boundary: DateBoundaryFilter::new(config.bound),
            results: ResultAccumulator::new(),
        })
    }

    pub async fn run(mut self, mut on_page: impl FnMut(&PageReport)) -> RunSummary {
        let mut state = State::Ready;
        loop {
            state = match state {
                State::Ready => self.ready().await,
                State::Extracting(elements) => {
                    let report = self.extract(elements);
                    on_page(&report);
                    self.evaluate().await
                }
                State::Advancing => self.advance().await,
                State::Terminated(reason) => return self.finish(reason),
            };
        }
    }

    async fn ready(&mut self) -> State<R::Element> {
        info!(page = self.page, "Extracting reviews from page {}", self.page);
        match self.reader.query_elements(self.layout.review_card).await {
            Ok(elements) if !elements.is_empty() => {
                info!(page = self.page, "Found {} reviews on page {}", elements.len(), self.page);
                return State::Extracting(elements);
            }
            Ok(_) => {}
            Err(e) => return State::Terminated(Termination::NavigationFailure(e.to_string())),
        }

        // Empty page: reload once and give it time to render.
        info!(page = self.page, "No reviews found, reloading page");
        if let Err(e) = self.reader.reload_current_page().await {
            return State::Terminated(Termination::NavigationFailure(e.to_string()));
        }
        tokio::time::sleep(self.settle).await;

        match self.reader.query_elements(self.layout.review_card).await {
            Ok(elements) if !elements.is_empty() => {
                info!(page = self.page, "Found {} reviews on page {}", elements.len(), self.page);
                State::Extracting(elements)
            }
            Ok(_) => State::Terminated(Termination::InvalidPage),
            Err(e) => State::Terminated(Termination::NavigationFailure(e.to_string())),
        }
    }

    fn extract(&mut self, elements: Vec<R::Element>) -> PageReport {
        let mut report = PageReport {
            page: self.page,
            found: elements.len(),
            ..Default::default()
        };
        let mut dates = Vec::new();

        for element in &elements {
            let source_index = self.next_index;
            self.next_index += 1;

            match record::build(element, &self.layout) {
                Outcome::Kept(record) => {
                    let missing = record.fields().filter(|(_, v)| v.is_missing()).count();
                    info!(
                        source_index,
                        missing,
                        "Scraped data for \"{}\" ({})",
                        record.title().unwrap_or("?"),
                        record.date().map(|d| d.to_string()).unwrap_or_default()
                    );
                    dates.extend(record.date());
                    self.results.append(source_index, record);
                    report.kept += 1;
                }
                Outcome::Featured => report.featured += 1,
                Outcome::Blocked => report.blocked += 1,
            }
        }

        self.boundary.observe(&dates);
        report.total_kept = self.results.kept();
        report
    }

    async fn evaluate(&mut self) -> State<R::Element> {
        if self.boundary.reached() {
            return State::Terminated(Termination::DateBoundary);
        }
        if self.results.kept() >= self.limit {
            return State::Terminated(Termination::LimitReached);
        }
        match self.reader.has_more_pages().await {
            Ok(true) => State::Advancing,
            Ok(false) => State::Terminated(Termination::NoMorePages),
            Err(e) => State::Terminated(Termination::NavigationFailure(e.to_string())),
        }
    }

    async fn advance(&mut self) -> State<R::Element> {
        info!("Going to page {}", self.page + 1);
        if let Err(e) = self.reader.go_to_next_page().await {
            return State::Terminated(Termination::NavigationFailure(e.to_string()));
        }
        tokio::time::sleep(self.page_wait).await;
        self.page += 1;
        State::Ready
    }

    fn finish(self, termination: Termination) -> RunSummary {
        let kept = self.results.kept();
        match &termination {
            Termination::NavigationFailure(e) => warn!(
                page = self.page,
                kept,
                error = %e,
                "Stopping early on navigation failure, keeping partial results"
            ),
            reason => info!(page = self.page, kept, %reason, "Stopping"),
        }
        RunSummary {
            records: self.results,
            termination,
            first_page: self.first_page,
            last_page: self.page,
            elements_seen: self.next_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::DateBound;
    use crate::layout::LISTING_2022;
    use crate::reader::html::{HtmlElement, SnapshotReader};
    use crate::reader::ReaderError;
    use chrono::NaiveDate;

    fn card(date: &str, title: &str) -> String {
        format!(
            r#"<li class="empReview"><h2><a class="reviewLink">"{}"</a></h2>
               <span class="common__EiReviewDetailsStyle__newUiJobLine">{} - Analyst</span></li>"#,
            title, date
        )
    }

    fn featured() -> String {
        r#"<li class="empReview"><span class="featuredFlag">Featured</span>
           <span class="common__EiReviewDetailsStyle__newUiJobLine">Jan 1, 2020 - Analyst</span></li>"#
            .to_string()
    }

    fn blocked() -> String {
        r#"<li class="empReview"><p>Removed</p></li>"#.to_string()
    }

    /// In-memory listing: one Vec of card markup per page.
    #[derive(Default)]
    struct ScriptedReader {
        pages: Vec<Vec<String>>,
        page: usize,
        /// Pages that come up empty until reloaded.
        flaky: Vec<usize>,
        fail_navigation: bool,
        /// Element queries on this page error out.
        fail_query_on_page: Option<usize>,
        fail_reload: bool,
        fail_more_pages: bool,
        queries: usize,
        reloads: usize,
        navigations: usize,
    }

    impl ScriptedReader {
        fn new(pages: Vec<Vec<String>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }
    }

    impl PageReader for ScriptedReader {
        type Element = HtmlElement;

        async fn query_elements(&mut self, _selector: &str) -> ReaderResult<Vec<HtmlElement>> {
            self.queries += 1;
            if self.fail_query_on_page == Some(self.page) {
                return Err(ReaderError::Markup("listing container detached".into()));
            }
            if self.flaky.contains(&self.page) {
                return Ok(Vec::new());
            }
            Ok(self.pages[self.page].iter().map(|h| HtmlElement::parse(h)).collect())
        }

        async fn has_more_pages(&mut self) -> ReaderResult<bool> {
            if self.fail_more_pages {
                return Err(ReaderError::Markup("pagination widget unreadable".into()));
            }
            Ok(self.page + 1 < self.pages.len())
        }

        async fn go_to_next_page(&mut self) -> ReaderResult<()> {
            self.navigations += 1;
            if self.fail_navigation {
                return Err(ReaderError::Navigation("next button missing".into()));
            }
            self.page += 1;
            Ok(())
        }

        async fn reload_current_page(&mut self) -> ReaderResult<()> {
            self.reloads += 1;
            if self.fail_reload {
                return Err(ReaderError::Reload("session expired".into()));
            }
            let page = self.page;
            self.flaky.retain(|p| *p != page);
            Ok(())
        }

        async fn current_page_number(&mut self) -> ReaderResult<u32> {
            Ok(self.page as u32 + 1)
        }
    }

    fn config(limit: usize) -> RunConfig {
        RunConfig {
            limit,
            bound: None,
            start_from_url: false,
            settle: Duration::ZERO,
            page_wait: Duration::ZERO,
        }
    }

    fn cards(n: usize, date: &str) -> Vec<String> {
        (0..n).map(|i| card(date, &format!("Review {}", i))).collect()
    }

    async fn run(reader: &mut ScriptedReader, cfg: RunConfig) -> RunSummary {
        PaginationDriver::start(reader, &cfg, LISTING_2022)
            .await
            .unwrap()
            .run(|_| {})
            .await
    }

    #[tokio::test]
    async fn limit_checked_between_pages_only() {
        let mut reader = ScriptedReader::new(vec![
            cards(3, "Mar 1, 2021"),
            cards(4, "Feb 1, 2021"),
            cards(2, "Jan 1, 2021"),
        ]);
        let summary = run(&mut reader, config(5)).await;
        assert_eq!(summary.termination, Termination::LimitReached);
        // The page that crosses the limit is kept whole.
        assert_eq!(summary.records.kept(), 7);
        assert_eq!(reader.navigations, 1);
        assert_eq!(summary.last_page, 2);
    }

    #[tokio::test]
    async fn max_date_stops_before_next_page() {
        let mut reader = ScriptedReader::new(vec![
            vec![card("Dec 1, 2019", "a"), card("Feb 1, 2020", "b")],
            cards(2, "Mar 1, 2020"),
        ]);
        let cfg = RunConfig {
            bound: Some(DateBound::Max(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
            start_from_url: true,
            ..config(100)
        };
        let summary = run(&mut reader, cfg).await;
        assert_eq!(summary.termination, Termination::DateBoundary);
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(reader.navigations, 0);
    }

    #[tokio::test]
    async fn empty_page_after_reload_is_invalid_and_keeps_prior_records() {
        let mut reader = ScriptedReader::new(vec![cards(2, "Mar 1, 2021"), vec![]]);
        let summary = run(&mut reader, config(100)).await;
        assert_eq!(summary.termination, Termination::InvalidPage);
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(reader.reloads, 1);
        // page 1 once, page 2 twice
        assert_eq!(reader.queries, 3);
    }

    #[tokio::test]
    async fn reload_recovers_slow_page() {
        let mut reader = ScriptedReader::new(vec![cards(2, "Mar 1, 2021")]);
        reader.flaky = vec![0];
        let summary = run(&mut reader, config(100)).await;
        assert_eq!(reader.reloads, 1);
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(summary.termination, Termination::NoMorePages);
    }

    #[tokio::test]
    async fn source_index_counts_discarded_cards() {
        let mut reader = ScriptedReader::new(vec![
            vec![featured(), card("Mar 1, 2021", "a"), blocked()],
            vec![card("Feb 1, 2021", "b")],
        ]);
        let summary = run(&mut reader, config(100)).await;
        let idx: Vec<u64> = summary.records.records().iter().map(|r| r.source_index).collect();
        assert_eq!(idx, vec![1, 3]);
        assert_eq!(summary.elements_seen, 4);
    }

    #[tokio::test]
    async fn featured_cards_do_not_count_toward_limit() {
        let mut reader = ScriptedReader::new(vec![
            vec![featured(), card("Mar 1, 2021", "a"), featured()],
            vec![card("Feb 1, 2021", "b")],
            vec![card("Jan 1, 2021", "c")],
        ]);
        let summary = run(&mut reader, config(2)).await;
        assert_eq!(summary.termination, Termination::LimitReached);
        assert_eq!(summary.records.kept(), 2);
        assert!(summary
            .records
            .records()
            .iter()
            .all(|r| r.record.title() != Some("Featured")));
        assert_eq!(reader.navigations, 1);
    }

    #[tokio::test]
    async fn navigation_failure_keeps_partial_results() {
        let mut reader = ScriptedReader::new(vec![cards(3, "Mar 1, 2021"), cards(3, "Feb 1, 2021")]);
        reader.fail_navigation = true;
        let summary = run(&mut reader, config(100)).await;
        assert!(matches!(summary.termination, Termination::NavigationFailure(_)));
        assert_eq!(summary.records.kept(), 3);
    }

    #[tokio::test]
    async fn query_failure_on_later_page_keeps_partial_results() {
        let mut reader = ScriptedReader::new(vec![cards(2, "Mar 1, 2021"), cards(2, "Feb 1, 2021")]);
        reader.fail_query_on_page = Some(1);
        let summary = run(&mut reader, config(100)).await;
        assert!(matches!(summary.termination, Termination::NavigationFailure(_)));
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(summary.last_page, 2);
        assert_eq!(reader.reloads, 0);
    }

    #[tokio::test]
    async fn reload_failure_keeps_partial_results() {
        let mut reader = ScriptedReader::new(vec![cards(3, "Mar 1, 2021"), cards(2, "Feb 1, 2021")]);
        reader.flaky = vec![1];
        reader.fail_reload = true;
        let summary = run(&mut reader, config(100)).await;
        assert!(matches!(summary.termination, Termination::NavigationFailure(_)));
        assert_eq!(summary.records.kept(), 3);
        assert_eq!(reader.reloads, 1);
    }

    #[tokio::test]
    async fn more_pages_failure_keeps_partial_results() {
        let mut reader = ScriptedReader::new(vec![cards(2, "Mar 1, 2021"), cards(2, "Feb 1, 2021")]);
        reader.fail_more_pages = true;
        let summary = run(&mut reader, config(100)).await;
        match &summary.termination {
            Termination::NavigationFailure(e) => assert!(e.contains("pagination widget")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(reader.navigations, 0);
    }

    #[tokio::test]
    async fn min_date_stops_before_next_page() {
        let mut reader = ScriptedReader::new(vec![
            vec![card("Feb 1, 2020", "a"), card("Dec 1, 2019", "b")],
            cards(2, "Nov 1, 2019"),
        ]);
        let cfg = RunConfig {
            bound: Some(DateBound::Min(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
            start_from_url: true,
            ..config(100)
        };
        let summary = run(&mut reader, cfg).await;
        assert_eq!(summary.termination, Termination::DateBoundary);
        assert_eq!(summary.records.kept(), 2);
        assert_eq!(reader.navigations, 0);
    }

    #[tokio::test]
    async fn min_date_not_crossed_keeps_paging() {
        let mut reader = ScriptedReader::new(vec![cards(2, "Mar 1, 2020"), cards(2, "Feb 1, 2020")]);
        let cfg = RunConfig {
            bound: Some(DateBound::Min(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
            start_from_url: true,
            ..config(100)
        };
        let summary = run(&mut reader, cfg).await;
        assert_eq!(summary.termination, Termination::NoMorePages);
        assert_eq!(summary.records.kept(), 4);
        assert_eq!(reader.navigations, 1);
    }

    #[tokio::test]
    async fn page_reports_reach_callback() {
        let mut reader = ScriptedReader::new(vec![
            vec![featured(), card("Mar 1, 2021", "a"), blocked()],
            cards(2, "Feb 1, 2021"),
        ]);
        let cfg = config(100);
        let mut reports = Vec::new();
        let summary = PaginationDriver::start(&mut reader, &cfg, LISTING_2022)
            .await
            .unwrap()
            .run(|r| reports.push(r.clone()))
            .await;
        assert_eq!(summary.termination, Termination::NoMorePages);
        assert_eq!(
            reports[0],
            PageReport {
                page: 1,
                found: 3,
                kept: 1,
                featured: 1,
                blocked: 1,
                total_kept: 1,
            }
        );
        assert_eq!(reports[1].page, 2);
        assert_eq!(reports[1].total_kept, 3);
    }

    #[tokio::test]
    async fn start_from_url_reads_current_page() {
        let mut reader = ScriptedReader::new(vec![cards(1, "Mar 1, 2021")]);
        let cfg = RunConfig {
            start_from_url: true,
            ..config(10)
        };
        let summary = run(&mut reader, cfg).await;
        assert_eq!(summary.first_page, 1);
        assert_eq!(summary.last_page, 1);
    }

    #[tokio::test]
    async fn snapshot_listing_end_to_end() {
        let mut reader = SnapshotReader::open("tests/fixtures/listing", 1, LISTING_2022)
            .await
            .unwrap();
        let cfg = config(100);
        let summary = PaginationDriver::start(&mut reader, &cfg, LISTING_2022)
            .await
            .unwrap()
            .run(|_| {})
            .await;
        assert_eq!(summary.termination, Termination::NoMorePages);
        let rows = summary.records.records();
        let idx: Vec<u64> = rows.iter().map(|r| r.source_index).collect();
        assert_eq!(idx, vec![1, 3, 4]);
        let titles: Vec<&str> = rows.iter().filter_map(|r| r.record.title()).collect();
        assert_eq!(titles, vec!["Solid first job", "Supportive team", "Burnout risk"]);
    }
}
