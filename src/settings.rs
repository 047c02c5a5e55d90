use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::boundary::DateBound;

const SETTINGS_FILE: &str = "review_scraper";
const ENV_PREFIX: &str = "REVIEWS";

/// Defaults from `review_scraper.toml` and `REVIEWS_*` environment variables.
/// CLI flags win over both.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Pause after reloading an empty page.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Pause after moving to the next page.
    #[serde(default = "default_page_wait_secs")]
    pub page_wait_secs: u64,

    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_limit() -> usize {
    25
}
fn default_settle_secs() -> u64 {
    5
}
fn default_page_wait_secs() -> u64 {
    5
}
fn default_db_path() -> String {
    "data/reviews.sqlite".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            settle_secs: default_settle_secs(),
            page_wait_secs: default_page_wait_secs(),
            db_path: default_db_path(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name(SETTINGS_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

/// One listing in a batch manifest:
///
/// ```toml
/// [[listing]]
/// pages = "snapshots/acme"
/// limit = 60
/// out = "out/acme.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchJob {
    pub pages: PathBuf,
    pub limit: Option<usize>,
    pub url: Option<String>,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct BatchManifest {
    #[serde(default)]
    listing: Vec<BatchJob>,
}

pub fn load_batch(path: &Path) -> Result<Vec<BatchJob>> {
    let source = config::File::from(path).format(config::FileFormat::Toml);
    batch_from(source).with_context(|| format!("Invalid batch manifest {}", path.display()))
}

fn batch_from<S>(source: S) -> Result<Vec<BatchJob>>
where
    S: config::Source + Send + Sync + 'static,
{
    let manifest: BatchManifest = config::Config::builder()
        .add_source(source)
        .build()?
        .try_deserialize()?;
    if manifest.listing.is_empty() {
        bail!("no [[listing]] entries");
    }
    Ok(manifest.listing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Reads `sort.ascending` from the listing URL. Anything but `true`
    /// (including no parameter) is the site's default newest-first order.
    pub fn from_listing_url(listing_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(listing_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", listing_url, e)))?;
        let ascending = url
            .query_pairs()
            .any(|(k, v)| k == "sort.ascending" && v == "true");
        Ok(if ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        })
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Ascending => "ASCENDING",
            SortOrder::Descending => "DESCENDING",
        })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Result limit must be at least 1")]
    ZeroLimit,

    #[error("Invalid argument combination: both min_date and max_date specified")]
    ConflictingBounds,

    #[error("Invalid argument combination: no starting url passed, but max/min date specified")]
    BoundWithoutStartUrl,

    #[error("A date bound needs the listing URL to verify its sort order")]
    MissingListingUrl,

    #[error("{bound} requires reviews to be sorted {required} by date")]
    SortMismatch { bound: &'static str, required: SortOrder },

    #[error("Invalid listing URL {0}")]
    InvalidUrl(String),
}

/// What the caller asked for, before validation.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub limit: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub start_from_url: bool,
    pub listing_url: Option<String>,
}

/// Validated inputs to the pagination driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub limit: usize,
    pub bound: Option<DateBound>,
    pub start_from_url: bool,
    pub settle: Duration,
    pub page_wait: Duration,
}

impl RunConfig {
    pub fn validate(request: &RunRequest, settings: &Settings) -> Result<Self, ConfigError> {
        if request.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }

        let bound = match (request.min_date, request.max_date) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingBounds),
            (Some(min), None) => Some(DateBound::Min(min)),
            (None, Some(max)) => Some(DateBound::Max(max)),
            (None, None) => None,
        };

        if let Some(bound) = bound {
            if !request.start_from_url {
                return Err(ConfigError::BoundWithoutStartUrl);
            }
            let url = request
                .listing_url
                .as_deref()
                .ok_or(ConfigError::MissingListingUrl)?;
            verify_date_sorting(bound, SortOrder::from_listing_url(url)?)?;
        }

        Ok(Self {
            limit: request.limit,
            bound,
            start_from_url: request.start_from_url,
            settle: Duration::from_secs(settings.settle_secs),
            page_wait: Duration::from_secs(settings.page_wait_secs),
        })
    }
}

fn verify_date_sorting(bound: DateBound, order: SortOrder) -> Result<(), ConfigError> {
    match (bound, order) {
        (DateBound::Min(_), SortOrder::Ascending) => Err(ConfigError::SortMismatch {
            bound: "min_date",
            required: SortOrder::Descending,
        }),
        (DateBound::Max(_), SortOrder::Descending) => Err(ConfigError::SortMismatch {
            bound: "max_date",
            required: SortOrder::Ascending,
        }),
        _ => Ok(()),
    }
}
