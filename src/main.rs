mod accumulator;
mod boundary;
mod db;
mod driver;
mod export;
mod layout;
mod reader;
mod record;
mod registry;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::driver::{PaginationDriver, RunSummary};
use crate::layout::Layout;
use crate::reader::html::SnapshotReader;
use crate::settings::{RunConfig, RunRequest, Settings};

#[derive(Parser)]
#[command(name = "review_scraper", about = "Employee review listing scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a saved listing (page-<n>.html files) and extract reviews
    Scrape {
        /// Directory of rendered listing pages
        #[arg(long)]
        pages: PathBuf,
        /// Listing URL the pages were saved from (needed for date bounds)
        #[arg(long)]
        url: Option<String>,
        /// Stop after the page that reaches this many reviews
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Stop once a page holds a review older than this (YYYY-MM-DD)
        #[arg(long)]
        min_date: Option<NaiveDate>,
        /// Stop once a page holds a review newer than this (YYYY-MM-DD)
        #[arg(long)]
        max_date: Option<NaiveDate>,
        /// Resume from the page the listing URL points at
        #[arg(long)]
        start_from_url: bool,
        /// Snapshot to open when resuming
        #[arg(long, default_value = "1", requires = "start_from_url")]
        first_page: u32,
        /// Also write records as JSON lines
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Skip the SQLite sink
        #[arg(long)]
        no_db: bool,
    },
    /// Scrape every listing named in a TOML manifest, one after another
    Batch {
        /// Manifest with one [[listing]] table per listing
        manifest: PathBuf,
        /// Skip the SQLite sink
        #[arg(long)]
        no_db: bool,
    },
    /// Show stored run statistics
    Stats,
}

/// One listing to walk and where its records go.
struct Job {
    pages: PathBuf,
    request: RunRequest,
    first_page: u32,
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Scrape {
            pages,
            url,
            limit,
            min_date,
            max_date,
            start_from_url,
            first_page,
            out,
            no_db,
        } => {
            let job = Job {
                pages,
                request: RunRequest {
                    limit: limit.unwrap_or(settings.limit),
                    min_date,
                    max_date,
                    start_from_url,
                    listing_url: url,
                },
                first_page,
                out,
            };
            scrape_listing(&job, &settings, !no_db).await.map(|_| ())
        }
        Commands::Batch { manifest, no_db } => {
            let jobs = crate::settings::load_batch(&manifest)?;
            println!("Scraping {} listings from {}", jobs.len(), manifest.display());
            let mut failed = 0;
            for entry in jobs {
                let job = Job {
                    request: RunRequest {
                        limit: entry.limit.unwrap_or(settings.limit),
                        listing_url: entry.url,
                        ..Default::default()
                    },
                    pages: entry.pages,
                    first_page: 1,
                    out: entry.out,
                };
                if let Err(e) = scrape_listing(&job, &settings, !no_db).await {
                    tracing::warn!(dir = %job.pages.display(), error = %e, "Listing failed, moving on");
                    failed += 1;
                }
            }
            if failed > 0 {
                println!("{} listings failed", failed);
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs:      {}", s.runs);
            println!("Reviews:   {}", s.reviews);
            println!(
                "Dates:     {} .. {}",
                s.earliest.as_deref().unwrap_or("-"),
                s.latest.as_deref().unwrap_or("-")
            );
            println!(
                "Avg stars: {}",
                s.avg_rating.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "-".into())
            );
            println!("Last stop: {}", s.last_termination.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape_listing(job: &Job, settings: &Settings, save_db: bool) -> anyhow::Result<RunSummary> {
    let config = RunConfig::validate(&job.request, settings)?;
    let layout = Layout::default();
    tracing::info!(layout = layout.version, dir = %job.pages.display(), "Opening listing snapshots");

    let mut reader = SnapshotReader::open(job.pages.clone(), job.first_page, layout).await?;
    let driver = PaginationDriver::start(&mut reader, &config, layout).await?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    let summary = driver
        .run(|report| {
            pb.set_message(format!(
                "page {}: {} kept / {} found, {} total",
                report.page, report.kept, report.found, report.total_kept
            ));
        })
        .await;
    pb.finish_and_clear();

    println!(
        "{}: stopped on {}. Kept {} reviews of {} seen across pages {}-{}.",
        job.pages.display(),
        summary.termination,
        summary.records.kept(),
        summary.elements_seen,
        summary.first_page,
        summary.last_page
    );

    if let Some(path) = &job.out {
        let n = export::write_jsonl(path, summary.records.records())?;
        println!("Wrote {} records to {}", n, path.display());
    }
    if save_db {
        let conn = db::connect(&settings.db_path)?;
        db::init_schema(&conn)?;
        let run_id = db::save_run(&conn, &job.pages.display().to_string(), &summary)?;
        println!("Saved run #{} to {}", run_id, settings.db_path);
    }
    Ok(summary)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
