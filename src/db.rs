use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};

use crate::accumulator::IndexedRecord;
use crate::driver::{RunSummary, Termination};
use crate::registry::{Extracted, Field};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id            INTEGER PRIMARY KEY,
            source        TEXT NOT NULL,
            termination   TEXT NOT NULL,
            detail        TEXT,
            first_page    INTEGER NOT NULL,
            last_page     INTEGER NOT NULL,
            elements_seen INTEGER NOT NULL,
            kept          INTEGER NOT NULL,
            finished_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id              INTEGER PRIMARY KEY,
            run_id          INTEGER NOT NULL REFERENCES runs(id),
            source_index    INTEGER NOT NULL,
            date            TEXT,
            employee_title  TEXT,
            location        TEXT,
            employee_status TEXT CHECK(employee_status IN ('Current','Former')),
            review_title    TEXT,
            helpful         INTEGER,
            pros            TEXT,
            cons            TEXT,
            advice_to_mgmt  TEXT,
            rating_overall  REAL,
            sub_ratings     TEXT,
            recommend       TEXT,
            outlook         TEXT,
            ceo_approval    TEXT,
            UNIQUE(run_id, source_index)
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_run ON reviews(run_id);
        CREATE INDEX IF NOT EXISTS idx_reviews_date ON reviews(date);
        ",
    )?;
    Ok(())
}

/// Store one finished run and its records. Returns the run id.
pub fn save_run(conn: &Connection, source: &str, summary: &RunSummary) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let detail = match &summary.termination {
        Termination::NavigationFailure(e) => Some(e.clone()),
        _ => None,
    };
    tx.execute(
        "INSERT INTO runs (source, termination, detail, first_page, last_page, elements_seen, kept)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            source,
            summary.termination.label(),
            detail,
            summary.first_page,
            summary.last_page,
            summary.elements_seen as i64,
            summary.records.kept() as i64,
        ],
    )?;
    let run_id = tx.last_insert_rowid();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO reviews
             (run_id, source_index, date, employee_title, location, employee_status,
              review_title, helpful, pros, cons, advice_to_mgmt, rating_overall,
              sub_ratings, recommend, outlook, ceo_approval)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        )?;
        for row in summary.records.records() {
            stmt.execute(rusqlite::params_from_iter(review_params(run_id, row)?))?;
        }
    }
    tx.commit()?;
    Ok(run_id)
}

fn review_params(run_id: i64, row: &IndexedRecord) -> Result<Vec<SqlValue>> {
    let mut params = Vec::with_capacity(Field::ALL.len() + 2);
    params.push(SqlValue::Integer(run_id));
    params.push(SqlValue::Integer(row.source_index as i64));
    for (_, value) in row.record.fields() {
        params.push(column_value(value)?);
    }
    Ok(params)
}

// Missing → NULL, sub-ratings as a JSON object.
fn column_value(value: &Extracted) -> Result<SqlValue> {
    Ok(match serde_json::to_value(value)? {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(b as i64),
        serde_json::Value::String(s) => SqlValue::Text(s),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        other => SqlValue::Text(other.to_string()),
    })
}

pub struct Stats {
    pub runs: usize,
    pub reviews: usize,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub avg_rating: Option<f64>,
    pub last_termination: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let reviews: usize = conn.query_row("SELECT COUNT(*) FROM reviews", [], |r| r.get(0))?;
    let (earliest, latest, avg_rating) = conn.query_row(
        "SELECT MIN(date), MAX(date), AVG(rating_overall) FROM reviews",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    let last_termination = conn
        .query_row(
            "SELECT termination FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(Stats {
        runs,
        reviews,
        earliest,
        latest,
        avg_rating,
        last_termination,
    })
}
