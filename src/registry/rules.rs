use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use super::{tables, Card, EmploymentStatus, Extracted, Field, Value};
use crate::reader::{ReaderResult, ReviewElement};

pub const ANONYMOUS: &str = "Anonymous";

static LEADING_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());
static LEADING_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y"];

pub fn parse_review_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Author line reads "<date> - <job title> in <location>".
pub fn date<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let line = card.author.text();
    let head = line.split('-').next().unwrap_or_default().trim();
    match parse_review_date(head) {
        Some(d) => Extracted::Value(Value::Date(d)),
        None => Extracted::failed(Field::Date, format!("unparseable date '{}'", head)),
    }
}

pub fn employee_title<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    if card.review.text().contains(card.layout.anonymous_marker) {
        return Extracted::text(ANONYMOUS);
    }

    let detail = match card.author.find(card.layout.author_detail) {
        Ok(d) => d.text(),
        Err(e) => return Extracted::failed(Field::EmployeeTitle, e),
    };
    let title = detail
        .split_once('-')
        .map(|(_, rest)| rest.split(" in ").next().unwrap_or_default().trim())
        .unwrap_or_default();
    if title.is_empty() {
        Extracted::failed(Field::EmployeeTitle, format!("no title in '{}'", detail))
    } else {
        Extracted::text(title)
    }
}

pub fn location<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let line = card.author.text();
    match line.split_once(" in ") {
        Some((_, loc)) if !loc.trim().is_empty() => Extracted::text(loc.trim()),
        Some(_) => Extracted::failed(Field::Location, "empty location"),
        None => Extracted::absent(Field::Location, "No location shown"),
    }
}

pub fn employee_status<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let status = match card.review.find(card.layout.status_line) {
        Ok(el) => el.text(),
        Err(e) => return Extracted::failed(Field::EmployeeStatus, e),
    };
    if status.starts_with("Current") {
        Extracted::Value(Value::Status(EmploymentStatus::Current))
    } else if status.starts_with("Former") {
        Extracted::Value(Value::Status(EmploymentStatus::Former))
    } else {
        Extracted::failed(Field::EmployeeStatus, format!("unrecognized status '{}'", status))
    }
}

pub fn review_title<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    match card.review.find(card.layout.review_title) {
        Ok(el) => {
            let text = el.text();
            let title = text.trim_matches('"').trim();
            if title.is_empty() {
                Extracted::failed(Field::ReviewTitle, "empty review title")
            } else {
                Extracted::text(title)
            }
        }
        Err(e) => Extracted::failed(Field::ReviewTitle, e),
    }
}

/// Leading numeral of "12 people found this review helpful". No phrase means
/// no votes, so this never reports missing.
pub fn helpful<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let phrase = card
        .review
        .find(card.layout.review_body)
        .and_then(|body| body.find(card.layout.helpful));
    let count = match phrase {
        Ok(el) => LEADING_INT_RE
            .find(&el.text())
            .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok())
            .unwrap_or(0),
        Err(e) => {
            debug!(error = %e, "No helpful-vote phrase");
            0
        }
    };
    Extracted::Value(Value::Count(count))
}

pub fn pros<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    body_text(card, Field::Pros, card.layout.pros)
}

pub fn cons<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    body_text(card, Field::Cons, card.layout.cons)
}

pub fn advice<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    body_text(card, Field::AdviceToMgmt, card.layout.advice)
}

fn body_text<E: ReviewElement>(card: &Card<'_, E>, field: Field, selector: &str) -> Extracted {
    let section = card
        .review
        .find(card.layout.review_body)
        .and_then(|body| body.find(selector));
    match section {
        Ok(el) => {
            let text = el.text();
            if text.is_empty() {
                Extracted::absent(field, "Empty section")
            } else {
                Extracted::text(text)
            }
        }
        Err(e) => from_query_error(field, e),
    }
}

pub fn rating_overall<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let text = match card.review.find(card.layout.overall_rating) {
        Ok(el) => el.text(),
        Err(e) => return from_query_error(Field::RatingOverall, e),
    };
    match LEADING_NUM_RE
        .find(&text)
        .and_then(|m| m.as_str().parse::<f32>().ok())
    {
        Some(r) => Extracted::Value(Value::Rating(r)),
        None => Extracted::failed(Field::RatingOverall, format!("unparseable rating '{}'", text)),
    }
}

/// Category label → star count. A row whose star token is unknown is
/// dropped on its own; a row with the wrong shape fails the whole field.
pub fn sub_ratings<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    let rows = match card.review.find_all(card.layout.sub_rating_rows) {
        Ok(rows) => rows,
        Err(e) => return Extracted::failed(Field::SubRatings, e),
    };
    if rows.is_empty() {
        debug!("No subratings");
        return Extracted::Value(Value::SubRatings(BTreeMap::new()));
    }

    let mut ratings = BTreeMap::new();
    for row in &rows {
        let (label, token) = match read_sub_rating_row(card, row) {
            Ok(pair) => pair,
            Err(e) => return Extracted::failed(Field::SubRatings, e),
        };
        match tables::stars(&token) {
            Some(score) => {
                ratings.insert(label, score);
            }
            None => warn!(
                category = %label,
                %token,
                tables = tables::TABLE_VERSION,
                "Unknown star token, skipping category"
            ),
        }
    }
    Extracted::Value(Value::SubRatings(ratings))
}

fn read_sub_rating_row<E: ReviewElement>(card: &Card<'_, E>, row: &E) -> ReaderResult<(String, String)> {
    let stars = row.find(card.layout.sub_rating_stars)?;
    let token = stars
        .attr("class")
        .and_then(|c| c.split_whitespace().next().map(str::to_string))
        .unwrap_or_default();
    let label = row.find(card.layout.sub_rating_label)?.text();
    Ok((label, token))
}

pub fn recommend<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    signal(card, Field::Recommend, "Recommend")
}

pub fn outlook<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    signal(card, Field::Outlook, "Outlook")
}

pub fn ceo_approval<E: ReviewElement>(card: &Card<'_, E>) -> Extracted {
    signal(card, Field::CeoApproval, "CEO")
}

/// Find the recommendation item labelled `label` and map its icon's second
/// class token through the icon table.
fn signal<E: ReviewElement>(card: &Card<'_, E>, field: Field, label: &str) -> Extracted {
    let items = match card.review.find_all(card.layout.recommend_items) {
        Ok(items) => items,
        Err(e) => return Extracted::failed(field, e),
    };
    let Some(item) = items.iter().find(|i| i.text().contains(label)) else {
        return Extracted::absent(field, "No recommendation signal shown");
    };

    let token = match item.find(card.layout.recommend_icon) {
        Ok(icon) => icon
            .attr("class")
            .and_then(|c| c.split_whitespace().nth(1).map(str::to_string))
            .unwrap_or_default(),
        Err(e) => return Extracted::failed(field, e),
    };
    match tables::signal(&token) {
        Some(s) => Extracted::Value(Value::Signal(s)),
        None => Extracted::failed(
            field,
            format!("unknown icon token '{}' (tables {})", token, tables::TABLE_VERSION),
        ),
    }
}

fn from_query_error(field: Field, e: crate::reader::ReaderError) -> Extracted {
    if e.is_not_found() {
        Extracted::absent(field, "Not shown")
    } else {
        Extracted::failed(field, e)
    }
}
