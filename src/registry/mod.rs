//! Field Extraction Registry: the fixed, ordered catalog of review fields and
//! the rule that pulls each one out of a review card.

pub mod rules;
pub mod tables;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::layout::Layout;
use crate::reader::ReviewElement;

pub const FIELD_COUNT: usize = 14;

/// Record schema, in output order. The discriminant is the column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Date,
    EmployeeTitle,
    Location,
    EmployeeStatus,
    ReviewTitle,
    Helpful,
    Pros,
    Cons,
    AdviceToMgmt,
    RatingOverall,
    SubRatings,
    Recommend,
    Outlook,
    CeoApproval,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Date,
        Field::EmployeeTitle,
        Field::Location,
        Field::EmployeeStatus,
        Field::ReviewTitle,
        Field::Helpful,
        Field::Pros,
        Field::Cons,
        Field::AdviceToMgmt,
        Field::RatingOverall,
        Field::SubRatings,
        Field::Recommend,
        Field::Outlook,
        Field::CeoApproval,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::EmployeeTitle => "employee_title",
            Field::Location => "location",
            Field::EmployeeStatus => "employee_status",
            Field::ReviewTitle => "review_title",
            Field::Helpful => "helpful",
            Field::Pros => "pros",
            Field::Cons => "cons",
            Field::AdviceToMgmt => "advice_to_mgmt",
            Field::RatingOverall => "rating_overall",
            Field::SubRatings => "sub_ratings",
            Field::Recommend => "recommend",
            Field::Outlook => "outlook",
            Field::CeoApproval => "ceo_approval",
        }
    }

    pub fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmploymentStatus {
    Current,
    Former,
}

/// Outcome of one recommendation icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    Yes,
    No,
    Neutral,
    Unmarked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Date(NaiveDate),
    Text(String),
    Status(EmploymentStatus),
    Count(u32),
    Rating(f32),
    SubRatings(BTreeMap<String, u8>),
    Signal(Signal),
}

/// Why a field has no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// The page simply doesn't show it for this review.
    Absent,
    /// Markup didn't have the expected shape.
    Failed(String),
}

/// Tagged result of one extraction rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Value(Value),
    Missing(Missing),
}

impl Extracted {
    pub fn text(s: impl Into<String>) -> Self {
        Extracted::Value(Value::Text(s.into()))
    }

    /// Expected absence; logged at debug.
    pub fn absent(field: Field, why: &str) -> Self {
        debug!(field = field.name(), "{}", why);
        Extracted::Missing(Missing::Absent)
    }

    /// Unexpected markup; logged at warn so layout drift shows up.
    pub fn failed(field: Field, reason: impl fmt::Display) -> Self {
        let reason = reason.to_string();
        warn!(field = field.name(), %reason, "Failed to scrape field");
        Extracted::Missing(Missing::Failed(reason))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Extracted::Value(v) => Some(v),
            Extracted::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Extracted::Missing(_))
    }
}

impl Serialize for Extracted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extracted::Value(v) => v.serialize(serializer),
            Extracted::Missing(_) => serializer.serialize_none(),
        }
    }
}

/// Everything a rule may look at: the card, its author line (resolved once
/// per record) and the selector profile.
pub struct Card<'a, E> {
    pub review: &'a E,
    pub author: &'a E,
    pub layout: &'a Layout,
}

pub type Rule<E> = fn(&Card<'_, E>) -> Extracted;

/// The rule table, in schema order.
pub fn registry<E: ReviewElement>() -> [(Field, Rule<E>); FIELD_COUNT] {
    [
        (Field::Date, rules::date::<E>),
        (Field::EmployeeTitle, rules::employee_title::<E>),
        (Field::Location, rules::location::<E>),
        (Field::EmployeeStatus, rules::employee_status::<E>),
        (Field::ReviewTitle, rules::review_title::<E>),
        (Field::Helpful, rules::helpful::<E>),
        (Field::Pros, rules::pros::<E>),
        (Field::Cons, rules::cons::<E>),
        (Field::AdviceToMgmt, rules::advice::<E>),
        (Field::RatingOverall, rules::rating_overall::<E>),
        (Field::SubRatings, rules::sub_ratings::<E>),
        (Field::Recommend, rules::recommend::<E>),
        (Field::Outlook, rules::outlook::<E>),
        (Field::CeoApproval, rules::ceo_approval::<E>),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::html::HtmlElement;

    #[test]
    fn registry_follows_schema_order() {
        let fields: Vec<Field> = registry::<HtmlElement>().iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, Field::ALL.to_vec());
        for (i, f) in Field::ALL.iter().enumerate() {
            assert_eq!(f.position(), i);
        }
    }

    #[test]
    fn missing_serializes_as_null() {
        let json = serde_json::to_string(&Extracted::Missing(Missing::Absent)).unwrap();
        assert_eq!(json, "null");
        let date = NaiveDate::from_ymd_opt(2022, 8, 12).unwrap();
        let json = serde_json::to_string(&Extracted::Value(Value::Date(date))).unwrap();
        assert_eq!(json, "\"2022-08-12\"");
        let json = serde_json::to_string(&Extracted::Value(Value::Signal(Signal::Neutral))).unwrap();
        assert_eq!(json, "\"Neutral\"");
    }
}
