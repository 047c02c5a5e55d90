use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::info;

use crate::layout::Layout;
use crate::reader::ReviewElement;
use crate::registry::{registry, Card, Extracted, Field, Value, FIELD_COUNT};

/// One review, every schema field present (missing values included).
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    fields: Vec<(Field, Extracted)>,
}

impl ReviewRecord {
    pub fn get(&self, field: Field) -> &Extracted {
        &self.fields[field.position()].1
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &Extracted)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self.get(Field::Date).value() {
            Some(Value::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self.get(Field::ReviewTitle).value() {
            Some(Value::Text(t)) => Some(t),
            _ => None,
        }
    }

    fn matches_schema(&self) -> bool {
        self.fields.len() == FIELD_COUNT
            && self.fields.iter().map(|(f, _)| *f).eq(Field::ALL)
    }

    pub(crate) fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        for (field, value) in &self.fields {
            map.serialize_entry(field.name(), value)?;
        }
        Ok(())
    }
}

impl Serialize for ReviewRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        self.serialize_fields(&mut map)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Kept(ReviewRecord),
    Featured,
    Blocked,
}

/// Turn one card into a record, or say why it was discarded.
pub fn build<E: ReviewElement>(review: &E, layout: &Layout) -> Outcome {
    if review.contains(layout.featured_flag) {
        info!("Discarding a featured review");
        return Outcome::Featured;
    }

    // Withheld reviews render without the author line.
    let author = match review.find(layout.author_line) {
        Ok(a) => a,
        Err(_) => {
            info!("Discarding a blocked review");
            return Outcome::Blocked;
        }
    };

    let card = Card {
        review,
        author: &author,
        layout,
    };
    let fields = registry::<E>()
        .iter()
        .map(|(field, rule)| (*field, rule(&card)))
        .collect();
    let record = ReviewRecord { fields };

    assert!(
        record.matches_schema(),
        "record fields diverged from the schema"
    );
    Outcome::Kept(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LISTING_2022;
    use crate::reader::html::HtmlElement;
    use crate::registry::{EmploymentStatus, Missing};

    fn fixture_card() -> HtmlElement {
        let html = std::fs::read_to_string("tests/fixtures/review_card.html").unwrap();
        HtmlElement::parse(&html)
    }

    fn kept(outcome: Outcome) -> ReviewRecord {
        match outcome {
            Outcome::Kept(r) => r,
            other => panic!("expected a kept record, got {:?}", other),
        }
    }

    #[test]
    fn well_formed_card_fills_every_field() {
        let record = kept(build(&fixture_card(), &LISTING_2022));
        let names: Vec<Field> = record.fields().map(|(f, _)| f).collect();
        assert_eq!(names, Field::ALL.to_vec());
        for (field, value) in record.fields() {
            assert!(!value.is_missing(), "{} missing", field);
        }
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2022, 8, 12));
        assert_eq!(record.title(), Some("Great place to learn"));
        assert_eq!(
            record.get(Field::EmployeeStatus),
            &Extracted::Value(Value::Status(EmploymentStatus::Current))
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let card = fixture_card();
        let a = kept(build(&card, &LISTING_2022));
        let b = kept(build(&card, &LISTING_2022));
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn featured_card_is_discarded() {
        let card = HtmlElement::parse(
            r#"<li class="empReview"><span class="featuredFlag">Featured Review</span>
               <span class="common__EiReviewDetailsStyle__newUiJobLine">Jan 2, 2020 - Recruiter</span></li>"#,
        );
        assert_eq!(build(&card, &LISTING_2022), Outcome::Featured);
    }

    #[test]
    fn card_without_author_line_is_blocked() {
        let card = HtmlElement::parse(
            r#"<li class="empReview"><div class="gdReview"><p>This review has been removed.</p></div></li>"#,
        );
        assert_eq!(build(&card, &LISTING_2022), Outcome::Blocked);
    }

    #[test]
    fn sparse_card_keeps_full_field_set() {
        let card = HtmlElement::parse(
            r#"<li class="empReview"><span class="common__EiReviewDetailsStyle__newUiJobLine">Mar 3, 2021 - Analyst</span></li>"#,
        );
        let record = kept(build(&card, &LISTING_2022));
        assert_eq!(record.fields().count(), FIELD_COUNT);
        assert_eq!(record.get(Field::Pros), &Extracted::Missing(Missing::Absent));
        assert_eq!(record.get(Field::Helpful), &Extracted::Value(Value::Count(0)));

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), FIELD_COUNT);
        assert!(obj["pros"].is_null());
        assert_eq!(obj["date"], "2021-03-03");
    }
}
