use std::fmt;

use chrono::NaiveDate;
use tracing::info;

/// At most one of these is configured per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Listing sorted newest first; stop once a page reaches back past this.
    Min(NaiveDate),
    /// Listing sorted oldest first; stop once a page runs past this.
    Max(NaiveDate),
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Min(d) => write!(f, "min date {}", d),
            DateBound::Max(d) => write!(f, "max date {}", d),
        }
    }
}

/// Sticky stop flag fed one page of dates at a time.
#[derive(Debug, Clone)]
pub struct DateBoundaryFilter {
    bound: Option<DateBound>,
    reached: bool,
}

impl DateBoundaryFilter {
    pub fn new(bound: Option<DateBound>) -> Self {
        Self {
            bound,
            reached: false,
        }
    }

    /// Check one page's dates. Returns the flag after the check.
    pub fn observe(&mut self, dates: &[NaiveDate]) -> bool {
        if self.reached {
            return true;
        }
        let crossed = match self.bound {
            Some(DateBound::Max(max)) => dates.iter().max().is_some_and(|d| *d > max),
            Some(DateBound::Min(min)) => dates.iter().min().is_some_and(|d| *d < min),
            None => false,
        };
        if crossed {
            if let Some(bound) = self.bound {
                info!(%bound, "Date limit reached, ending process");
            }
            self.reached = true;
        }
        self.reached
    }

    pub fn reached(&self) -> bool {
        self.reached
    }
}
