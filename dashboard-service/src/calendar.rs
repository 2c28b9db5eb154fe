use std::{collections::BTreeMap, path::Path};

use serde::Serialize;
use time::{Date, PrimitiveDateTime, Weekday};

use crate::sources::holiday_file;

/// Read-only holiday table: date → descriptive label.
///
/// Built once at start-up and shared by every request; never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayLookup {
    days: BTreeMap<Date, String>,
}

impl HolidayLookup {
    pub fn new(days: BTreeMap<Date, String>) -> Self {
        Self { days }
    }

    /// Load the holiday CSV at `path`; a missing or unreadable file yields an
    /// empty table.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "holiday table not found, using empty lookup");
            return Self::default();
        }

        match holiday_file::read_holidays(path) {
            Ok(lookup) => {
                tracing::info!(path = %path.display(), holidays = lookup.len(), "holiday table loaded");
                lookup
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to load holiday table, using empty lookup");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn label(&self, date: Date) -> Option<&str> {
        self.days.get(&date).map(String::as_str)
    }

    pub fn is_holiday(&self, date: Date) -> bool {
        self.days.contains_key(&date)
    }

    /// Holiday or weekend (Saturday/Sunday).
    pub fn is_non_workday(&self, date: Date) -> bool {
        self.is_holiday(date) || is_weekend(date)
    }

    pub fn day_status(&self, ts: PrimitiveDateTime) -> DayStatus {
        if self.is_non_workday(ts.date()) {
            DayStatus::NonWorkday
        } else {
            DayStatus::Workday
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Workday,
    NonWorkday,
}

pub fn is_weekend(date: Date) -> bool {
    matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}
