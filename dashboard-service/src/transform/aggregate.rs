use std::{fmt, str::FromStr};

use energy_domain::{LoadedDataset, TimeSeriesPoint};
use serde::Deserialize;
use time::{macros::datetime, Duration, PrimitiveDateTime};

const GRID_ANCHOR: PrimitiveDateTime = datetime!(1970-01-01 00:00);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketWidthError {
    #[error("bucket width must be a positive number of seconds, got {0}s")]
    NonPositive(i64),
    #[error("unrecognised bucket width '{0}' (expected e.g. 1h, 15min, 1d)")]
    Unrecognised(String),
}

/// Fixed bucket width, aligned to a grid anchored at 1970-01-01 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct BucketWidth {
    seconds: i64,
}

impl BucketWidth {
    pub fn from_seconds(seconds: i64) -> Result<Self, BucketWidthError> {
        if seconds <= 0 {
            return Err(BucketWidthError::NonPositive(seconds));
        }
        Ok(Self { seconds })
    }

    pub fn hourly() -> Self {
        Self { seconds: 3_600 }
    }

    pub fn daily() -> Self {
        Self { seconds: 86_400 }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Start of the bucket containing `ts`.
    pub fn floor(&self, ts: PrimitiveDateTime) -> PrimitiveDateTime {
        let since_anchor = ts - GRID_ANCHOR;
        let mut secs = since_anchor.whole_seconds();
        if since_anchor.subsec_nanoseconds() < 0 {
            secs -= 1;
        }
        let start = secs.div_euclid(self.seconds) * self.seconds;
        GRID_ANCHOR + Duration::seconds(start)
    }
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self::hourly()
    }
}

impl FromStr for BucketWidth {
    type Err = BucketWidthError;

    /// Accepts `<n><unit>` with units s, min/T, h/H, d/D; a bare unit means 1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count, unit) = trimmed.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| BucketWidthError::Unrecognised(s.to_string()))?
        };

        let unit_seconds = match unit.trim() {
            "s" | "S" | "sec" => 1,
            "min" | "m" | "T" => 60,
            "h" | "H" | "hour" => 3_600,
            "d" | "D" | "day" => 86_400,
            _ => return Err(BucketWidthError::Unrecognised(s.to_string())),
        };

        let seconds = count
            .checked_mul(unit_seconds)
            .ok_or_else(|| BucketWidthError::Unrecognised(s.to_string()))?;
        Self::from_seconds(seconds)
    }
}

impl TryFrom<String> for BucketWidth {
    type Error = BucketWidthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds {
            s if s % 86_400 == 0 => write!(f, "{}d", s / 86_400),
            s if s % 3_600 == 0 => write!(f, "{}h", s / 3_600),
            s if s % 60 == 0 => write!(f, "{}min", s / 60),
            s => write!(f, "{s}s"),
        }
    }
}

/// Sum `energy_total` per bucket.
///
/// Only buckets with at least one contributing row are emitted; empty
/// buckets are omitted rather than zero-filled, so consumers must not
/// assume a uniform grid. Output is ascending by bucket start.
pub fn aggregate(loaded: &LoadedDataset, width: BucketWidth) -> Vec<TimeSeriesPoint> {
    let mut series: Vec<TimeSeriesPoint> = Vec::new();

    // Rows are sorted, so each bucket is a contiguous run.
    for row in &loaded.rows {
        let bucket = width.floor(row.ts);
        match series.last_mut() {
            Some(last) if last.ts == bucket => last.kwh += row.energy_total,
            _ => series.push(TimeSeriesPoint {
                ts: bucket,
                kwh: row.energy_total,
            }),
        }
    }

    tracing::debug!(
        rows = loaded.rows.len(),
        buckets = series.len(),
        width = %width,
        "aggregated series"
    );

    series
}
