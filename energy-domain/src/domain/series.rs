use time::PrimitiveDateTime;

#[cfg(feature = "serde")]
time::serde::format_description!(bucket_ts, PrimitiveDateTime, "[year]-[month]-[day] [hour]:[minute]:[second]");

/// Energy summed over one time bucket; `ts` is the bucket start.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSeriesPoint {
    #[cfg_attr(feature = "serde", serde(with = "bucket_ts"))]
    pub ts: PrimitiveDateTime,
    pub kwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum AnomalyCategory {
    #[default]
    Normal,
    HighUsage,
    LowUsage,
}

impl AnomalyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::HighUsage => "HIGH_USAGE",
            Self::LowUsage => "LOW_USAGE",
        }
    }
}

impl std::fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket after anomaly scoring.
///
/// `score` is the forest decision value: negative means anomalous, and lower
/// is more anomalous.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredPoint {
    #[cfg_attr(feature = "serde", serde(with = "bucket_ts"))]
    pub ts: PrimitiveDateTime,
    pub kwh: f64,
    pub score: f64,
    pub is_anomaly: bool,
    pub category: AnomalyCategory,
}

impl ScoredPoint {
    pub fn point(&self) -> TimeSeriesPoint {
        TimeSeriesPoint {
            ts: self.ts,
            kwh: self.kwh,
        }
    }
}
