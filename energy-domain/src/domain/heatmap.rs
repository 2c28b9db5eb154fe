use time::{PrimitiveDateTime, Weekday};

pub const HOURS_PER_DAY: usize = 24;

/// Canonical row order of the heatmap, independent of locale.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Anomaly counts by weekday (rows, Sunday first) and hour of day (columns).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeatmapGrid {
    counts: [[u32; HOURS_PER_DAY]; 7],
}

impl HeatmapGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event at the weekday/hour of `ts`.
    pub fn record(&mut self, ts: PrimitiveDateTime) {
        let row = weekday_row(ts.weekday());
        let col = usize::from(ts.hour());
        self.counts[row][col] += 1;
    }

    pub fn get(&self, weekday: Weekday, hour: u8) -> u32 {
        self.counts[weekday_row(weekday)]
            .get(usize::from(hour))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .flat_map(|row| row.iter())
            .map(|&c| u64::from(c))
            .sum()
    }

    pub fn counts(&self) -> &[[u32; HOURS_PER_DAY]; 7] {
        &self.counts
    }

    /// Rows paired with their weekday label, Sunday first.
    pub fn labelled_rows(&self) -> impl Iterator<Item = (&'static str, &[u32; HOURS_PER_DAY])> + '_ {
        WEEKDAY_NAMES.iter().copied().zip(self.counts.iter())
    }
}

fn weekday_row(day: Weekday) -> usize {
    usize::from(day.number_days_from_sunday())
}
