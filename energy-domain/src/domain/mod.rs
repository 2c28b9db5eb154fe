pub mod dataset;
pub mod heatmap;
pub mod series;

pub use dataset::{DetectedSchema, LoadedDataset, LoadedRow, RawDataset, RawValue};
pub use heatmap::{HeatmapGrid, HOURS_PER_DAY, WEEKDAY_NAMES};
pub use series::{AnomalyCategory, ScoredPoint, TimeSeriesPoint};
