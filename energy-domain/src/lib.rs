pub mod domain;

pub use domain::{
    AnomalyCategory, DetectedSchema, HeatmapGrid, LoadedDataset, LoadedRow, RawDataset, RawValue,
    ScoredPoint, TimeSeriesPoint, HOURS_PER_DAY, WEEKDAY_NAMES,
};
