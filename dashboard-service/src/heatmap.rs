use energy_domain::{HeatmapGrid, ScoredPoint};

/// Count anomalous points by weekday and hour of day.
///
/// The grid is always 7×24; an input without anomalies gives all zeros.
pub fn summarize(scored: &[ScoredPoint]) -> HeatmapGrid {
    let mut grid = HeatmapGrid::new();
    for p in scored.iter().filter(|p| p.is_anomaly) {
        grid.record(p.ts);
    }
    grid
}
