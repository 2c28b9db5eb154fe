use std::{sync::Arc, time::Instant};

use energy_domain::{AnomalyCategory, DetectedSchema, HeatmapGrid, RawDataset, ScoredPoint, TimeSeriesPoint};
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::{
    anomaly::{self, DetectionError, DetectorParams},
    heatmap,
    schema::{self, SchemaError, SchemaRules},
    sources::DatasetSource,
    transform::{self, BucketWidth, LoadError},
};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),
    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Stage label used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::Load(_) => "load",
            Self::Detection(_) => "detection",
            Self::Task(_) => "task",
        }
    }
}

/// Inclusive bounds applied to the aggregated series before scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<PrimitiveDateTime>,
    pub end: Option<PrimitiveDateTime>,
}

impl TimeWindow {
    pub fn contains(&self, ts: PrimitiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }

    pub fn apply(&self, series: Vec<TimeSeriesPoint>) -> Vec<TimeSeriesPoint> {
        if self.start.is_none() && self.end.is_none() {
            return series;
        }
        series.into_iter().filter(|p| self.contains(p.ts)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineParams {
    pub bucket: BucketWidth,
    pub window: TimeWindow,
    pub detector: DetectorParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub schema: DetectedSchema,
    pub loaded_rows: usize,
    pub dropped_rows: usize,
    pub series: Vec<ScoredPoint>,
    pub heatmap: HeatmapGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_kwh: f64,
    pub anomaly_count: usize,
    pub high_usage_count: usize,
    pub low_usage_count: usize,
    pub estimated_cost: f64,
}

impl PipelineOutput {
    pub fn anomalies(&self) -> impl Iterator<Item = &ScoredPoint> + '_ {
        self.series.iter().filter(|p| p.is_anomaly)
    }

    pub fn summary(&self, tariff_per_kwh: f64) -> DashboardSummary {
        let total_kwh: f64 = self.series.iter().map(|p| p.kwh).sum();
        let count = |category: AnomalyCategory| self.anomalies().filter(|p| p.category == category).count();

        DashboardSummary {
            total_kwh,
            anomaly_count: self.anomalies().count(),
            high_usage_count: count(AnomalyCategory::HighUsage),
            low_usage_count: count(AnomalyCategory::LowUsage),
            estimated_cost: total_kwh * tariff_per_kwh,
        }
    }

    pub fn latest_anomalies(&self, limit: usize) -> Vec<ScoredPoint> {
        latest_anomalies(&self.series, limit)
    }
}

/// Anomalies only, newest first, at most `limit` of them.
pub fn latest_anomalies(series: &[ScoredPoint], limit: usize) -> Vec<ScoredPoint> {
    let mut anomalies: Vec<ScoredPoint> = series.iter().filter(|p| p.is_anomaly).copied().collect();
    anomalies.sort_by(|a, b| b.ts.cmp(&a.ts));
    anomalies.truncate(limit);
    anomalies
}

/// One request's worth of processing: schema detection, loading,
/// bucketing, window filter, scoring and the heatmap.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub rules: SchemaRules,
    pub params: PipelineParams,
}

impl Pipeline {
    pub fn new(rules: SchemaRules, params: PipelineParams) -> Self {
        Self { rules, params }
    }

    pub fn run(&self, raw: &RawDataset) -> Result<PipelineOutput, PipelineError> {
        run(raw, &self.rules, &self.params)
    }
}

/// Detect the schema, load, bucket, filter to the window, score and
/// summarise `raw`. Nothing is kept between calls.
pub fn run(raw: &RawDataset, rules: &SchemaRules, params: &PipelineParams) -> Result<PipelineOutput, PipelineError> {
    let started = Instant::now();
    metrics::counter!("pipeline_runs_total").increment(1);

    let result = run_stages(raw, rules, params);

    metrics::histogram!("pipeline_duration_seconds").record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::counter!("pipeline_failures_total", "stage" => e.stage()).increment(1);
        tracing::warn!(error = %e, stage = e.stage(), "pipeline run failed");
    }

    result
}

fn run_stages(raw: &RawDataset, rules: &SchemaRules, params: &PipelineParams) -> Result<PipelineOutput, PipelineError> {
    let schema = schema::detect(raw, rules)?;
    let loaded = transform::load(raw, &schema)?;
    let series = transform::aggregate(&loaded, params.bucket);
    let series = params.window.apply(series);
    let scored = anomaly::detect_with(&series, &params.detector)?;
    let heatmap = heatmap::summarize(&scored);

    tracing::info!(
        datetime_column = %schema.datetime_column,
        energy_columns = schema.energy_columns.len(),
        rows = loaded.rows.len(),
        dropped_rows = loaded.dropped_rows,
        buckets = scored.len(),
        anomalies = heatmap.total(),
        "pipeline run complete"
    );

    Ok(PipelineOutput {
        loaded_rows: loaded.rows.len(),
        dropped_rows: loaded.dropped_rows,
        schema,
        series: scored,
        heatmap,
    })
}

/// Read `source` and run `pipeline` over it on the blocking pool.
pub async fn run_source<S>(source: &S, pipeline: Arc<Pipeline>) -> Result<PipelineOutput, PipelineError>
where
    S: DatasetSource + ?Sized,
{
    let raw = source.read().await.map_err(|e| {
        metrics::counter!("pipeline_failures_total", "stage" => "load").increment(1);
        tracing::error!(error = %e, source = source.name(), "failed to read dataset");
        PipelineError::Load(e)
    })?;

    tokio::task::spawn_blocking(move || pipeline.run(&raw))
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
}
