use anyhow::{bail, Result};
use dashboard_service::{
    anomaly::is_valid_contamination,
    config::AppConfig,
    observability,
    pipeline::{self, Pipeline, PipelineParams},
    sinks::write_anomalies_csv,
    sources::CsvFileSource,
};
use energy_domain::ScoredPoint;
use std::{env, io, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: detect_anomalies <csv_path> [contamination]");
    }
    let file_path = &args[1];

    // Load configuration (DASHBOARD_CONFIG may point at a custom file).
    let cfg = AppConfig::load()?;
    let contamination = match args.get(2) {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(c) if is_valid_contamination(c) => c,
            _ => bail!("contamination must be a number in (0, 0.5], got '{raw}'"),
        },
        None => cfg.detection.contamination,
    };

    let source = CsvFileSource::new("cli", file_path.as_str());
    let pipeline = Pipeline::new(
        cfg.schema.clone(),
        PipelineParams {
            bucket: cfg.detection.bucket,
            detector: cfg.detection.detector_params(contamination),
            ..PipelineParams::default()
        },
    );

    let output = pipeline::run_source(&source, Arc::new(pipeline)).await?;
    let flagged: Vec<ScoredPoint> = output.anomalies().copied().collect();

    let summary = output.summary(cfg.dashboard.tariff_per_kwh);
    tracing::info!(
        path = %file_path,
        datetime_column = %output.schema.datetime_column,
        buckets = output.series.len(),
        anomalies = summary.anomaly_count,
        high_usage = summary.high_usage_count,
        low_usage = summary.low_usage_count,
        total_kwh = summary.total_kwh,
        "anomaly detection finished"
    );

    write_anomalies_csv(&flagged, io::stdout().lock())?;

    Ok(())
}
