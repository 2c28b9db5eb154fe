use std::{io::Write, sync::Arc};

use dashboard_service::{
    pipeline::{self, Pipeline, PipelineParams, TimeWindow},
    schema::SchemaRules,
    sinks::{export_anomalies_csv, read_anomalies_csv},
    sources::{CsvFileSource, DatasetSource},
    transform::BucketWidth,
};
use energy_domain::{AnomalyCategory, ScoredPoint};
use time::{macros::datetime, Duration};

/// Two weeks of 15-minute readings over two meters. One hour on day 9 is
/// a surge and one hour on day 4 is an outage; a few rows are malformed.
fn write_fixture(file: &mut tempfile::NamedTempFile) {
    writeln!(file, "Tanggal,PM1 kWh,PM2 kWh,keterangan").unwrap();

    let start = datetime!(2024-03-01 00:00);
    for i in 0..(14 * 24 * 4) {
        let ts = start + Duration::minutes(15 * i);
        let hour = i64::from(ts.hour());
        let day = (ts.date() - start.date()).whole_days();

        let base = 10.0 + (hour % 6) as f64 * 0.5;
        let (a, b) = match (day, hour) {
            (9, 14) => (base * 8.0, base * 8.0),
            (4, 3) => (0.0, 0.0),
            _ => (base, base / 2.0),
        };

        writeln!(
            file,
            "{}-{:02}-{:02} {:02}:{:02},{a},{b},ok",
            ts.year(),
            u8::from(ts.month()),
            ts.day(),
            ts.hour(),
            ts.minute()
        )
        .unwrap();
    }

    writeln!(file, "rusak,1,1,bad row").unwrap();
    writeln!(file, ",2,2,no timestamp").unwrap();
    writeln!(file, "2024-03-05 10:00,NA,,gap").unwrap();
    file.flush().unwrap();
}

async fn run_fixture(params: PipelineParams) -> pipeline::PipelineOutput {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_fixture(&mut file);

    let source = CsvFileSource::new("fixture", file.path());
    let pipeline = Arc::new(Pipeline::new(SchemaRules::default(), params));
    pipeline::run_source(&source, pipeline).await.unwrap()
}

#[tokio::test]
async fn csv_file_to_scored_series_and_export() {
    let params = PipelineParams {
        detector: dashboard_service::anomaly::DetectorParams {
            contamination: 0.01,
            ..Default::default()
        },
        ..PipelineParams::default()
    };
    let out = run_fixture(params).await;

    assert_eq!(out.schema.datetime_column, "Tanggal");
    assert_eq!(out.schema.energy_columns, vec!["PM1 kWh".to_string(), "PM2 kWh".to_string()]);
    assert_eq!(out.dropped_rows, 2);
    assert_eq!(out.loaded_rows, 14 * 24 * 4 + 1);

    // Hourly buckets, sorted and unique.
    assert_eq!(out.series.len(), 14 * 24);
    assert!(out.series.windows(2).all(|w| w[0].ts < w[1].ts));

    let surge = out
        .series
        .iter()
        .find(|p| p.ts == datetime!(2024-03-10 14:00))
        .unwrap();
    assert!(surge.is_anomaly);
    assert_eq!(surge.category, AnomalyCategory::HighUsage);

    let outage = out
        .series
        .iter()
        .find(|p| p.ts == datetime!(2024-03-05 03:00))
        .unwrap();
    assert_eq!(outage.kwh, 0.0);
    assert!(outage.is_anomaly);
    assert_eq!(outage.category, AnomalyCategory::LowUsage);

    assert!(out.series.iter().filter(|p| !p.is_anomaly).all(|p| p.category == AnomalyCategory::Normal));
    assert_eq!(out.heatmap.total(), out.anomalies().count() as u64);

    let flagged: Vec<ScoredPoint> = out.anomalies().copied().collect();
    let csv = export_anomalies_csv(&flagged).unwrap();
    assert_eq!(read_anomalies_csv(csv.as_bytes()).unwrap(), flagged);
}

#[tokio::test]
async fn daily_buckets_inside_a_window() {
    let params = PipelineParams {
        bucket: BucketWidth::daily(),
        window: TimeWindow {
            start: Some(datetime!(2024-03-03 00:00)),
            end: Some(datetime!(2024-03-07 00:00)),
        },
        ..PipelineParams::default()
    };
    let out = run_fixture(params).await;

    let days: Vec<_> = out.series.iter().map(|p| p.ts).collect();
    assert_eq!(
        days,
        vec![
            datetime!(2024-03-03 00:00),
            datetime!(2024-03-04 00:00),
            datetime!(2024-03-05 00:00),
            datetime!(2024-03-06 00:00),
            datetime!(2024-03-07 00:00),
        ]
    );
}

#[tokio::test]
async fn source_reports_its_name() {
    let source = CsvFileSource::new("harvested", "/no/such/dir/data.csv");
    assert_eq!(source.name(), "harvested");
    assert!(source.read().await.is_err());
}
