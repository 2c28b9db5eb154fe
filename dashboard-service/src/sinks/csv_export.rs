use std::io::{Read, Write};

use energy_domain::{AnomalyCategory, ScoredPoint};
use serde::{Deserialize, Serialize};

use crate::timestamp::{format_timestamp, parse_timestamp};

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of the anomalies download.
#[derive(Debug, Serialize, Deserialize)]
struct ExportRow {
    ts: String,
    kwh: f64,
    score: f64,
    is_anomaly: bool,
    category: AnomalyCategory,
}

impl ExportRow {
    fn from_point(p: &ScoredPoint) -> Result<Self, ExportError> {
        let ts = format_timestamp(p.ts).map_err(|e| ExportError::Timestamp(e.to_string()))?;
        Ok(Self {
            ts,
            kwh: p.kwh,
            score: p.score,
            is_anomaly: p.is_anomaly,
            category: p.category,
        })
    }

    fn into_point(self) -> Result<ScoredPoint, ExportError> {
        let ts = parse_timestamp(&self.ts).ok_or(ExportError::Timestamp(self.ts))?;
        Ok(ScoredPoint {
            ts,
            kwh: self.kwh,
            score: self.score,
            is_anomaly: self.is_anomaly,
            category: self.category,
        })
    }
}

/// Write `points` as CSV with a header row, one line per point, in the order
/// given. Callers pass the anomalies they want exported.
pub fn write_anomalies_csv<W: Write>(points: &[ScoredPoint], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);

    if points.is_empty() {
        wtr.write_record(["ts", "kwh", "score", "is_anomaly", "category"])?;
    }
    for p in points {
        wtr.serialize(ExportRow::from_point(p)?)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_anomalies_csv(points: &[ScoredPoint]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_anomalies_csv(points, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Inverse of [`write_anomalies_csv`].
pub fn read_anomalies_csv<R: Read>(reader: R) -> Result<Vec<ScoredPoint>, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<ExportRow>()
        .map(|row| row?.into_point())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> Vec<ScoredPoint> {
        vec![
            ScoredPoint {
                ts: datetime!(2024-01-02 03:00),
                kwh: 512.25,
                score: -0.123_456_789_012_345_67,
                is_anomaly: true,
                category: AnomalyCategory::HighUsage,
            },
            ScoredPoint {
                ts: datetime!(2024-01-01 22:00),
                kwh: 0.1 + 0.2,
                score: -1e-9,
                is_anomaly: true,
                category: AnomalyCategory::LowUsage,
            },
        ]
    }

    #[test]
    fn writes_header_and_one_row_per_point_in_order() {
        let text = export_anomalies_csv(&sample()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ts,kwh,score,is_anomaly,category");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-01-02 03:00:00,512.25,"));
        assert!(lines[1].ends_with(",true,HIGH_USAGE"));
        assert!(lines[2].starts_with("2024-01-01 22:00:00,"));
        assert!(lines[2].ends_with(",LOW_USAGE"));
    }

    #[test]
    fn export_round_trips() {
        let points = sample();
        let text = export_anomalies_csv(&points).unwrap();
        let parsed = read_anomalies_csv(text.as_bytes()).unwrap();
        assert_eq!(parsed, points);
    }

    #[test]
    fn empty_export_still_has_a_header() {
        let text = export_anomalies_csv(&[]).unwrap();
        assert_eq!(text.trim_end(), "ts,kwh,score,is_anomaly,category");
        assert!(read_anomalies_csv(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_timestamps_on_read() {
        let text = "ts,kwh,score,is_anomaly,category\nyesterday,1,0,false,NORMAL\n";
        assert!(matches!(
            read_anomalies_csv(text.as_bytes()),
            Err(ExportError::Timestamp(_))
        ));
    }
}
