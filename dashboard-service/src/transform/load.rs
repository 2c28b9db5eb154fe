use energy_domain::{DetectedSchema, LoadedDataset, LoadedRow, RawDataset};

use crate::timestamp::parse_timestamp;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("malformed CSV: {0}")]
    Csv(String),
    #[error("column '{0}' not present in dataset")]
    MissingColumn(String),
    #[error("no row has a valid timestamp in column '{column}'")]
    NoValidRows { column: String },
}

/// Type the raw rows according to `schema`.
///
/// Rules:
/// - rows whose timestamp does not parse are dropped.
/// - energy cells that are not numeric are treated as missing; the row stays.
/// - `energy_total` sums the non-missing cells (0 when all are missing).
/// - rows are stably sorted ascending by timestamp.
pub fn load(raw: &RawDataset, schema: &DetectedSchema) -> Result<LoadedDataset, LoadError> {
    let column_index = |name: &str| {
        raw.column_index(name)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };

    let ts_idx = column_index(&schema.datetime_column)?;
    let energy_idx = schema
        .energy_columns
        .iter()
        .map(|c| column_index(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(raw.row_count());
    let mut dropped_rows = 0usize;

    for row in 0..raw.row_count() {
        let ts = match raw.cell(row, ts_idx).as_text().and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                dropped_rows += 1;
                continue;
            }
        };

        let energy: Vec<Option<f64>> = energy_idx.iter().map(|&idx| raw.cell(row, idx).as_f64()).collect();
        let energy_total: f64 = energy.iter().flatten().sum();

        rows.push(LoadedRow {
            ts,
            energy,
            energy_total,
        });
    }

    if rows.is_empty() {
        return Err(LoadError::NoValidRows {
            column: schema.datetime_column.clone(),
        });
    }

    rows.sort_by_key(|r| r.ts);

    if dropped_rows > 0 {
        metrics::counter!("loader_rows_dropped_total").increment(dropped_rows as u64);
        tracing::warn!(
            dropped_rows,
            column = %schema.datetime_column,
            "dropped rows with unparseable timestamps"
        );
    }

    Ok(LoadedDataset {
        schema: schema.clone(),
        rows,
        dropped_rows,
    })
}
