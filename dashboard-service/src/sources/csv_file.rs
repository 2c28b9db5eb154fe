use std::{io::Read, path::PathBuf};

use energy_domain::{RawDataset, RawValue};

use crate::{sources::DatasetSource, transform::LoadError};

/// CSV file of meter readings with a header row.
///
/// Column names and order are arbitrary; schema detection decides which
/// column carries timestamps and which carry energy.
pub struct CsvFileSource {
    name: String,
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Parse CSV text into a raw dataset; every field is classified with
/// [`RawValue::from_field`].
pub fn parse_csv<R: Read>(reader: R) -> Result<RawDataset, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| LoadError::Csv(format!("failed to read CSV headers: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
        .map(str::to_string)
        .collect();

    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(LoadError::Csv("CSV file has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LoadError::Csv(format!("failed to read CSV record: {e}")))?;
        rows.push(record.iter().map(RawValue::from_field).collect());
    }

    Ok(RawDataset::new(columns, rows))
}

#[async_trait::async_trait]
impl DatasetSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<RawDataset, LoadError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| LoadError::Unreadable {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let dataset = tokio::task::spawn_blocking(move || parse_csv(bytes.as_slice()))
            .await
            .map_err(|e| LoadError::Csv(format!("CSV parser task failed: {e}")))??;

        tracing::debug!(
            source = %self.name,
            path = %self.path.display(),
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "read CSV dataset"
        );

        Ok(dataset)
    }
}
