pub mod csv_file;
pub mod holiday_file;

pub use csv_file::CsvFileSource;

use energy_domain::RawDataset;

use crate::transform::LoadError;

/// Where a request's raw dataset comes from.
#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    /// Short label used in logs and download names.
    fn name(&self) -> &str;

    async fn read(&self) -> Result<RawDataset, LoadError>;
}
