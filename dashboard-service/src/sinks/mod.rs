pub mod csv_export;

pub use csv_export::{export_anomalies_csv, read_anomalies_csv, write_anomalies_csv, ExportError};
