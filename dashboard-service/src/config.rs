use serde::Deserialize;
use std::{fs, io::ErrorKind, path::PathBuf};

use crate::{
    anomaly::{is_valid_contamination, DetectorParams},
    schema::SchemaRules,
    transform::BucketWidth,
};

pub const CONFIG_ENV: &str = "DASHBOARD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "dashboard-config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Replace the port of `bind_addr`, keeping its host.
    fn with_port(&self, port: u16) -> String {
        let host = self
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(self.bind_addr.as_str());
        format!("{host}:{port}")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub default_path: PathBuf,
    pub harvested_path: PathBuf,
    pub holidays_path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_path: PathBuf::from("Data_Lengkap.csv"),
            harvested_path: PathBuf::from("API_Harvest_2023_2025.csv"),
            holidays_path: PathBuf::from("DATABASE_LIBUR.csv"),
        }
    }
}

/// Which dataset a request reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Harvested,
    Default,
}

impl SourceKind {
    /// `harvested` (also when absent) or anything else for the default file.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            None | Some("") | Some("harvested") => Self::Harvested,
            Some(_) => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harvested => "harvested",
            Self::Default => "default",
        }
    }
}

impl SourcesConfig {
    pub fn path_for(&self, kind: SourceKind) -> &PathBuf {
        match kind {
            SourceKind::Harvested => &self.harvested_path,
            SourceKind::Default => &self.default_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub contamination: f64,
    pub random_state: u64,
    pub n_estimators: usize,
    pub bucket: BucketWidth,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectorParams::default();
        Self {
            contamination: params.contamination,
            random_state: params.seed,
            n_estimators: params.n_estimators,
            bucket: BucketWidth::hourly(),
        }
    }
}

impl DetectionConfig {
    /// Parse a request-supplied contamination. Absent, unparseable or
    /// out-of-range values fall back to the configured default.
    pub fn resolve_contamination(&self, param: Option<&str>) -> f64 {
        param
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|c| is_valid_contamination(*c))
            .unwrap_or(self.contamination)
    }

    pub fn detector_params(&self, contamination: f64) -> DetectorParams {
        DetectorParams {
            contamination,
            seed: self.random_state,
            n_estimators: self.n_estimators,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub tariff_per_kwh: f64,
    pub home_table_limit: usize,
    pub anomalies_table_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            tariff_per_kwh: 1500.0,
            home_table_limit: 30,
            anomalies_table_limit: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub detection: DetectionConfig,
    pub dashboard: DashboardConfig,
    pub schema: SchemaRules,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let explicit = env::var(CONFIG_ENV).ok();
        let path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut cfg = match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| anyhow::anyhow!("invalid config file {path}: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound && explicit.is_none() => {
                tracing::info!(path = %path, "no config file found, using defaults");
                Self::default()
            }
            Err(e) => anyhow::bail!("failed to read config file {path}: {e}"),
        };

        if let Ok(port) = env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{port}': {e}"))?;
            cfg.server.bind_addr = cfg.server.with_port(port);
        }

        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnMatcher;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(cfg.sources.harvested_path, PathBuf::from("API_Harvest_2023_2025.csv"));
        assert_eq!(cfg.detection.contamination, 0.02);
        assert_eq!(cfg.detection.random_state, 42);
        assert_eq!(cfg.detection.n_estimators, 300);
        assert_eq!(cfg.detection.bucket, BucketWidth::hourly());
        assert_eq!(cfg.dashboard.tariff_per_kwh, 1500.0);
        assert_eq!(cfg.dashboard.home_table_limit, 30);
        assert_eq!(cfg.dashboard.anomalies_table_limit, 500);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [detection]
            contamination = 0.05
            bucket = "15min"

            [sources]
            default_path = "/data/readings.csv"

            [metrics]
            bind_addr = "127.0.0.1:9100"

            [[schema.datetime_rules]]
            priority = 1
            kind = "exact_name"
            names = ["Jam"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.detection.contamination, 0.05);
        assert_eq!(cfg.detection.n_estimators, 300);
        assert_eq!(cfg.detection.bucket, BucketWidth::from_seconds(900).unwrap());
        assert_eq!(cfg.sources.default_path, PathBuf::from("/data/readings.csv"));
        assert_eq!(cfg.sources.holidays_path, PathBuf::from("DATABASE_LIBUR.csv"));
        assert_eq!(cfg.metrics.unwrap().bind_addr, "127.0.0.1:9100");
        assert_eq!(cfg.schema.datetime_rules.len(), 1);
        assert!(matches!(cfg.schema.datetime_rules[0].matcher, ColumnMatcher::ExactName { .. }));
        assert!(!cfg.schema.energy_keywords.is_empty());
    }

    #[test]
    fn bad_bucket_is_rejected() {
        assert!(AppConfig::from_toml("[detection]\nbucket = \"fortnight\"\n").is_err());
    }

    #[test]
    fn contamination_falls_back_to_default() {
        let detection = DetectionConfig::default();
        assert_eq!(detection.resolve_contamination(Some("0.1")), 0.1);
        assert_eq!(detection.resolve_contamination(Some(" 0.5 ")), 0.5);
        assert_eq!(detection.resolve_contamination(Some("0.9")), 0.02);
        assert_eq!(detection.resolve_contamination(Some("0")), 0.02);
        assert_eq!(detection.resolve_contamination(Some("abc")), 0.02);
        assert_eq!(detection.resolve_contamination(None), 0.02);
    }

    #[test]
    fn source_selection() {
        let sources = SourcesConfig::default();
        assert_eq!(SourceKind::from_param(None), SourceKind::Harvested);
        assert_eq!(SourceKind::from_param(Some("harvested")), SourceKind::Harvested);
        assert_eq!(SourceKind::from_param(Some("default")), SourceKind::Default);
        assert_eq!(SourceKind::from_param(Some("anything")), SourceKind::Default);
        assert_eq!(
            sources.path_for(SourceKind::Default),
            &PathBuf::from("Data_Lengkap.csv")
        );
    }

    #[test]
    fn port_override_keeps_host() {
        let server = ServerConfig::default();
        assert_eq!(server.with_port(8080), "0.0.0.0:8080");
    }
}
