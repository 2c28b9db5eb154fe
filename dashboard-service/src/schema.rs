use energy_domain::{DetectedSchema, RawDataset};
use serde::Deserialize;

use crate::timestamp::parse_timestamp;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no date/time column could be identified")]
    NoDatetimeColumn,
    #[error("no energy column could be identified (kWh/energy/power)")]
    NoEnergyColumn,
}

/// How a datetime rule decides whether a column holds timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnMatcher {
    /// Case-sensitive match against known column names.
    ExactName { names: Vec<String> },
    /// Lowercased column name contains one of the keywords.
    NameContains { keywords: Vec<String> },
    /// At least `min_parsed` of the first `sample` values parse as timestamps.
    ParsesAsTimestamps { sample: usize, min_parsed: usize },
}

impl ColumnMatcher {
    fn matches(&self, dataset: &RawDataset, column: usize) -> bool {
        let Some(name) = dataset.columns().get(column) else {
            return false;
        };

        match self {
            Self::ExactName { names } => names.iter().any(|n| n == name),
            Self::NameContains { keywords } => name_contains_any(name, keywords),
            Self::ParsesAsTimestamps { sample, min_parsed } => {
                let parsed = dataset
                    .column_values(column)
                    .take(*sample)
                    .filter_map(|v| v.as_text())
                    .filter(|s| parse_timestamp(s).is_some())
                    .count();
                parsed >= *min_parsed
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatetimeRule {
    /// Lower runs first.
    pub priority: u8,
    #[serde(flatten)]
    pub matcher: ColumnMatcher,
}

/// Ordered rule table for column detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaRules {
    pub datetime_rules: Vec<DatetimeRule>,
    pub energy_keywords: Vec<String>,
    /// Use every natively numeric column when no name matches a keyword.
    pub numeric_fallback: bool,
}

impl Default for SchemaRules {
    fn default() -> Self {
        let names = [
            "Waktu", "waktu", "WAKTU", "Tanggal", "tanggal", "TANGGAL", "Date", "date", "DATE",
            "DateTime", "datetime", "DATETIME", "Timestamp", "timestamp", "TIMESTAMP", "Time",
            "time", "TIME",
        ];

        Self {
            datetime_rules: vec![
                DatetimeRule {
                    priority: 1,
                    matcher: ColumnMatcher::ExactName {
                        names: names.iter().map(|s| s.to_string()).collect(),
                    },
                },
                DatetimeRule {
                    priority: 2,
                    matcher: ColumnMatcher::NameContains {
                        keywords: to_strings(&["time", "date", "tanggal", "waktu"]),
                    },
                },
                DatetimeRule {
                    priority: 3,
                    matcher: ColumnMatcher::ParsesAsTimestamps {
                        sample: 20,
                        min_parsed: 10,
                    },
                },
            ],
            energy_keywords: to_strings(&["kwh", "energy", "konsumsi", "consumption", "usage", "power"]),
            numeric_fallback: true,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn name_contains_any(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

impl SchemaRules {
    /// Pick the datetime column: rules run by ascending priority, columns in
    /// file order, first match wins.
    pub fn detect_datetime_column(&self, dataset: &RawDataset) -> Option<String> {
        let mut rules: Vec<&DatetimeRule> = self.datetime_rules.iter().collect();
        rules.sort_by_key(|r| r.priority);

        for rule in rules {
            let found = (0..dataset.columns().len()).find(|&idx| rule.matcher.matches(dataset, idx));
            if let Some(idx) = found {
                let name = dataset.columns()[idx].clone();
                tracing::debug!(column = %name, priority = rule.priority, "datetime column detected");
                return Some(name);
            }
        }

        None
    }

    /// Energy columns by keyword, else all natively numeric columns.
    pub fn detect_energy_columns(&self, dataset: &RawDataset, datetime_column: &str) -> Vec<String> {
        let by_keyword: Vec<String> = dataset
            .columns()
            .iter()
            .filter(|c| c.as_str() != datetime_column)
            .filter(|c| name_contains_any(c, &self.energy_keywords))
            .cloned()
            .collect();

        if !by_keyword.is_empty() || !self.numeric_fallback {
            return by_keyword;
        }

        dataset
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() != datetime_column)
            .filter(|(idx, _)| dataset.is_numeric_column(*idx))
            .map(|(_, c)| c.clone())
            .collect()
    }
}

/// Identify the timestamp column and the energy columns of `dataset`.
pub fn detect(dataset: &RawDataset, rules: &SchemaRules) -> Result<DetectedSchema, SchemaError> {
    let datetime_column = rules
        .detect_datetime_column(dataset)
        .ok_or(SchemaError::NoDatetimeColumn)?;

    let energy_columns = rules.detect_energy_columns(dataset, &datetime_column);
    if energy_columns.is_empty() {
        return Err(SchemaError::NoEnergyColumn);
    }

    Ok(DetectedSchema {
        datetime_column,
        energy_columns,
    })
}
