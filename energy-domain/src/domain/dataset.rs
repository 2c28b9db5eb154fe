use time::PrimitiveDateTime;

/// Cell tokens read as missing, in addition to the empty string.
const MISSING_TOKENS: &[&str] = &[
    "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "-", "#N/A",
];

static MISSING: RawValue = RawValue::Missing;

/// A single cell of a raw tabular dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Classify a textual field as read from a CSV file.
    ///
    /// Rules:
    /// - empty or a known NA token is `Missing`.
    /// - a finite float is `Number`.
    /// - anything else is kept verbatim as `Text`.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed) {
            return Self::Missing;
        }

        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Number(v),
            _ => Self::Text(field.to_string()),
        }
    }

    /// Numeric coercion: unparseable text becomes `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Missing => None,
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<&str> for RawValue {
    fn from(field: &str) -> Self {
        Self::from_field(field)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Rows of raw cells under named columns, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawDataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `(row, column)`; ragged rows read as missing past their end.
    pub fn cell(&self, row: usize, column: usize) -> &RawValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&MISSING)
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &RawValue> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, column))
    }

    /// A column is natively numeric when none of its cells holds text.
    pub fn is_numeric_column(&self, column: usize) -> bool {
        column < self.columns.len() && self.column_values(column).all(|v| v.as_text().is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedSchema {
    pub datetime_column: String,
    pub energy_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRow {
    pub ts: PrimitiveDateTime,
    /// One entry per energy column, in schema order; `None` when the cell was not numeric.
    pub energy: Vec<Option<f64>>,
    pub energy_total: f64,
}

/// Typed rows sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub schema: DetectedSchema,
    pub rows: Vec<LoadedRow>,
    /// Rows discarded because their timestamp did not parse.
    pub dropped_rows: usize,
}

impl LoadedDataset {
    pub fn first_ts(&self) -> Option<PrimitiveDateTime> {
        self.rows.first().map(|r| r.ts)
    }

    pub fn last_ts(&self) -> Option<PrimitiveDateTime> {
        self.rows.last().map(|r| r.ts)
    }
}
