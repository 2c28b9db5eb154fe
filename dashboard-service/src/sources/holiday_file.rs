use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use crate::{calendar::HolidayLookup, timestamp::parse_timestamp, transform::LoadError};

const DATE_COLUMNS: &[&str] = &["tanggal", "Tanggal"];
const LABEL_COLUMNS: &[&str] = &["libur apa", "Libur apa", "keterangan", "Keterangan", "nama", "Nama"];
const DEFAULT_LABEL: &str = "Libur";

/// Holiday table CSV.
///
/// Expected header columns (by name):
/// - tanggal / Tanggal (date; rows that do not parse are skipped)
/// - one optional label column (see `LABEL_COLUMNS`)
///
/// A file without a date column gives an empty lookup.
pub fn read_holidays(path: &Path) -> Result<HolidayLookup, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_holidays(file)
}

pub fn parse_holidays<R: Read>(reader: R) -> Result<HolidayLookup, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| LoadError::Csv(format!("failed to read holiday headers: {e}")))?
        .clone();

    let position = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|name| headers.iter().position(|h| h.trim_start_matches('\u{feff}') == *name))
    };

    let Some(date_idx) = position(DATE_COLUMNS) else {
        tracing::warn!("holiday table has no tanggal column");
        return Ok(HolidayLookup::default());
    };
    let label_idx = position(LABEL_COLUMNS);

    let mut days = BTreeMap::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LoadError::Csv(format!("failed to read holiday record: {e}")))?;

        let Some(ts) = record.get(date_idx).and_then(parse_timestamp) else {
            continue;
        };

        let label = label_idx
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LABEL);

        days.insert(ts.date(), label.to_string());
    }

    Ok(HolidayLookup::new(days))
}
