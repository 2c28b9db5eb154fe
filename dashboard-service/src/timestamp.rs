use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};

/// Lenient timestamp parsing shared by column sniffing, the loader, the
/// holiday table and request filters.
///
/// Accepted, in order:
/// - RFC 3339 (the offset is dropped, the wall-clock reading is kept).
/// - `YYYY-MM-DD HH:MM[:SS[.fff]]`, also with a `T` separator.
/// - `YYYY/MM/DD HH:MM[:SS]` and month-first `MM/DD/YYYY HH:MM[:SS]`.
/// - date only: `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY` (midnight).
///
/// Bare numbers are never timestamps.
pub fn parse_timestamp(text: &str) -> Option<PrimitiveDateTime> {
    let s = text.trim();
    if s.is_empty() || s.parse::<f64>().is_ok() {
        return None;
    }

    if let Ok(odt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(PrimitiveDateTime::new(odt.date(), odt.time()));
    }

    let datetime_formats = [
        format_description!(
            "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second].[subsecond]"
        ),
        format_description!(
            "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second]"
        ),
        format_description!("[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]"),
        format_description!(
            "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second].[subsecond]"
        ),
        format_description!(
            "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second]"
        ),
        format_description!("[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]"),
        format_description!(
            "[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]:[second]"
        ),
        format_description!("[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]"),
        format_description!(
            "[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"
        ),
        format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = PrimitiveDateTime::parse(s, fmt) {
            return Some(dt);
        }
    }

    let date_formats = [
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
    ];
    date_formats
        .into_iter()
        .find_map(|fmt| Date::parse(s, fmt).ok())
        .map(Date::midnight)
}

/// Render as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: PrimitiveDateTime) -> Result<String, time::error::Format> {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
}

/// Render a date as the `YYYY-MM-DD` key used by the holiday table.
pub fn date_key(date: Date) -> Result<String, time::error::Format> {
    date.format(format_description!("[year]-[month]-[day]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_common_iso_layouts() {
        assert_eq!(parse_timestamp("2024-01-05 13:45:10"), Some(datetime!(2024-01-05 13:45:10)));
        assert_eq!(parse_timestamp("2024-01-05T13:45:10"), Some(datetime!(2024-01-05 13:45:10)));
        assert_eq!(parse_timestamp("2024-01-05 13:45"), Some(datetime!(2024-01-05 13:45)));
        assert_eq!(parse_timestamp("2024-1-5 3:05:00"), Some(datetime!(2024-01-05 03:05)));
        assert_eq!(
            parse_timestamp("2024-01-05 13:45:10.250"),
            Some(datetime!(2024-01-05 13:45:10.25))
        );
        assert_eq!(parse_timestamp(" 2024-01-05 "), Some(datetime!(2024-01-05 00:00)));
    }

    #[test]
    fn parses_slash_layouts_month_first() {
        assert_eq!(parse_timestamp("2024/02/03 04:05"), Some(datetime!(2024-02-03 04:05)));
        assert_eq!(parse_timestamp("02/03/2024 04:05:06"), Some(datetime!(2024-02-03 04:05:06)));
        assert_eq!(parse_timestamp("2/3/2024"), Some(datetime!(2024-02-03 00:00)));
    }

    #[test]
    fn rfc3339_keeps_wall_clock_reading() {
        assert_eq!(
            parse_timestamp("2024-03-01T10:00:00+07:00"),
            Some(datetime!(2024-03-01 10:00))
        );
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z"), Some(datetime!(2024-03-01 10:00)));
    }

    #[test]
    fn rejects_numbers_and_free_text() {
        assert_eq!(parse_timestamp("1704067200"), None);
        assert_eq!(parse_timestamp("12.5"), None);
        assert_eq!(parse_timestamp("meter-7"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2024-13-01"), None);
    }

    #[test]
    fn formats_bucket_timestamps_and_date_keys() {
        assert_eq!(
            format_timestamp(datetime!(2024-01-05 03:00)).unwrap(),
            "2024-01-05 03:00:00"
        );
        assert_eq!(date_key(date!(2024 - 08 - 17)).unwrap(), "2024-08-17");
    }
}
