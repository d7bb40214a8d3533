//! Shared storage helper functions.
//!
//! Column encodings used by the SQLite backend. Decimals, dates, timestamps
//! and UUIDs are stored as TEXT so that amounts keep their exact scale.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::interfaces::ledger_store::{Result, StorageError};

/// Fixed-width RFC3339 so that TEXT ordering matches time ordering.
pub fn timestamp_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(table: &'static str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(table, format!("timestamp {text:?}: {e}")))
}

pub fn date_to_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(table: &'static str, text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| StorageError::corrupt(table, format!("date {text:?}: {e}")))
}

pub fn parse_optional_date(table: &'static str, text: Option<String>) -> Result<Option<NaiveDate>> {
    text.map(|t| parse_date(table, &t)).transpose()
}

pub fn parse_decimal(table: &'static str, text: &str) -> Result<Decimal> {
    text.parse::<Decimal>()
        .map_err(|e| StorageError::corrupt(table, format!("decimal {text:?}: {e}")))
}

pub fn parse_uuid(table: &'static str, text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| StorageError::corrupt(table, format!("uuid {text:?}: {e}")))
}

/// Narrow an INTEGER column, reporting out-of-range values as corruption.
pub fn narrow<T, U>(table: &'static str, column: &str, value: T) -> Result<U>
where
    T: Copy + std::fmt::Display,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| StorageError::corrupt(table, format!("{column} out of range: {value}")))
}

/// True when the database rejected a write on a UNIQUE constraint.
#[cfg(feature = "sqlite")]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let later = earlier + chrono::Duration::nanoseconds(1);
        let (a, b) = (timestamp_to_text(earlier), timestamp_to_text(later));
        assert!(a < b);
        assert_eq!(a.len(), b.len());
        assert_eq!(parse_timestamp("t", &a).unwrap(), earlier);
    }

    #[test]
    fn test_date_round_trip() {
        let d = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        assert_eq!(date_to_text(d), "2025-12-15");
        assert_eq!(parse_date("t", "2025-12-15").unwrap(), d);
        assert!(matches!(parse_date("t", "15/12/2025"), Err(StorageError::Corrupt { table: "t", .. })));
    }

    #[test]
    fn test_decimal_keeps_scale() {
        let d = parse_decimal("t", "500.00").unwrap();
        assert_eq!(d.to_string(), "500.00");
        assert!(parse_decimal("t", "five").is_err());
    }

    #[test]
    fn test_narrow() {
        let ok: u8 = narrow("t", "step", 3i64).unwrap();
        assert_eq!(ok, 3);
        assert!(narrow::<i64, u8>("t", "step", 300).is_err());
    }
}
