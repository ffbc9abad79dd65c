use std::collections::HashMap;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::ApiError;

/// Mutating requests arrive as a flat mapping of field names to string values.
pub type FlatRequest = HashMap<String, String>;

pub const DATE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Required-field presence check. Runs before any other work, including token
/// resolution, so a malformed request never touches auth or storage.
pub fn require(req: &FlatRequest, fields: &'static [&'static str]) -> Result<(), ApiError> {
    if fields.iter().all(|f| req.contains_key(*f)) {
        Ok(())
    } else {
        Err(ApiError::BadRequest)
    }
}

pub fn field<'a>(req: &'a FlatRequest, name: &str) -> Option<&'a str> {
    req.get(name).map(String::as_str)
}

pub fn parse_id(req: &FlatRequest, name: &str) -> Result<i32, ApiError> {
    field(req, name)
        .and_then(|v| v.trim().parse::<i32>().ok())
        .ok_or(ApiError::BadRequest)
}

/// Parses a "YYYY-MM-DD HH:MM" timestamp, interpreted as UTC.
pub fn parse_date_time(raw: &str) -> Result<OffsetDateTime, ApiError> {
    PrimitiveDateTime::parse(raw.trim(), DATE_TIME_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| ApiError::BadRequest)
}

/// Parses a "YYYY-MM-DD" date as UTC midnight (used for listing bounds).
pub fn parse_date(raw: &str) -> Result<OffsetDateTime, ApiError> {
    time::Date::parse(raw.trim(), DATE_FORMAT)
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| ApiError::BadRequest)
}

/// Clamps a page window to non-negative values; Postgres rejects a negative
/// LIMIT or OFFSET outright, and a caller sending one gets an empty page,
/// not a server failure.
pub fn page_window(limit: i64, offset: i64) -> (i64, i64) {
    (limit.max(0), offset.max(0))
}

/// Splits a comma-separated sphere list, trimming blanks. Order is preserved:
/// bulk association honors the order supplied by the caller.
pub fn split_spheres(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn request(pairs: &[(&str, &str)]) -> FlatRequest {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn require_passes_when_all_fields_present() {
        let req = request(&[("name", "Engineer"), ("article", "..."), ("token", "t")]);
        assert!(require(&req, &["name", "article", "token"]).is_ok());
    }

    #[test]
    fn require_fails_on_any_missing_field() {
        let req = request(&[("name", "Engineer")]);
        let err = require(&req, &["name", "token"]).unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        let req = request(&[("id", "12x")]);
        assert!(parse_id(&req, "id").is_err());
        let req = request(&[("id", " 7 ")]);
        assert_eq!(parse_id(&req, "id").unwrap(), 7);
    }

    #[test]
    fn date_time_parses_as_utc() {
        let dt = parse_date_time("2021-01-01 18:30").unwrap();
        assert_eq!(dt, datetime!(2021-01-01 18:30 UTC));
        assert!(parse_date_time("01.01.2021").is_err());
    }

    #[test]
    fn date_parses_to_midnight() {
        let d = parse_date("2020-06-01").unwrap();
        assert_eq!(d, datetime!(2020-06-01 00:00 UTC));
    }

    #[test]
    fn page_window_clamps_negative_values() {
        assert_eq!(page_window(-1, -5), (0, 0));
        assert_eq!(page_window(10, 0), (10, 0));
        assert_eq!(page_window(0, 3), (0, 3));
    }

    #[test]
    fn sphere_list_splits_and_trims() {
        assert_eq!(
            split_spheres("IT, Science ,,Art"),
            vec!["IT".to_string(), "Science".into(), "Art".into()]
        );
        assert!(split_spheres("  ").is_empty());
    }

    #[test]
    fn sphere_list_keeps_duplicates_in_order() {
        // Duplicates are not collapsed here; the association layer reports
        // the Conflict when the second copy is inserted.
        assert_eq!(
            split_spheres("A,B,A"),
            vec!["A".to_string(), "B".into(), "A".into()]
        );
    }
}
