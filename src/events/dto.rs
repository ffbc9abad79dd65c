use serde::Deserialize;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::professions::dto::default_limit;

/// Required fields per operation, checked before any auth or storage work.
pub const ADD_FIELDS: &[&str] = &[
    "name",
    "date_of_the_event",
    "description",
    "place",
    "form_of_the_event",
    "token",
];
pub const DELETE_FIELDS: &[&str] = &["id", "token"];
pub const SPHERE_ADD_FIELDS: &[&str] = &["id", "sphere", "token"];
pub const SPHERE_DELETE_FIELDS: &[&str] = &["id", "token"];
pub const REGISTER_FIELDS: &[&str] = &["id", "token"];

pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EventListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenParam {
    pub token: String,
}

/// Earliest bound used when a listing has no explicit lower date.
pub fn archive_epoch() -> OffsetDateTime {
    datetime!(2000-01-01 00:00 UTC)
}

/// Latest bound used when a listing has no explicit upper date.
pub fn open_end() -> OffsetDateTime {
    datetime!(9999-01-01 00:00 UTC)
}

/// Past events: from the fixed epoch up to now.
pub fn archive_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    (archive_epoch(), now)
}

/// Upcoming events: from now to a week ahead.
pub fn calendar_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    (now, now + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_window_ends_now() {
        let now = datetime!(2024-03-10 15:00 UTC);
        let (from, to) = archive_window(now);
        assert_eq!(from, datetime!(2000-01-01 00:00 UTC));
        assert_eq!(to, now);
    }

    #[test]
    fn calendar_window_spans_one_week() {
        let now = datetime!(2024-03-10 15:00 UTC);
        let (from, to) = calendar_window(now);
        assert_eq!(from, now);
        assert_eq!(to, datetime!(2024-03-17 15:00 UTC));
    }

    #[test]
    fn default_bounds_are_ordered() {
        assert!(archive_epoch() < open_end());
    }
}
