//! HTTP handlers, one module per resource. Handlers stay thin: they validate the
//! request, call the repository and media manager, and render a view.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    errors::{ApiError, ApiResult},
    models::{Marker, PageQuery, Publication},
    repository::Repository,
};

pub mod auth;
pub mod employees;
pub mod markers;
pub mod profile;
pub mod publications;
pub mod server;
pub mod users;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Keeps `(page - 1) * limit` far below `i64::MAX`, which is what the database binds.
pub const MAX_PAGE: u64 = 1_000_000;

/// Emails are compared trimmed and lowercased everywhere.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Resolves `?page=&limit=`. Missing, non-numeric or zero values use the defaults;
/// oversized ones are capped at `MAX_PAGE` / `MAX_PAGE_SIZE`.
pub fn page_window(query: &PageQuery) -> (u64, u64) {
    fn positive(value: Option<&String>, default: u64) -> u64 {
        value
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    }

    (
        positive(query.page.as_ref(), DEFAULT_PAGE).min(MAX_PAGE),
        positive(query.limit.as_ref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
    )
}

pub fn total_pages(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

/// Comma separated tags, trimmed, empties dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_coordinate(field: &str, raw: &str) -> ApiResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::validation(format!("Invalid {field}")))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(field: &str, raw: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::validation(format!("Invalid {field}")))
}

/// Active publication or 404. Soft-deleted posts are invisible.
pub(crate) async fn active_publication(repo: &dyn Repository, id: Uuid) -> ApiResult<Publication> {
    repo.get_publication(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Publication not found"))
}

/// Active publication owned by `caller`: 404 when missing, 403 for anyone else.
pub(crate) async fn owned_publication(
    repo: &dyn Repository,
    id: Uuid,
    caller: Uuid,
) -> ApiResult<Publication> {
    let publication = active_publication(repo, id).await?;
    if !publication.is_owned_by(caller) {
        tracing::warn!(publication_id = %id, user_id = %caller, "publication access refused");
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(publication)
}

pub(crate) async fn owned_marker(repo: &dyn Repository, id: Uuid, caller: Uuid) -> ApiResult<Marker> {
    let marker = repo
        .get_marker(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Marker not found"))?;
    if !marker.is_owned_by(caller) {
        tracing::warn!(marker_id = %id, user_id = %caller, "marker access refused");
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn page_window_falls_back_on_garbage() {
        assert_eq!(page_window(&query(None, None)), (1, 20));
        assert_eq!(page_window(&query(Some("abc"), Some("0"))), (1, 20));
        assert_eq!(page_window(&query(Some("2"), Some("10"))), (2, 10));
    }

    #[test]
    fn page_window_caps_huge_values() {
        assert_eq!(
            page_window(&query(Some("99999999999999999999"), Some("9223372036854775808"))),
            (1, MAX_PAGE_SIZE)
        );
        let (page, limit) = page_window(&query(Some("18446744073709551615"), Some("500")));
        assert_eq!((page, limit), (MAX_PAGE, MAX_PAGE_SIZE));
        assert!(i64::try_from((page - 1) * limit).is_ok());
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
    }

    #[test]
    fn tags_are_trimmed_and_empties_dropped() {
        assert_eq!(parse_tags(" a, ,b ,,c"), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn dates_accept_both_formats() {
        let plain = parse_date("startDate", "2024-03-01").unwrap();
        assert_eq!(plain.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_date("startDate", "2024-03-01T10:00:00Z").is_ok());
        assert!(parse_date("startDate", "yesterday").is_err());
    }

    #[test]
    fn coordinates_must_be_finite_numbers() {
        assert_eq!(parse_coordinate("latitude", " 1.5 ").unwrap(), 1.5);
        assert!(parse_coordinate("latitude", "north").is_err());
        assert!(parse_coordinate("latitude", "NaN").is_err());
    }
}
