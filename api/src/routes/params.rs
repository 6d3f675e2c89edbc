//! Query and path parameters shared by the listing endpoints.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::error::AppError;

const MAX_LIMIT: i64 = 500;
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Parse a `YYYY-MM-DD` date with a four-digit year, naming the parameter on
/// failure. Day and week arithmetic downstream relies on the year bound.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
        .ok_or_else(|| AppError::Validation {
            message: format!("{field} must be a date in YYYY-MM-DD format between years {MIN_YEAR} and {MAX_YEAR}"),
            field: Some(field.to_string()),
            received: Some(serde_json::Value::String(value.to_string())),
            docs_hint: None,
        })
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Maximum number of items to return
    pub limit: Option<i64>,
    /// Number of items to skip
    pub offset: Option<i64>,
}

impl Pagination {
    /// `(limit, offset)` with defaults applied. Limits are capped at 500.
    pub fn resolve(&self, default_limit: i64) -> Result<(i64, i64), AppError> {
        let limit = self.limit.unwrap_or(default_limit);
        let offset = self.offset.unwrap_or(0);
        if limit < 1 {
            return Err(AppError::validation("limit", "limit must be at least 1"));
        }
        if offset < 0 {
            return Err(AppError::validation("offset", "offset must not be negative"));
        }
        Ok((limit.min(MAX_LIMIT), offset))
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    /// First day, inclusive (YYYY-MM-DD)
    pub start_date: String,
    /// Last day, inclusive (YYYY-MM-DD)
    pub end_date: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Inclusive `start_date..=end_date`; a reversed range is rejected.
pub fn parse_range(start_date: &str, end_date: &str) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = parse_date("start_date", start_date)?;
    let end = parse_date("end_date", end_date)?;
    if start > end {
        return Err(AppError::validation(
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok((start, end))
}

impl DateRangeQuery {
    pub fn dates(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        parse_range(&self.start_date, &self.end_date)
    }

    pub fn page(&self, default_limit: i64) -> Result<(i64, i64), AppError> {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
        .resolve(default_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_iso_days() {
        assert_eq!(
            parse_date("date", "2026-03-02").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        for bad in ["02.03.2026", "2026-02-30", "today", "", "+262142-12-31", "0000-01-01"] {
            assert!(
                matches!(parse_date("date", bad), Err(AppError::Validation { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(Pagination::default().resolve(50).unwrap(), (50, 0));
        let page = Pagination {
            limit: Some(10_000),
            offset: Some(20),
        };
        assert_eq!(page.resolve(50).unwrap(), (500, 20));
        assert!(
            Pagination {
                limit: Some(0),
                offset: None
            }
            .resolve(50)
            .is_err()
        );
        assert!(
            Pagination {
                limit: None,
                offset: Some(-1)
            }
            .resolve(50)
            .is_err()
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let query = DateRangeQuery {
            start_date: "2026-03-05".to_string(),
            end_date: "2026-03-01".to_string(),
            limit: None,
            offset: None,
        };
        assert!(query.dates().is_err());
    }
}
