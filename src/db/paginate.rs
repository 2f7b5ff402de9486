use serde::Deserialize;

use crate::errors::{AppError, AppResult};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Pagination options accepted on every list endpoint, mirroring the
/// `sortBy`/`limit`/`page` query parameters of the original API.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageOptions {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl PageOptions {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Build an ORDER BY expression from a `field:asc|desc` sort string,
    /// validated against the caller's column allow-list. Column names are
    /// never interpolated from raw input.
    pub fn order_by(&self, allowed: &[&str], default: &str) -> AppResult<String> {
        let sort_by = match self.sort_by.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(default.to_string()),
        };

        let (field, direction) = match sort_by.split_once(':') {
            Some((field, dir)) => (field, dir),
            None => (sort_by, "asc"),
        };

        let column = allowed
            .iter()
            .find(|c| **c == field)
            .ok_or_else(|| AppError::bad_request(format!("cannot sort by '{field}'")))?;

        let direction = match direction {
            "asc" => "ASC",
            "desc" => "DESC",
            other => {
                return Err(AppError::bad_request(format!(
                    "invalid sort direction '{other}'"
                )))
            }
        };

        Ok(format!("{column} {direction}"))
    }
}
