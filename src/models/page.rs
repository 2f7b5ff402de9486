use serde::Serialize;
use utoipa::ToSchema;

use super::instrument::Instrument;
use super::portfolio::Portfolio;
use super::user::User;

/// Paginated query result. The field names are part of the API contract,
/// camelCased to match what clients of the original service expect.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(UserPage = Page<User>, PortfolioPage = Page<Portfolio>, InstrumentPage = Page<Instrument>)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, page: i64, limit: i64, total_results: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_results + limit - 1) / limit
        } else {
            0
        };

        Self {
            results,
            page,
            limit,
            total_pages,
            total_results,
        }
    }

    pub fn empty(page: i64, limit: i64) -> Self {
        Self::new(Vec::new(), page, limit, 0)
    }
}
