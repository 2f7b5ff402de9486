use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::paginate::PageOptions;
use crate::errors::AppResult;
use crate::jwt::AuthContext;
use crate::models::page::{Page, PortfolioPage};
use crate::models::portfolio::{
    Portfolio, PortfolioCreateRequest, PortfolioFilter, PortfolioUpdateRequest,
};
use crate::services;

#[derive(Debug, Default, Deserialize)]
pub struct ListPortfoliosQuery {
    pub name: Option<String>,
    pub owner: Option<Uuid>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListPortfoliosQuery {
    fn split(self) -> (PortfolioFilter, PageOptions) {
        (
            PortfolioFilter {
                name: self.name,
                owner: self.owner,
            },
            PageOptions {
                sort_by: self.sort_by,
                limit: self.limit,
                page: self.page,
            },
        )
    }
}

#[utoipa::path(
    get,
    path = "/portfolios",
    tag = "Portfolios",
    security(("bearerAuth" = [])),
    params(
        ("name" = Option<String>, Query, description = "Filter by name"),
        ("owner" = Option<Uuid>, Query, description = "Filter by owner"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("page" = Option<i64>, Query, description = "Page number")
    ),
    responses((status = 200, description = "Paginated portfolios", body = PortfolioPage))
)]
pub async fn list_portfolios(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListPortfoliosQuery>,
) -> AppResult<Json<Page<Portfolio>>> {
    let (filter, options) = query.split();
    let page =
        services::portfolio::query_portfolios(&state.pool, &auth.ability, &filter, &options).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/portfolios",
    tag = "Portfolios",
    security(("bearerAuth" = [])),
    request_body = PortfolioCreateRequest,
    responses((status = 201, description = "Portfolio created", body = Portfolio))
)]
pub async fn create_portfolio(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<PortfolioCreateRequest>,
) -> AppResult<(StatusCode, Json<Portfolio>)> {
    let portfolio =
        services::portfolio::create_portfolio(&state.pool, auth.user_id(), payload).await?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

#[utoipa::path(
    get,
    path = "/portfolios/{portfolio_id}",
    tag = "Portfolios",
    security(("bearerAuth" = [])),
    params(("portfolio_id" = Uuid, Path, description = "Portfolio id")),
    responses(
        (status = 200, description = "Portfolio detail", body = Portfolio),
        (status = 403, description = "Private portfolio of another user"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_portfolio(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(portfolio_id): Path<Uuid>,
) -> AppResult<Json<Portfolio>> {
    let portfolio =
        services::portfolio::get_portfolio_by_id(&state.pool, &auth.ability, portfolio_id).await?;
    Ok(Json(portfolio))
}

#[utoipa::path(
    patch,
    path = "/portfolios/{portfolio_id}",
    tag = "Portfolios",
    security(("bearerAuth" = [])),
    params(("portfolio_id" = Uuid, Path, description = "Portfolio id")),
    request_body = PortfolioUpdateRequest,
    responses(
        (status = 200, description = "Portfolio updated", body = Portfolio),
        (status = 400, description = "Attempted to change the owner"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn update_portfolio(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(portfolio_id): Path<Uuid>,
    Json(payload): Json<PortfolioUpdateRequest>,
) -> AppResult<Json<Portfolio>> {
    let portfolio =
        services::portfolio::update_portfolio_by_id(&state.pool, &auth.ability, portfolio_id, payload)
            .await?;
    Ok(Json(portfolio))
}

#[utoipa::path(
    delete,
    path = "/portfolios/{portfolio_id}",
    tag = "Portfolios",
    security(("bearerAuth" = [])),
    params(("portfolio_id" = Uuid, Path, description = "Portfolio id")),
    responses((status = 204, description = "Portfolio deleted"))
)]
pub async fn delete_portfolio(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(portfolio_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::portfolio::delete_portfolio_by_id(&state.pool, &auth.ability, portfolio_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
