use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::paginate::PageOptions;
use crate::errors::AppResult;
use crate::jwt::AuthContext;
use crate::models::instrument::{
    Instrument, InstrumentCreateRequest, InstrumentFilter, InstrumentUpdateRequest,
};
use crate::models::page::{InstrumentPage, Page};
use crate::services;

#[derive(Debug, Default, Deserialize)]
pub struct ListInstrumentsQuery {
    pub symbol: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListInstrumentsQuery {
    fn split(self) -> (InstrumentFilter, PageOptions) {
        (
            InstrumentFilter {
                symbol: self.symbol,
                name: self.name,
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
    path = "/portfolios/{portfolio_id}/instruments",
    tag = "Instruments",
    security(("bearerAuth" = [])),
    params(
        ("portfolio_id" = Uuid, Path, description = "Parent portfolio id"),
        ("symbol" = Option<String>, Query, description = "Filter by symbol"),
        ("name" = Option<String>, Query, description = "Filter by name"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("page" = Option<i64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Paginated instruments", body = InstrumentPage),
        (status = 403, description = "No read access to the parent portfolio")
    )
)]
pub async fn list_instruments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(portfolio_id): Path<Uuid>,
    Query(query): Query<ListInstrumentsQuery>,
) -> AppResult<Json<Page<Instrument>>> {
    let (filter, options) = query.split();
    let page = services::instrument::query_instruments(
        &state.pool,
        &auth.ability,
        portfolio_id,
        &filter,
        &options,
    )
    .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/portfolios/{portfolio_id}/instruments",
    tag = "Instruments",
    security(("bearerAuth" = [])),
    params(("portfolio_id" = Uuid, Path, description = "Parent portfolio id")),
    request_body = InstrumentCreateRequest,
    responses(
        (status = 201, description = "Instrument created", body = Instrument),
        (status = 403, description = "Not the portfolio owner")
    )
)]
pub async fn create_instrument(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(portfolio_id): Path<Uuid>,
    Json(payload): Json<InstrumentCreateRequest>,
) -> AppResult<(StatusCode, Json<Instrument>)> {
    let instrument =
        services::instrument::create_instrument(&state.pool, &auth.ability, portfolio_id, payload)
            .await?;
    Ok((StatusCode::CREATED, Json(instrument)))
}

#[utoipa::path(
    get,
    path = "/portfolios/{portfolio_id}/instruments/{instrument_id}",
    tag = "Instruments",
    security(("bearerAuth" = [])),
    params(
        ("portfolio_id" = Uuid, Path, description = "Parent portfolio id"),
        ("instrument_id" = Uuid, Path, description = "Instrument id")
    ),
    responses(
        (status = 200, description = "Instrument detail", body = Instrument),
        (status = 404, description = "Not found in this portfolio")
    )
)]
pub async fn get_instrument(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((portfolio_id, instrument_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Instrument>> {
    let instrument = services::instrument::get_instrument_by_id(
        &state.pool,
        &auth.ability,
        portfolio_id,
        instrument_id,
    )
    .await?;
    Ok(Json(instrument))
}

#[utoipa::path(
    patch,
    path = "/portfolios/{portfolio_id}/instruments/{instrument_id}",
    tag = "Instruments",
    security(("bearerAuth" = [])),
    params(
        ("portfolio_id" = Uuid, Path, description = "Parent portfolio id"),
        ("instrument_id" = Uuid, Path, description = "Instrument id")
    ),
    request_body = InstrumentUpdateRequest,
    responses((status = 200, description = "Instrument updated", body = Instrument))
)]
pub async fn update_instrument(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((portfolio_id, instrument_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<InstrumentUpdateRequest>,
) -> AppResult<Json<Instrument>> {
    let instrument = services::instrument::update_instrument_by_id(
        &state.pool,
        &auth.ability,
        portfolio_id,
        instrument_id,
        payload,
    )
    .await?;
    Ok(Json(instrument))
}

#[utoipa::path(
    delete,
    path = "/portfolios/{portfolio_id}/instruments/{instrument_id}",
    tag = "Instruments",
    security(("bearerAuth" = [])),
    params(
        ("portfolio_id" = Uuid, Path, description = "Parent portfolio id"),
        ("instrument_id" = Uuid, Path, description = "Instrument id")
    ),
    responses((status = 204, description = "Instrument deleted"))
)]
pub async fn delete_instrument(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((portfolio_id, instrument_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    services::instrument::delete_instrument_by_id(
        &state.pool,
        &auth.ability,
        portfolio_id,
        instrument_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
