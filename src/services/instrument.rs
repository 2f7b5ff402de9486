use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::{Ability, Action};
use crate::db::paginate::PageOptions;
use crate::errors::{AppError, AppResult};
use crate::models::instrument::{
    DbInstrument, Instrument, InstrumentCreateRequest, InstrumentFilter, InstrumentUpdateRequest,
};
use crate::models::page::Page;
use crate::services::portfolio::check_portfolio_access;
use crate::utils::utc_now;

const SORT_COLUMNS: &[&str] = &["symbol", "name", "created_at", "updated_at"];

// Instruments declare no rules of their own: every operation authorizes the
// parent portfolio first (read access for reads, manage for writes).

pub async fn create_instrument(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    body: InstrumentCreateRequest,
) -> AppResult<Instrument> {
    check_portfolio_access(pool, ability, portfolio_id, Action::Manage).await?;

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO instruments (id, portfolio_id, symbol, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(portfolio_id)
    .bind(&body.symbol)
    .bind(&body.name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_instrument(pool, portfolio_id, id).await?.try_into()
}

pub async fn query_instruments(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    filter: &InstrumentFilter,
    options: &PageOptions,
) -> AppResult<Page<Instrument>> {
    check_portfolio_access(pool, ability, portfolio_id, Action::Read).await?;

    let order_by = options.order_by(SORT_COLUMNS, "created_at DESC")?;

    let mut count_query = QueryBuilder::new("SELECT COUNT(1) FROM instruments WHERE portfolio_id = ");
    count_query.push_bind(portfolio_id);
    push_filters(&mut count_query, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut select_query = QueryBuilder::new(
        "SELECT id, portfolio_id, symbol, name, created_at, updated_at FROM instruments WHERE portfolio_id = ",
    );
    select_query.push_bind(portfolio_id);
    push_filters(&mut select_query, filter);
    select_query.push(format!(" ORDER BY {order_by} LIMIT "));
    select_query.push_bind(options.limit());
    select_query.push(" OFFSET ");
    select_query.push_bind(options.offset());

    let rows: Vec<DbInstrument> = select_query.build_query_as().fetch_all(pool).await?;
    let results: Vec<Instrument> = rows
        .into_iter()
        .map(Instrument::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Page::new(results, options.page(), options.limit(), total))
}

pub async fn get_instrument_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    instrument_id: Uuid,
) -> AppResult<Instrument> {
    check_portfolio_access(pool, ability, portfolio_id, Action::Read).await?;

    fetch_instrument(pool, portfolio_id, instrument_id)
        .await?
        .try_into()
}

pub async fn update_instrument_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    instrument_id: Uuid,
    body: InstrumentUpdateRequest,
) -> AppResult<Instrument> {
    check_portfolio_access(pool, ability, portfolio_id, Action::Manage).await?;

    if body.is_empty() {
        return Err(AppError::bad_request("at least one field must be provided"));
    }

    let mut instrument = fetch_instrument(pool, portfolio_id, instrument_id).await?;
    if let Some(symbol) = body.symbol {
        instrument.symbol = symbol;
    }
    if let Some(name) = body.name {
        instrument.name = name;
    }

    let now = utc_now();
    sqlx::query("UPDATE instruments SET symbol = ?, name = ?, updated_at = ? WHERE id = ?")
        .bind(&instrument.symbol)
        .bind(&instrument.name)
        .bind(now)
        .bind(instrument.id)
        .execute(pool)
        .await?;

    instrument.updated_at = now;
    instrument.try_into()
}

pub async fn delete_instrument_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    instrument_id: Uuid,
) -> AppResult<Instrument> {
    check_portfolio_access(pool, ability, portfolio_id, Action::Manage).await?;

    let instrument = fetch_instrument(pool, portfolio_id, instrument_id).await?;
    sqlx::query("DELETE FROM instruments WHERE id = ?")
        .bind(instrument.id)
        .execute(pool)
        .await?;

    instrument.try_into()
}

async fn fetch_instrument(
    pool: &SqlitePool,
    portfolio_id: Uuid,
    instrument_id: Uuid,
) -> AppResult<DbInstrument> {
    sqlx::query_as::<_, DbInstrument>(
        "SELECT id, portfolio_id, symbol, name, created_at, updated_at FROM instruments WHERE id = ? AND portfolio_id = ?",
    )
    .bind(instrument_id)
    .bind(portfolio_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("instrument not found"))
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &InstrumentFilter) {
    if let Some(symbol) = &filter.symbol {
        query.push(" AND symbol = ");
        query.push_bind(symbol.clone());
    }
    if let Some(name) = &filter.name {
        query.push(" AND name = ");
        query.push_bind(name.clone());
    }
}
