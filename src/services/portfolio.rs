use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::{Ability, Action, Condition, Resource, Scope};
use crate::db::paginate::PageOptions;
use crate::errors::{AppError, AppResult};
use crate::models::page::Page;
use crate::models::portfolio::{
    DbPortfolio, Portfolio, PortfolioCreateRequest, PortfolioFilter, PortfolioUpdateRequest,
};
use crate::utils::utc_now;

const SORT_COLUMNS: &[&str] = &["name", "public", "created_at", "updated_at"];

/// Create a portfolio for `owner`. The owner is injected server-side from
/// the principal, never taken from the body, which is what makes the create
/// authorization implicit.
pub async fn create_portfolio(
    pool: &SqlitePool,
    owner: Uuid,
    body: PortfolioCreateRequest,
) -> AppResult<Portfolio> {
    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO portfolios (id, owner, name, public, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(owner)
    .bind(&body.name)
    .bind(body.public)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_portfolio(pool, id).await?.try_into()
}

/// List portfolios matching the caller filter, scoped by the ability's rule
/// conditions (own or public for users, nothing for anonymous roles).
pub async fn query_portfolios(
    pool: &SqlitePool,
    ability: &Ability,
    filter: &PortfolioFilter,
    options: &PageOptions,
) -> AppResult<Page<Portfolio>> {
    let scope = ability.scope_for(Action::Read, Resource::Portfolio);
    if scope == Scope::Nothing {
        return Ok(Page::empty(options.page(), options.limit()));
    }

    let order_by = options.order_by(SORT_COLUMNS, "created_at DESC")?;

    let mut count_query = QueryBuilder::new("SELECT COUNT(1) FROM portfolios WHERE 1=1");
    push_filters(&mut count_query, filter, &scope);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut select_query = QueryBuilder::new(
        "SELECT id, owner, name, public, created_at, updated_at FROM portfolios WHERE 1=1",
    );
    push_filters(&mut select_query, filter, &scope);
    select_query.push(format!(" ORDER BY {order_by} LIMIT "));
    select_query.push_bind(options.limit());
    select_query.push(" OFFSET ");
    select_query.push_bind(options.offset());

    let rows: Vec<DbPortfolio> = select_query.build_query_as().fetch_all(pool).await?;
    let results: Vec<Portfolio> = rows
        .into_iter()
        .map(Portfolio::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Page::new(results, options.page(), options.limit(), total))
}

pub async fn get_portfolio_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    id: Uuid,
) -> AppResult<Portfolio> {
    // NotFound before the ability check: existence is not hidden.
    let portfolio = fetch_portfolio(pool, id).await?;
    ability.ensure_can(Action::Read, &portfolio.subject())?;

    portfolio.try_into()
}

pub async fn update_portfolio_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    id: Uuid,
    body: PortfolioUpdateRequest,
) -> AppResult<Portfolio> {
    let mut portfolio = fetch_portfolio(pool, id).await?;

    if body.owner.is_some() {
        return Err(AppError::bad_request("owner cannot be changed"));
    }

    let fields = body.field_names();
    if fields.is_empty() {
        return Err(AppError::bad_request("at least one field must be provided"));
    }

    // Authorize against the merged state so a visibility flip is judged by
    // what the record is about to become.
    let merged = crate::authz::Subject::portfolio(
        portfolio.owner,
        body.public.unwrap_or(portfolio.public),
    );
    ability.ensure_can_fields(Action::Update, &merged, &fields)?;

    if let Some(name) = body.name {
        portfolio.name = name;
    }
    if let Some(public) = body.public {
        portfolio.public = public;
    }

    let now = utc_now();
    sqlx::query("UPDATE portfolios SET name = ?, public = ?, updated_at = ? WHERE id = ?")
        .bind(&portfolio.name)
        .bind(portfolio.public)
        .bind(now)
        .bind(portfolio.id)
        .execute(pool)
        .await?;

    portfolio.updated_at = now;
    portfolio.try_into()
}

pub async fn delete_portfolio_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    id: Uuid,
) -> AppResult<Portfolio> {
    let portfolio = fetch_portfolio(pool, id).await?;
    ability.ensure_can(Action::Delete, &portfolio.subject())?;

    sqlx::query("DELETE FROM instruments WHERE portfolio_id = ?")
        .bind(portfolio.id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM portfolios WHERE id = ?")
        .bind(portfolio.id)
        .execute(pool)
        .await?;

    portfolio.try_into()
}

/// Resolve the portfolio and fail loudly unless the ability grants `action`
/// on it. Instruments call this for every operation since their access is
/// inherited from the parent.
pub async fn check_portfolio_access(
    pool: &SqlitePool,
    ability: &Ability,
    portfolio_id: Uuid,
    action: Action,
) -> AppResult<DbPortfolio> {
    let portfolio = fetch_portfolio(pool, portfolio_id).await?;
    ability.ensure_can(action, &portfolio.subject())?;
    Ok(portfolio)
}

async fn fetch_portfolio(pool: &SqlitePool, id: Uuid) -> AppResult<DbPortfolio> {
    sqlx::query_as::<_, DbPortfolio>(
        "SELECT id, owner, name, public, created_at, updated_at FROM portfolios WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("portfolio not found"))
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &PortfolioFilter, scope: &Scope) {
    if let Some(name) = &filter.name {
        query.push(" AND name = ");
        query.push_bind(name.clone());
    }
    if let Some(owner) = filter.owner {
        query.push(" AND owner = ");
        query.push_bind(owner);
    }

    if let Scope::Any(conditions) = scope {
        query.push(" AND (");
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            match condition {
                Condition::OwnerIs(id) => {
                    query.push("owner = ");
                    query.push_bind(*id);
                }
                Condition::IsPublic => {
                    query.push("public = 1");
                }
                Condition::SelfIs(id) => {
                    query.push("id = ");
                    query.push_bind(*id);
                }
            }
        }
        query.push(")");
    }
}
