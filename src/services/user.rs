use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::{Ability, Action, Condition, Resource, Scope, Subject};
use crate::db::paginate::PageOptions;
use crate::errors::{AppError, AppResult};
use crate::models::page::Page;
use crate::models::user::{DbUser, User, UserCreateRequest, UserUpdateRequest};
use crate::utils::{hash_password, utc_now};

const SORT_COLUMNS: &[&str] = &["name", "email", "role", "created_at", "updated_at"];

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub name: Option<String>,
    pub role: Option<String>,
}

pub async fn create_user(
    pool: &SqlitePool,
    ability: &Ability,
    body: UserCreateRequest,
) -> AppResult<User> {
    let id = Uuid::new_v4();
    ability.ensure_can(Action::Create, &Subject::user(id))?;

    ensure_email_available(pool, &body.email, None).await?;

    let password_hash = hash_password(&body.password)?;
    let role = body.role.unwrap_or_else(|| "user".to_string());
    let now = utc_now();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&body.name)
    .bind(&body.email)
    .bind(password_hash)
    .bind(&role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_user(pool, id).await?.try_into()
}

pub async fn query_users(
    pool: &SqlitePool,
    ability: &Ability,
    filter: &UserFilter,
    options: &PageOptions,
) -> AppResult<Page<User>> {
    let scope = ability.scope_for(Action::Read, Resource::User);
    if scope == Scope::Nothing {
        return Ok(Page::empty(options.page(), options.limit()));
    }

    let order_by = options.order_by(SORT_COLUMNS, "created_at DESC")?;

    let mut count_query = QueryBuilder::new("SELECT COUNT(1) FROM users WHERE 1=1");
    push_filters(&mut count_query, filter, &scope);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut select_query = QueryBuilder::new(
        "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users WHERE 1=1",
    );
    push_filters(&mut select_query, filter, &scope);
    select_query.push(format!(" ORDER BY {order_by} LIMIT "));
    select_query.push_bind(options.limit());
    select_query.push(" OFFSET ");
    select_query.push_bind(options.offset());

    let rows: Vec<DbUser> = select_query.build_query_as().fetch_all(pool).await?;
    let results: Vec<User> = rows
        .into_iter()
        .map(User::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Page::new(results, options.page(), options.limit(), total))
}

pub async fn get_user_by_id(pool: &SqlitePool, ability: &Ability, id: Uuid) -> AppResult<User> {
    let user = fetch_user(pool, id).await?;
    ability.ensure_can(Action::Read, &user.subject())?;

    user.try_into()
}

pub async fn update_user_by_id(
    pool: &SqlitePool,
    ability: &Ability,
    id: Uuid,
    body: UserUpdateRequest,
) -> AppResult<User> {
    let mut user = fetch_user(pool, id).await?;

    let fields = body.field_names();
    if fields.is_empty() {
        return Err(AppError::bad_request("at least one field must be provided"));
    }

    // Any single disallowed field fails the whole update.
    ability.ensure_can_fields(Action::Update, &user.subject(), &fields)?;

    if let Some(email) = body.email {
        ensure_email_available(pool, &email, Some(id)).await?;
        user.email = email;
    }
    if let Some(name) = body.name {
        user.name = name;
    }
    if let Some(password) = body.password {
        user.password_hash = hash_password(&password)?;
    }
    if let Some(role) = body.role {
        user.role = role;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await?;

    user.updated_at = now;
    user.try_into()
}

pub async fn delete_user_by_id(pool: &SqlitePool, ability: &Ability, id: Uuid) -> AppResult<User> {
    let user = fetch_user(pool, id).await?;
    ability.ensure_can(Action::Delete, &user.subject())?;

    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
        .bind(user.id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(pool)
        .await?;

    user.try_into()
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub(crate) async fn fetch_user(pool: &SqlitePool, id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}

pub(crate) async fn ensure_email_available(
    pool: &SqlitePool,
    email: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let count: i64 = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(id)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(pool)
                .await?
        }
    };

    if count > 0 {
        return Err(AppError::bad_request("email already taken"));
    }

    Ok(())
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter, scope: &Scope) {
    if let Some(name) = &filter.name {
        query.push(" AND name = ");
        query.push_bind(name.clone());
    }
    if let Some(role) = &filter.role {
        query.push(" AND role = ");
        query.push_bind(role.clone());
    }

    if let Scope::Any(conditions) = scope {
        query.push(" AND (");
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            match condition {
                Condition::SelfIs(id) => {
                    query.push("id = ");
                    query.push_bind(*id);
                }
                // Portfolio conditions cannot appear in a User scope.
                Condition::OwnerIs(_) | Condition::IsPublic => {
                    query.push("0");
                }
            }
        }
        query.push(")");
    }
}
