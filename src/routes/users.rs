use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::paginate::PageOptions;
use crate::errors::AppResult;
use crate::jwt::AuthContext;
use crate::models::page::{Page, UserPage};
use crate::models::user::{User, UserCreateRequest, UserUpdateRequest};
use crate::services;
use crate::services::user::UserFilter;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListUsersQuery {
    fn split(self) -> (UserFilter, PageOptions) {
        (
            UserFilter {
                name: self.name,
                role: self.role,
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
    path = "/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(
        ("name" = Option<String>, Query, description = "Filter by name"),
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("page" = Option<i64>, Query, description = "Page number")
    ),
    responses((status = 200, description = "Paginated users", body = UserPage))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Page<User>>> {
    let (filter, options) = query.split();
    let page = services::user::query_users(&state.pool, &auth.ability, &filter, &options).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 403, description = "Only admins can create users")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = services::user::create_user(&state.pool, &auth.ability, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let user = services::user::get_user_by_id(&state.pool, &auth.ability, user_id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Field not allowed for this principal")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let user = services::user::update_user_by_id(&state.pool, &auth.ability, user_id, payload).await?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("user_id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::user::delete_user_by_id(&state.pool, &auth.ability, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
