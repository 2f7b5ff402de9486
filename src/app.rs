use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, instruments, portfolios, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/", post(users::create_user))
        .route("/:user_id", get(users::get_user))
        .route("/:user_id", patch(users::update_user))
        .route("/:user_id", delete(users::delete_user));

    let portfolio_routes = Router::new()
        .route("/", get(portfolios::list_portfolios))
        .route("/", post(portfolios::create_portfolio))
        .route("/:portfolio_id", get(portfolios::get_portfolio))
        .route("/:portfolio_id", patch(portfolios::update_portfolio))
        .route("/:portfolio_id", delete(portfolios::delete_portfolio));

    // Instruments are scoped to a portfolio; their authorization is
    // inherited from it.
    let instrument_routes = Router::new()
        .route("/", get(instruments::list_instruments))
        .route("/", post(instruments::create_instrument))
        .route("/:instrument_id", get(instruments::get_instrument))
        .route("/:instrument_id", patch(instruments::update_instrument))
        .route("/:instrument_id", delete(instruments::delete_instrument));

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/portfolios", portfolio_routes)
        .nest("/portfolios/:portfolio_id/instruments", instrument_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
