use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::refresh,
        routes::auth::logout,
        routes::auth::me,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::portfolios::list_portfolios,
        routes::portfolios::create_portfolio,
        routes::portfolios::get_portfolio,
        routes::portfolios::update_portfolio,
        routes::portfolios::delete_portfolio,
        routes::instruments::list_instruments,
        routes::instruments::create_instrument,
        routes::instruments::get_instrument,
        routes::instruments::update_instrument,
        routes::instruments::delete_instrument,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::auth::MessageResponse,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::RefreshRequest,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::portfolio::Portfolio,
            models::portfolio::PortfolioCreateRequest,
            models::portfolio::PortfolioUpdateRequest,
            models::instrument::Instrument,
            models::instrument::InstrumentCreateRequest,
            models::instrument::InstrumentUpdateRequest,
            models::page::UserPage,
            models::page::PortfolioPage,
            models::page::InstrumentPage,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User management (admin, plus self read/update)"),
        (name = "Portfolios", description = "Portfolio management"),
        (name = "Instruments", description = "Instruments within a portfolio")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
