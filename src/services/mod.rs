//! Service layer: all data operations live here, taking the request's
//! [`Ability`](crate::authz::Ability) explicitly where authorization
//! applies. Route handlers stay thin.

pub mod auth;
pub mod instrument;
pub mod portfolio;
pub mod user;
