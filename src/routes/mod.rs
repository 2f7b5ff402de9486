pub mod auth;
pub mod health;
pub mod instruments;
pub mod portfolios;
pub mod users;
