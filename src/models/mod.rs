pub mod instrument;
pub mod page;
pub mod portfolio;
pub mod user;
