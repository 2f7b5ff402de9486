use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// An instrument has no visibility of its own; every access is authorized
/// through its parent portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Instrument {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbInstrument {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbInstrument> for Instrument {
    type Error = AppError;

    fn try_from(value: DbInstrument) -> Result<Self, Self::Error> {
        Ok(Instrument {
            id: value.id,
            portfolio_id: value.portfolio_id,
            symbol: value.symbol,
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstrumentCreateRequest {
    #[schema(example = "AAPL")]
    pub symbol: String,
    #[schema(example = "Apple Inc.")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstrumentUpdateRequest {
    #[schema(example = "AAPL")]
    pub symbol: Option<String>,
    #[schema(example = "Apple Inc.")]
    pub name: Option<String>,
}

impl InstrumentUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none() && self.name.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InstrumentFilter {
    pub symbol: Option<String>,
    pub name: Option<String>,
}
