use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Subject;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Portfolio {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPortfolio {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbPortfolio {
    pub fn subject(&self) -> Subject {
        Subject::portfolio(self.owner, self.public)
    }
}

impl TryFrom<DbPortfolio> for Portfolio {
    type Error = AppError;

    fn try_from(value: DbPortfolio) -> Result<Self, Self::Error> {
        Ok(Portfolio {
            id: value.id,
            owner: value.owner,
            name: value.name,
            public: value.public,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioCreateRequest {
    #[schema(example = "My Portfolio")]
    pub name: String,
    #[schema(example = false)]
    pub public: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioUpdateRequest {
    #[schema(example = "My Portfolio")]
    pub name: Option<String>,
    #[schema(example = true)]
    pub public: Option<bool>,
    /// Accepted in the payload only to reject it: the owner relation is
    /// immutable.
    pub owner: Option<Uuid>,
}

impl PortfolioUpdateRequest {
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.public.is_some() {
            fields.push("public");
        }
        fields
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioFilter {
    pub name: Option<String>,
    pub owner: Option<Uuid>,
}
