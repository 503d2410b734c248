use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database response for a project
#[derive(Debug, Clone, FromRow)]
pub struct ProjectDBResponse {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
