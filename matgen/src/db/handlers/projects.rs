//! Project lookups, scoped to a transaction that spans the whole request.

use crate::db::{errors::Result, models::projects::ProjectDBResponse};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

/// Opens the transaction a request runs inside.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ProjectTransaction>>;
}

/// A unit of work over the projects table. Dropping it without committing rolls back.
#[async_trait]
pub trait ProjectTransaction: Send {
    /// Get a project by ID
    async fn find_project(&mut self, id: &str) -> Result<Option<ProjectDBResponse>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Postgres-backed project store
#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn begin(&self) -> Result<Box<dyn ProjectTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgProjectTransaction { tx }))
    }
}

pub struct PgProjectTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProjectTransaction for PgProjectTransaction {
    #[instrument(skip(self), err)]
    async fn find_project(&mut self, id: &str) -> Result<Option<ProjectDBResponse>> {
        let project = sqlx::query_as::<_, ProjectDBResponse>("SELECT id, name, created_at, updated_at FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(project)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
