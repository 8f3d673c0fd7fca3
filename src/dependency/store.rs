//! PostgreSQL-backed relational store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{Backend, DependencyError, RelationalStore, ServerClock};

/// Pooled PostgreSQL connection.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Build the pool without connecting. Only a malformed url fails here;
    /// connections are opened on first use, so a server that comes up later
    /// is picked up by the next query.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DependencyError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Backend for PostgresStore {
    async fn ping(&self) -> Result<(), DependencyError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DependencyError> {
        // PgPool::close is idempotent and waits for checked-out connections
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn server_clock(&self) -> Result<ServerClock, DependencyError> {
        let (current_time, database): (DateTime<Utc>, String) =
            sqlx::query_as("SELECT NOW(), current_database()")
                .fetch_one(&self.pool)
                .await?;

        Ok(ServerClock {
            current_time,
            database,
        })
    }
}
