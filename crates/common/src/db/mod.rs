//! Database layer for OCR Studio
//!
//! Provides:
//! - SeaORM entity models
//! - The `TaskStore` document store abstraction and its implementations
//! - Connection pool management and schema bootstrap

pub mod models;
mod memory;
mod repository;

pub use memory::MemoryTaskStore;
pub use repository::{PgTaskStore, TaskStore};

use crate::config::{DatabaseConfig, StoreBackend};
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Schema for the task table. Embedded documents live in JSONB columns.
const CREATE_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    ocr_config JSONB NOT NULL,
    scheduler_config JSONB NOT NULL,
    status TEXT NOT NULL,
    status_description TEXT,
    in_documents JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL,
    modified_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS tasks_status_idx ON tasks (status);
"#;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_unprepared(CREATE_TASKS_TABLE).await?;
        info!("Database schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Create a task store based on configuration
pub async fn create_task_store(config: &DatabaseConfig) -> Result<Arc<dyn TaskStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let pool = DbPool::new(config).await?;
            pool.ensure_schema().await?;
            Ok(Arc::new(PgTaskStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory task store, data will not survive a restart");
            Ok(Arc::new(MemoryTaskStore::new()))
        }
    }
}
