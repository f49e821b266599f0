//! Document store for task records
//!
//! `TaskStore` is the seam the lifecycle service talks to. `PgTaskStore`
//! implements it on Postgres through SeaORM, keeping the embedded
//! configuration and document lists in JSONB columns.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::model::{OcrConfig, Page, SchedulerConfig, Status, StatusCount, Task};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Statement, ColumnTrait,
};
use uuid::Uuid;

/// Persistence operations for tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task record
    async fn insert(&self, task: Task) -> Result<Task>;

    /// Replace the whole record, refreshing `modified_at`
    async fn save(&self, task: Task) -> Result<Task>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>>;

    /// All tasks, ordered by id ascending
    async fn find_all(&self) -> Result<Vec<Task>>;

    /// One zero-based page of tasks, ordered by id ascending
    async fn find_page(&self, page_number: u64, page_size: u64) -> Result<Page<Task>>;

    /// Returns whether a record was removed
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;

    /// Replace only `ocr_config`; returns the number of matched records
    async fn update_ocr_config_by_id(&self, id: Uuid, ocr_config: &OcrConfig) -> Result<u64>;

    /// Replace only `scheduler_config`; returns the number of matched records
    async fn update_scheduler_config_by_id(
        &self,
        id: Uuid,
        scheduler_config: &SchedulerConfig,
    ) -> Result<u64>;

    /// Replace only `ocr_config.language`; returns the number of matched records
    async fn update_language_by_id(&self, id: Uuid, language: &str) -> Result<u64>;

    /// Number of tasks grouped by lifecycle status
    async fn count_by_status(&self) -> Result<Vec<StatusCount>>;

    /// Mean length of `in_documents` across all tasks, 0 when there are none
    async fn average_in_documents(&self) -> Result<f64>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Postgres-backed task store
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: Task) -> Result<Task> {
        let model = TaskActiveModel::try_from(&task)?;
        TaskEntity::insert(model).exec(self.conn()).await?;
        Ok(task)
    }

    async fn save(&self, mut task: Task) -> Result<Task> {
        task.touch();
        let model = TaskActiveModel::try_from(&task)?;

        // Upsert; created_at is never overwritten
        TaskEntity::insert(model)
            .on_conflict(
                OnConflict::column(TaskColumn::Id)
                    .update_columns([
                        TaskColumn::Name,
                        TaskColumn::OcrConfig,
                        TaskColumn::SchedulerConfig,
                        TaskColumn::Status,
                        TaskColumn::StatusDescription,
                        TaskColumn::InDocuments,
                        TaskColumn::ModifiedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.conn())
            .await?;

        Ok(task)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        TaskEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<Task>> {
        TaskEntity::find()
            .order_by_asc(TaskColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn find_page(&self, page_number: u64, page_size: u64) -> Result<Page<Task>> {
        let paginator = TaskEntity::find()
            .order_by_asc(TaskColumn::Id)
            .paginate(self.conn(), page_size);

        let total = paginator.num_items().await?;
        let tasks = paginator
            .fetch_page(page_number)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(tasks, page_number, page_size, total))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let result = TaskEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    async fn update_ocr_config_by_id(&self, id: Uuid, ocr_config: &OcrConfig) -> Result<u64> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().fixed_offset();
        let result = TaskEntity::update_many()
            .col_expr(TaskColumn::OcrConfig, Expr::value(serde_json::to_value(ocr_config)?))
            .col_expr(TaskColumn::ModifiedAt, Expr::value(now))
            .filter(TaskColumn::Id.eq(id))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected)
    }

    async fn update_scheduler_config_by_id(
        &self,
        id: Uuid,
        scheduler_config: &SchedulerConfig,
    ) -> Result<u64> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().fixed_offset();
        let result = TaskEntity::update_many()
            .col_expr(
                TaskColumn::SchedulerConfig,
                Expr::value(serde_json::to_value(scheduler_config)?),
            )
            .col_expr(TaskColumn::ModifiedAt, Expr::value(now))
            .filter(TaskColumn::Id.eq(id))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected)
    }

    async fn update_language_by_id(&self, id: Uuid, language: &str) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE tasks
            SET ocr_config = jsonb_set(ocr_config, '{language}', to_jsonb($1::text)),
                modified_at = NOW()
            WHERE id = $2
            "#,
            vec![language.into(), id.into()],
        );

        let result = self.conn().execute(stmt).await?;
        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            "SELECT status, COUNT(*) AS count FROM tasks GROUP BY status ORDER BY status",
        );

        let mut counts = Vec::new();
        for row in self.conn().query_all(stmt).await? {
            let raw: String = row.try_get_by_index(0)?;
            let count: i64 = row.try_get_by_index(1)?;
            match Status::parse(&raw) {
                Some(status) => counts.push(StatusCount {
                    status,
                    count: count as u64,
                }),
                None => tracing::warn!(status = %raw, "Skipping unknown task status in analytics"),
            }
        }
        counts.sort_by_key(|c| c.status);
        Ok(counts)
    }

    async fn average_in_documents(&self) -> Result<f64> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            "SELECT COALESCE(AVG(jsonb_array_length(in_documents)), 0)::float8 FROM tasks",
        );

        let row = self
            .conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "average query returned no row".to_string(),
            })?;

        Ok(row.try_get_by_index::<f64>(0)?)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
