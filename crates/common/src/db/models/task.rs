//! Task entity
//!
//! Embedded sub-documents are stored as JSONB so point updates can replace
//! one of them without rewriting the row. `status` is lifted into its own
//! column for grouping.

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::model::{OcrProgress, Status, Task};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub ocr_config: Json,

    #[sea_orm(column_type = "JsonBinary")]
    pub scheduler_config: Json,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub status_description: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub in_documents: Json,

    pub created_at: DateTimeWithTimeZone,

    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Task {
    type Error = AppError;

    fn try_from(model: Model) -> std::result::Result<Self, AppError> {
        let status = Status::parse(&model.status).ok_or_else(|| AppError::InvalidFormat {
            message: format!("unknown task status '{}' for task {}", model.status, model.id),
        })?;

        Ok(Task {
            id: model.id,
            name: model.name,
            ocr_config: serde_json::from_value(model.ocr_config)?,
            scheduler_config: serde_json::from_value(model.scheduler_config)?,
            ocr_progress: OcrProgress {
                status,
                description: model.status_description,
            },
            in_documents: serde_json::from_value(model.in_documents)?,
            created_at: model.created_at.to_utc(),
            modified_at: model.modified_at.to_utc(),
        })
    }
}

impl TryFrom<&Task> for ActiveModel {
    type Error = AppError;

    fn try_from(task: &Task) -> std::result::Result<Self, AppError> {
        Ok(ActiveModel {
            id: Set(task.id),
            name: Set(task.name.clone()),
            ocr_config: Set(serde_json::to_value(&task.ocr_config)?),
            scheduler_config: Set(serde_json::to_value(&task.scheduler_config)?),
            status: Set(task.ocr_progress.status.as_str().to_string()),
            status_description: Set(task.ocr_progress.description.clone()),
            in_documents: Set(serde_json::to_value(task.in_documents())?),
            created_at: Set(task.created_at.fixed_offset()),
            modified_at: Set(task.modified_at.fixed_offset()),
        })
    }
}
