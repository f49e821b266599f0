//! Task management handlers

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use ocrstudio_common::{
    errors::{AppError, Result},
    model::{Document, OcrConfig, Page, SchedulerConfig, Task},
    service::UploadFile,
};

const MODEL_FIELD: &str = "model";
const FILES_FIELD: &str = "files";

/// Multipart `model` part of a task creation request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskAddRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub ocr_config: OcrConfig,

    #[serde(default)]
    pub scheduler_config: SchedulerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TaskDraftRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub page_number: u64,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQuery {
    pub original_file_name: Option<String>,
}

/// One stored upload, as reported back to the client
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentResponse {
    pub randomized_file_name: String,
    pub original_file_name: String,
}

impl From<Document> for UploadDocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            randomized_file_name: document.randomized_file_name,
            original_file_name: document.original_file_name,
        }
    }
}

fn task_location(id: Uuid) -> String {
    format!("/api/v1/task/{}", id)
}

fn created(task: Task) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        [(header::LOCATION, task_location(task.id))],
        Json(task),
    )
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::InvalidFormat {
            message: format!("malformed multipart body: {}", err.body_text()),
        }
    }
}

/// Parts of a multipart task request
#[derive(Default)]
struct MultipartForm {
    model: Option<String>,
    files: Vec<UploadFile>,
}

async fn read_multipart(mut multipart: Multipart, limit: usize) -> Result<MultipartForm> {
    let mut form = MultipartForm::default();
    let mut total = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(MODEL_FIELD) => {
                form.model = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
            }
            Some(FILES_FIELD) => {
                let original_file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

                total += content.len();
                if total > limit {
                    return Err(AppError::PayloadTooLarge { limit });
                }
                if original_file_name.is_empty() {
                    return Err(AppError::Validation {
                        message: "uploaded file has no file name".to_string(),
                        field: Some(FILES_FIELD.to_string()),
                    });
                }

                form.files.push(UploadFile::new(original_file_name, content_type, content));
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}

/// List all tasks
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>> {
    Ok(Json(state.service.list_tasks().await?))
}

/// List one page of tasks
pub async fn list_tasks_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Task>>> {
    let page = state
        .service
        .list_tasks_page(query.page_number, query.page_size)
        .await?;
    Ok(Json(page))
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>> {
    let task = state
        .service
        .get_task(task_id)
        .await?
        .ok_or(AppError::MissingEntity { id: task_id })?;
    Ok(Json(task))
}

/// Create a task from a multipart `model` part and optional `files`
#[tracing::instrument(skip(state, multipart))]
pub async fn create_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_multipart(multipart, state.config.server.max_upload_bytes).await?;

    let model = form.model.ok_or_else(|| AppError::Validation {
        message: "missing 'model' part".to_string(),
        field: Some(MODEL_FIELD.to_string()),
    })?;
    let request: TaskAddRequest = serde_json::from_str(&model).map_err(|e| AppError::InvalidFormat {
        message: format!("invalid task model: {}", e),
    })?;
    request.validate()?;

    let task = state
        .service
        .create_task(
            &request.name,
            request.ocr_config,
            request.scheduler_config,
            form.files,
        )
        .await?;

    Ok(created(task))
}

/// Create a task with default configuration
#[tracing::instrument(skip(state, request))]
pub async fn create_draft(
    State(state): State<AppState>,
    Json(request): Json<TaskDraftRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    let task = state.service.create_draft(&request.name).await?;
    Ok(created(task))
}

/// Upload input documents to an existing task
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_documents(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadDocumentResponse>>> {
    let form = read_multipart(multipart, state.config.server.max_upload_bytes).await?;
    if form.files.is_empty() {
        return Err(AppError::Validation {
            message: "at least one file part is required".to_string(),
            field: Some("files".to_string()),
        });
    }
    let documents = state.service.upload_documents(task_id, form.files).await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

fn updated(task_id: Uuid, count: u64) -> Result<StatusCode> {
    if count == 0 {
        return Err(AppError::MissingEntity { id: task_id });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, ocr_config))]
pub async fn update_ocr_config(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(ocr_config): Json<OcrConfig>,
) -> Result<StatusCode> {
    let count = state.service.update_ocr_config(task_id, &ocr_config).await?;
    updated(task_id, count)
}

#[tracing::instrument(skip(state, scheduler_config))]
pub async fn update_scheduler_config(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(scheduler_config): Json<SchedulerConfig>,
) -> Result<StatusCode> {
    let count = state
        .service
        .update_scheduler_config(task_id, &scheduler_config)
        .await?;
    updated(task_id, count)
}

#[tracing::instrument(skip(state))]
pub async fn update_language(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<LanguageQuery>,
) -> Result<StatusCode> {
    let count = state.service.update_language(task_id, &query.language).await?;
    updated(task_id, count)
}

/// Remove one input document, or all of them when no name is given
#[tracing::instrument(skip(state))]
pub async fn remove_file(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<FileQuery>,
) -> Result<StatusCode> {
    match query.original_file_name.as_deref() {
        Some(name) if !name.is_empty() => state.service.remove_file(task_id, name).await?,
        _ => state.service.remove_all_files(task_id).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a task and its files
#[tracing::instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service.delete_task(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_defaults_configs() {
        let request: TaskAddRequest = serde_json::from_str(r#"{"name":"invoice-batch"}"#).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.ocr_config, OcrConfig::default());
        assert_eq!(request.scheduler_config, SchedulerConfig::default());
    }

    #[test]
    fn test_add_request_rejects_empty_name() {
        let request: TaskAddRequest = serde_json::from_str(r#"{"name":""}"#).unwrap();
        let err: AppError = request.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "name"));
    }

    #[test]
    fn test_add_request_reads_camel_case_config() {
        let request: TaskAddRequest = serde_json::from_str(
            r#"{"name":"x","ocrConfig":{"language":"deu","pageSegmentationMode":"MODE_7"}}"#,
        )
        .unwrap();
        assert_eq!(request.ocr_config.language, "deu");
        assert_eq!(
            request.ocr_config.page_segmentation_mode,
            ocrstudio_common::model::PageSegmentationMode::Mode7
        );
    }

    #[test]
    fn test_upload_response_shape() {
        let response: UploadDocumentResponse = Document::new("a.pdf", "r1").into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"randomizedFileName": "r1", "originalFileName": "a.pdf"}));
    }

    #[test]
    fn test_zero_updates_is_not_found() {
        let id = Uuid::new_v4();
        assert!(matches!(updated(id, 0), Err(AppError::MissingEntity { .. })));
        assert_eq!(updated(id, 1).unwrap(), StatusCode::NO_CONTENT);
    }
}
