//! OCR configuration discovery

use axum::Json;
use ocrstudio_common::service::{self, FileFormatOption, ModeOption};

pub async fn engine_modes() -> Json<Vec<ModeOption>> {
    Json(service::ocr_engine_modes())
}

pub async fn page_segmentation_modes() -> Json<Vec<ModeOption>> {
    Json(service::page_segmentation_modes())
}

pub async fn file_formats() -> Json<Vec<FileFormatOption>> {
    Json(service::file_formats())
}
