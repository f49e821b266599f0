//! Task analytics handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use ocrstudio_common::{errors::Result, model::StatusCount};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageResponse {
    pub average_in_documents: f64,
}

pub async fn count_by_status(State(state): State<AppState>) -> Result<Json<Vec<StatusCount>>> {
    Ok(Json(state.service.count_by_status().await?))
}

pub async fn average_in_documents(State(state): State<AppState>) -> Result<Json<AverageResponse>> {
    let average_in_documents = state.service.average_in_documents().await?;
    Ok(Json(AverageResponse { average_in_documents }))
}
