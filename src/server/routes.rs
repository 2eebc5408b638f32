use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use crate::error::Error;
use crate::models::RunRecord;
use crate::pipeline::PipelineContext;

const NO_FILE: &str = "Нет файла";
const NO_FILE_SELECTED: &str = "Файл не выбран";
const REPORT_FAILED: &str =
    "Не удалось создать отчёт. Проверьте наличие шрифта DejaVu и права записи.";
const HISTORY_UNREADABLE: &str =
    "Не удалось создать отчёт: журнал истории повреждён или недоступен.";

pub(super) fn routes() -> Router<Arc<PipelineContext>> {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/report", get(report))
        .route("/history", get(history))
}

/// Plain-text error answer.
pub(super) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !e.is_client_error() {
            error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    input_image: String,
    output_image: String,
    detected_count: usize,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn process(
    State(ctx): State<Arc<PipelineContext>>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(&e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(&e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request(NO_FILE))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request(NO_FILE_SELECTED));
    }

    let outcome = ctx.process_upload(&filename, bytes.to_vec()).await?;
    Ok(Json(ProcessResponse {
        input_image: file_name(&outcome.input_image),
        output_image: file_name(&outcome.output_image),
        detected_count: outcome.detected_count,
    }))
}

async fn report(State(ctx): State<Arc<PipelineContext>>) -> Response {
    let generated = match ctx.generate_report().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "report generation failed");
            let message = match e {
                Error::Persistence { .. } => HISTORY_UNREADABLE,
                _ => REPORT_FAILED,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
        }
    };
    match tokio::fs::read(&generated.path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name(&generated.path)),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, path = ?generated.path, "cannot read generated report");
            (StatusCode::INTERNAL_SERVER_ERROR, REPORT_FAILED).into_response()
        }
    }
}

async fn history(
    State(ctx): State<Arc<PipelineContext>>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    Ok(Json(ctx.history().read_all().await?))
}
