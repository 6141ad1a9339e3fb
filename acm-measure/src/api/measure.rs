//! POST /measure: start a measurement task

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::measure::{MeasurementJob, MeasurementOptions};
use crate::tasks::TaskState;
use crate::AppState;

/// POST /measure request
#[derive(Debug, Deserialize)]
pub struct MeasureRequest {
    /// Task name; an active task with the same name is cancelled
    #[serde(default = "default_task_name")]
    pub name: String,
    /// Input CSV file name inside the uploads directory
    pub input: String,
    pub options: MeasurementOptions,
}

fn default_task_name() -> String {
    "measurement".to_string()
}

/// POST /measure response
#[derive(Debug, Serialize)]
pub struct MeasureResponse {
    pub task_id: Uuid,
    pub name: String,
    pub state: TaskState,
}

/// POST /measure
///
/// Validates the options, claims the upload under a unique name, then runs
/// the measurement as a background task. The claimed input is deleted when
/// the task finishes; the output CSV is
/// fetched with `GET /tasks/:id/result`.
pub async fn start_measurement(
    State(state): State<AppState>,
    Json(request): Json<MeasureRequest>,
) -> ApiResult<(StatusCode, Json<MeasureResponse>)> {
    let file_name = Path::new(&request.input)
        .file_name()
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid input file name: {}", request.input)))?;
    let input = state.uploads_dir.join(file_name);
    if !input.is_file() {
        return Err(ApiError::BadRequest(format!(
            "Input file does not exist: {}",
            request.input
        )));
    }
    request.options.validate()?;

    // The task owns and deletes only this renamed copy
    let claimed = state
        .uploads_dir
        .join(format!(".measure-{}.csv", Uuid::new_v4()));
    tokio::fs::rename(&input, &claimed).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::BadRequest(format!("Input file does not exist: {}", request.input))
        } else {
            ApiError::Io(e)
        }
    })?;
    let input = claimed;

    let options = request.options;
    let defaults = state.defaults.clone();
    let attributes = state.attributes.clone();
    let media = state.media.clone();
    let runner = state.runner.clone();
    let results_dir = state.results_dir.clone();

    let handle = state
        .registry
        .start(request.name, move |ctx| async move {
            let job = MeasurementJob {
                input,
                output: results_dir.join(format!("{}.csv", ctx.id())),
                options,
                defaults,
                attributes,
                media,
                runner,
            };
            let summary = job
                .run(&ctx)
                .await
                .map_err(|e| anyhow::anyhow!(e.terminal_line()))?;
            tracing::info!(
                task_id = %ctx.id(),
                rows = summary.rows_written,
                batches = summary.batches,
                praat_runs = summary.praat_runs,
                cancelled = summary.cancelled,
                "Measurement complete"
            );
            Ok(())
        })
        .await;

    tracing::info!(task_id = %handle.id(), name = %handle.name(), "Measurement task started");

    Ok((
        StatusCode::ACCEPTED,
        Json(MeasureResponse {
            task_id: handle.id(),
            name: handle.name().to_string(),
            state: handle.state(),
        }),
    ))
}

/// Build measurement routes
pub fn measure_routes() -> Router<AppState> {
    Router::new().route("/measure", post(start_measurement))
}
