use super::error::ApiError;
use crate::application::{JobOrchestrator, PlotRequest};
use crate::domain::error::JobError;
use crate::domain::jobs::{JobConfig, JobSnapshot};
use crate::ports::notify::ProgressSnapshot;
use crate::ports::process::ProcessLauncher;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

type Shared<L> = State<Arc<JobOrchestrator<L>>>;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub config: JobConfig,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SubmitResult {
    pub file: PathBuf,
    pub accepted: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlotBody {
    pub file: PathBuf,
    pub plot_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    file: PathBuf,
}

pub fn router<L>(orchestrator: Arc<JobOrchestrator<L>>) -> Router
where
    L: ProcessLauncher + 'static,
{
    Router::new()
        .route(
            "/jobs",
            post(submit::<L>).get(list::<L>).delete(clear::<L>),
        )
        .route("/jobs/status", get(status::<L>))
        .route("/jobs/plot", post(plot::<L>))
        .route("/progress", get(progress::<L>))
        .with_state(orchestrator)
}

async fn submit<L>(
    State(orchestrator): Shared<L>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<Vec<SubmitResult>>, ApiError>
where
    L: ProcessLauncher + 'static,
{
    let results = orchestrator
        .submit_all(&request.files, &request.config)?
        .into_iter()
        .map(|(file, result)| match result {
            Ok(_) => SubmitResult {
                file,
                accepted: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(file = %file.display(), "submission rejected: {}", e);
                SubmitResult {
                    file,
                    accepted: false,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();
    Ok(Json(results))
}

async fn list<L>(State(orchestrator): Shared<L>) -> Json<Vec<JobSnapshot>>
where
    L: ProcessLauncher + 'static,
{
    Json(orchestrator.snapshots())
}

async fn status<L>(
    State(orchestrator): Shared<L>,
    Query(query): Query<FileQuery>,
) -> Result<Json<JobSnapshot>, ApiError>
where
    L: ProcessLauncher + 'static,
{
    orchestrator
        .snapshot(&query.file)
        .map(Json)
        .ok_or(ApiError(JobError::UnknownJob(query.file)))
}

async fn plot<L>(
    State(orchestrator): Shared<L>,
    Json(body): Json<PlotBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError>
where
    L: ProcessLauncher + 'static,
{
    let response = match orchestrator.request_plot(&body.file, &body.plot_dir)? {
        PlotRequest::Started => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "plot": "started" })),
        ),
        PlotRequest::AlreadyRequested => (
            StatusCode::OK,
            Json(serde_json::json!({ "plot": "already_requested" })),
        ),
    };
    Ok(response)
}

async fn progress<L>(State(orchestrator): Shared<L>) -> Json<ProgressSnapshot>
where
    L: ProcessLauncher + 'static,
{
    Json(orchestrator.aggregator().snapshot())
}

async fn clear<L>(State(orchestrator): Shared<L>) -> Json<serde_json::Value>
where
    L: ProcessLauncher + 'static,
{
    let removed = orchestrator.clear();
    Json(serde_json::json!({ "removed": removed }))
}
