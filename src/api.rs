//! HTTP surface: the submit action of the prediction form plus session/health probes.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::SubmitError;
use crate::metrics::Metrics;
use crate::orchestrator::{Orchestrator, PersistenceStatus};
use crate::prediction::PredictionResult;
use crate::record::ClinicalInput;
use crate::scoring::RiskFactor;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Build the router. `/metrics` is mounted only when a recorder was installed.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/session", get(session_info))
        .route("/predict", post(predict));
    if let Some(m) = metrics {
        r = r.merge(m.router::<AppState>());
    }
    r.layer(CorsLayer::very_permissive()).with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        let status = match e {
            SubmitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SubmitError::Busy => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct FactorOut {
    factor: RiskFactor,
    weight: f64,
    description: &'static str,
}

#[derive(Serialize)]
struct PredictResp {
    result: PredictionResult,
    label: &'static str,
    factors: Vec<FactorOut>,
    persistence: PersistenceStatus,
}

/// The submission runs on its own task so a dropped connection cannot cancel
/// it between scoring and the store write.
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<ClinicalInput>, JsonRejection>,
) -> Result<Json<PredictResp>, ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        tracing::info!(target: "api", error = %rejection, "malformed prediction body");
        ApiError::from(rejection)
    })?;

    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome = tokio::spawn(async move { orchestrator.submit(&input).await })
        .await
        .map_err(|e| {
            tracing::error!(target: "api", error = %e, "prediction task failed");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "prediction task failed".to_string(),
            }
        })?;
    let sub = outcome.map_err(|e| {
        tracing::info!(target: "api", error = %e, "prediction rejected");
        ApiError::from(e)
    })?;

    let factors = sub
        .factors
        .iter()
        .map(|f| FactorOut {
            factor: *f,
            weight: f.weight(),
            description: f.describe(),
        })
        .collect();

    Ok(Json(PredictResp {
        label: sub.result.diagnosis().label(),
        persistence: PersistenceStatus::from(&sub.persistence),
        factors,
        result: sub.result,
    }))
}

#[derive(Serialize)]
struct SessionOut {
    state: &'static str,
    ready: bool,
    identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    busy: bool,
}

async fn session_info(State(state): State<AppState>) -> Json<SessionOut> {
    let snap = state.orchestrator.session().snapshot();
    Json(SessionOut {
        state: snap.as_str(),
        ready: snap.is_ready(),
        identity: snap.identity().map(str::to_string),
        error: snap.failure().map(ToString::to_string),
        busy: state.orchestrator.is_busy(),
    })
}
