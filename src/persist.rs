//! Persistence coordinator.
//!
//! Gates the single store write for a prediction on the session state:
//! not ready or no identity means skip, otherwise append once and report.
//! No retries, no updates, no deletes.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PersistenceError;
use crate::prediction::PredictionResult;
use crate::session::SessionState;
use crate::store::{DocumentStore, ScopePath, DEFAULT_NAMESPACE};

/// Why nothing was written. Rendered the same to the user, kept apart here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Bootstrapping has not finished.
    NotReady,
    /// Sign-in failed earlier; the session runs without identity.
    AuthFailed { error: String },
    /// Ready but signed out.
    NoIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved { document_id: String },
    Skipped(SkipReason),
    Failed(PersistenceError),
}

impl PersistOutcome {
    /// `Saved` / `Skipped` / `Failed: <reason>`
    pub fn status(&self) -> String {
        match self {
            PersistOutcome::Saved { .. } => "Saved".to_string(),
            PersistOutcome::Skipped(_) => "Skipped".to_string(),
            PersistOutcome::Failed(e) => format!("Failed: {}", e),
        }
    }

    /// Longer message for display next to the result.
    pub fn message(&self) -> &'static str {
        match self {
            PersistOutcome::Saved { .. } => "Prediction saved successfully!",
            PersistOutcome::Skipped(_) => {
                "Prediction not saved (authentication/storage not ready)."
            }
            PersistOutcome::Failed(_) => "Failed to save prediction.",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            PersistOutcome::Saved { .. } => "saved",
            PersistOutcome::Skipped(_) => "skipped",
            PersistOutcome::Failed(_) => "failed",
        }
    }
}

pub struct PersistenceCoordinator {
    store: Arc<dyn DocumentStore>,
    namespace: String,
    app_id: String,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, app_id: impl Into<String>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            app_id: app_id.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn scope_for(&self, identity: &str) -> ScopePath {
        ScopePath::predictions(&self.namespace, &self.app_id, identity)
    }

    /// Attempt exactly one write of `result`, attributed to the session identity.
    pub async fn persist(&self, result: &PredictionResult, session: &SessionState) -> PersistOutcome {
        let outcome = match gate(session) {
            Err(reason) => {
                warn!(target: "persist", reason = ?reason, "storage not ready or user not authenticated, skipping save");
                PersistOutcome::Skipped(reason)
            }
            Ok(identity) => self.write_once(result, identity).await,
        };
        counter!("persistence_outcomes_total", "outcome" => outcome.metric_label()).increment(1);
        outcome
    }

    async fn write_once(&self, result: &PredictionResult, identity: &str) -> PersistOutcome {
        let scope = self.scope_for(identity);
        let doc = match serde_json::to_value(result.owned_by(identity)) {
            Ok(v) => v,
            Err(e) => return PersistOutcome::Failed(PersistenceError(e.to_string())),
        };

        match self.store.append(&scope, doc).await {
            Ok(document_id) => {
                info!(target: "persist", store = self.store.name(), scope = %scope, document_id = %document_id, "prediction saved");
                PersistOutcome::Saved { document_id }
            }
            Err(e) => {
                let err = PersistenceError::from(e);
                warn!(target: "persist", store = self.store.name(), scope = %scope, error = %err, "error saving prediction");
                PersistOutcome::Failed(err)
            }
        }
    }
}

fn gate(session: &SessionState) -> Result<&str, SkipReason> {
    if !session.is_ready() {
        return Err(SkipReason::NotReady);
    }
    if let Some(err) = session.failure() {
        return Err(SkipReason::AuthFailed {
            error: err.to_string(),
        });
    }
    session.identity().ok_or(SkipReason::NoIdentity)
}
