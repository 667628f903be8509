//! Orchestrator: validate → simulated latency → score → persist → report.
//!
//! Only one submission runs at a time per orchestrator; a second one while the
//! first is in flight is refused with `SubmitError::Busy`. Once started, a
//! submission always runs to completion and the caller gets the score and the
//! final persistence status together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SubmitError;
use crate::persist::{PersistOutcome, PersistenceCoordinator};
use crate::prediction::PredictionResult;
use crate::record::ClinicalInput;
use crate::scoring::{RiskEngine, RiskFactor};
use crate::session::SessionHandle;

/// Matches the delay the web form showed while "predicting".
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct Submission {
    pub result: PredictionResult,
    pub factors: Vec<RiskFactor>,
    pub persistence: PersistOutcome,
}

/// Flat view for rendering.
#[derive(Debug, Serialize)]
pub struct PersistenceStatus {
    pub status: String,
    pub message: &'static str,
}

impl From<&PersistOutcome> for PersistenceStatus {
    fn from(o: &PersistOutcome) -> Self {
        Self {
            status: o.status(),
            message: o.message(),
        }
    }
}

pub struct Orchestrator {
    engine: Mutex<RiskEngine>,
    persistence: PersistenceCoordinator,
    session: SessionHandle,
    latency: Duration,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    pub fn new(engine: RiskEngine, persistence: PersistenceCoordinator, session: SessionHandle) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            engine: Mutex::new(engine),
            persistence,
            session,
            latency: DEFAULT_LATENCY,
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// True while a submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn submit(&self, input: &ClinicalInput) -> Result<Submission, SubmitError> {
        let _busy = self.acquire()?;

        let record = input.validate()?;

        debug!(target: "orchestrator", latency_ms = self.latency.as_millis() as u64, "simulating model latency");
        tokio::time::sleep(self.latency).await;

        let score = self.engine.lock().score(&record);
        counter!("predictions_total", "diagnosis" => score.diagnosis.as_str()).increment(1);

        // Identity is read once, after scoring; the same snapshot attributes and gates the save.
        let session = self.session.snapshot();
        let owner = session.identity().map(str::to_string);
        let result = PredictionResult::new(&score, record, chrono::Utc::now(), owner);

        let persistence = self.persistence.persist(&result, &session).await;

        info!(
            target: "orchestrator",
            diagnosis = result.diagnosis().as_str(),
            risk_score = result.risk_score(),
            confidence = result.confidence(),
            persistence = %persistence.status(),
            "prediction completed"
        );

        Ok(Submission {
            result,
            factors: score.factors,
            persistence,
        })
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, SubmitError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SubmitError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::record::Gender;
    use crate::scoring::FixedRandom;
    use crate::session::SessionState;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn orchestrator(store: Arc<MemoryStore>, state: SessionState) -> Orchestrator {
        Orchestrator::new(
            RiskEngine::new(Box::new(FixedRandom(0.5))),
            PersistenceCoordinator::new(store, "app"),
            SessionHandle::fixed(state),
        )
        .with_latency(Duration::ZERO)
    }

    #[tokio::test]
    async fn missing_field_is_rejected_before_anything_runs() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            store.clone(),
            SessionState::Ready {
                identity: "u1".into(),
            },
        );
        let input = ClinicalInput {
            age: Some(40),
            gender: Gender::Male,
            albumin: Some(4.0),
            ..Default::default()
        };

        let err = orch.submit(&input).await.unwrap_err();
        assert_eq!(
            err,
            SubmitError::Validation(ValidationError::MissingFields(vec![
                "alkalinePhosphatase",
                "alt",
                "ast",
                "bilirubin"
            ]))
        );
        assert_eq!(store.attempts(), 0);
        assert!(!orch.is_busy(), "busy flag must be released on validation error");
    }

    #[tokio::test]
    async fn owner_matches_session_identity() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            store.clone(),
            SessionState::Ready {
                identity: "u1".into(),
            },
        );
        let input = ClinicalInput {
            age: Some(30),
            gender: Gender::Male,
            albumin: Some(4.0),
            alkaline_phosphatase: Some(100.0),
            alt: Some(20.0),
            ast: Some(20.0),
            bilirubin: Some(0.8),
        };

        let sub = orch.submit(&input).await.unwrap();
        assert_eq!(sub.result.owner_id(), Some("u1"));
        assert!(sub.factors.is_empty());
        assert!(matches!(sub.persistence, PersistOutcome::Saved { .. }));
        assert_eq!(store.attempts(), 1);
    }
}
