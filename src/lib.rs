// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod persist;
pub mod prediction;
pub mod record;
pub mod scoring;
pub mod session;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{AuthError, PersistenceError, SubmitError, ValidationError};
pub use crate::orchestrator::{Orchestrator, Submission};
pub use crate::persist::{PersistOutcome, PersistenceCoordinator, SkipReason};
pub use crate::prediction::{Diagnosis, PredictionResult};
pub use crate::record::{ClinicalInput, ClinicalRecord, Gender};
pub use crate::scoring::{RandomSource, RiskEngine};
pub use crate::session::{Session, SessionHandle, SessionState};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::{AuthProvider, LocalAuthProvider};
use crate::config::{AppConfig, StoreConfig};
use crate::store::{DocumentStore, FileStore, MemoryStore};

/// The running core: one session plus the orchestrator that uses it.
pub struct Service {
    session: Session,
    orchestrator: Arc<Orchestrator>,
}

impl Service {
    /// Wire the service from config with the local auth provider and the
    /// configured store. Must be called inside a tokio runtime.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut provider = match &cfg.auth.initial_identity {
            Some(id) => LocalAuthProvider::with_identity(id.clone()),
            None => LocalAuthProvider::new(),
        };
        provider = provider.allow_anonymous(cfg.auth.allow_anonymous);

        let store: Arc<dyn DocumentStore> = match &cfg.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File { dir } => Arc::new(FileStore::new(dir.clone())),
        };
        info!(store = store.name(), app_id = %cfg.app_id, "storage configured");

        Self::with_parts(cfg, Arc::new(provider), store, RiskEngine::from_os_rng())
    }

    /// Wire the service from explicit collaborators.
    pub fn with_parts(
        cfg: &AppConfig,
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        engine: RiskEngine,
    ) -> Self {
        let session = Session::start(provider);
        let persistence = PersistenceCoordinator::new(store, cfg.app_id.clone())
            .with_namespace(cfg.namespace.clone());
        let orchestrator = Orchestrator::new(engine, persistence, session.handle())
            .with_latency(Duration::from_millis(cfg.latency_ms));
        Self {
            session,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.session.handle()
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// HTTP router over this service.
    pub fn router(&self, metrics: Option<&crate::metrics::Metrics>) -> axum::Router {
        api::router(api::AppState::new(self.orchestrator()), metrics)
    }

    /// Cancel the identity subscription. Returns the final session state.
    pub async fn shutdown(self) -> SessionState {
        self.session.shutdown().await
    }
}
