// src/store/mod.rs
//! Document store capability: append-only, partitioned by scope path.

pub mod file;
pub mod memory;

use std::fmt;

use anyhow::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

pub const DEFAULT_NAMESPACE: &str = "artifacts";
pub const PREDICTIONS_COLLECTION: &str = "predictions";

/// `{namespace}/{app_id}/users/{identity}/predictions`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopePath(String);

impl ScopePath {
    pub fn predictions(namespace: &str, app_id: &str, identity: &str) -> Self {
        Self(format!(
            "{}/{}/users/{}/{}",
            namespace, app_id, identity, PREDICTIONS_COLLECTION
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append one document under `scope`; returns the id the store assigned.
    async fn append(&self, scope: &ScopePath, doc: serde_json::Value) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// 20-char document id derived from content, scope and time.
pub(crate) fn document_id(scope: &ScopePath, body: &[u8], seq: u64) -> String {
    use sha2::{Digest, Sha256};

    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let mut h = Sha256::new();
    h.update(scope.as_str().as_bytes());
    h.update(body);
    h.update(seq.to_le_bytes());
    h.update(nanos.to_le_bytes());
    let hex = format!("{:x}", h.finalize());
    hex[..20].to_string()
}
