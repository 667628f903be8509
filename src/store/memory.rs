// src/store/memory.rs
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use parking_lot::Mutex;

use super::{document_id, DocumentStore, ScopePath};

/// In-process store. Used by default and in tests.
///
/// `failing` makes every append return an error, which is how persistence
/// failures are exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<ScopePath, Vec<(String, serde_json::Value)>>>,
    seq: AtomicU64,
    fail_with: Option<String>,
    attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Every append call, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn documents(&self, scope: &ScopePath) -> Vec<(String, serde_json::Value)> {
        self.docs.lock().get(scope).cloned().unwrap_or_default()
    }

    pub fn total_documents(&self) -> usize {
        self.docs.lock().values().map(Vec::len).sum()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn append(&self, scope: &ScopePath, doc: serde_json::Value) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_with {
            bail!("{}", reason);
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let id = document_id(scope, doc.to_string().as_bytes(), seq);
        self.docs
            .lock()
            .entry(scope.clone())
            .or_default()
            .push((id.clone(), doc));
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
