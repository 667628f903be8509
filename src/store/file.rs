// src/store/file.rs
//! NDJSON-backed store: one file per scope, one line per document.
//!
//! `artifacts/app/users/u1/predictions` is written to
//! `<root>/artifacts/app/users/u1/predictions.ndjson`. Files are only ever
//! opened in append mode.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{document_id, DocumentStore, ScopePath};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    seq: AtomicU64,
    write_lock: Mutex<()>,
}

#[derive(Serialize)]
struct Line<'a> {
    id: &'a str,
    doc: &'a serde_json::Value,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// File backing `scope`. Rejects segments that could escape the root.
    pub fn path_for(&self, scope: &ScopePath) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for seg in scope.segments() {
            if seg.is_empty()
                || seg == "."
                || seg == ".."
                || seg.contains(['\\', ':', '\0'])
            {
                bail!("invalid scope segment {:?} in {}", seg, scope);
            }
            path.push(seg);
        }
        path.set_extension("ndjson");
        Ok(path)
    }
}

#[async_trait::async_trait]
impl DocumentStore for FileStore {
    async fn append(&self, scope: &ScopePath, doc: serde_json::Value) -> Result<String> {
        let path = self.path_for(scope)?;
        let body = serde_json::to_vec(&doc).context("serializing document")?;
        let id = document_id(scope, &body, self.seq.fetch_add(1, Ordering::SeqCst));

        let mut line = serde_json::to_vec(&Line { id: &id, doc: &doc })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        f.write_all(&line)
            .await
            .with_context(|| format!("appending to {}", path.display()))?;
        f.flush().await?;

        Ok(id)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn appends_lines_under_scope_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let scope = ScopePath::predictions("artifacts", "app", "uid1");

        let id1 = store.append(&scope, json!({"riskScore": 12.5})).await.unwrap();
        let id2 = store.append(&scope, json!({"riskScore": 80.0})).await.unwrap();
        assert_ne!(id1, id2);

        let path = tmp.path().join("artifacts/app/users/uid1/predictions.ndjson");
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], json!(id1));
        assert_eq!(lines[1]["doc"]["riskScore"], json!(80.0));
    }

    #[test]
    fn traversal_segments_are_rejected() {
        let store = FileStore::new("/tmp/store");
        let scope = ScopePath::predictions("artifacts", "app", "..");
        assert!(store.path_for(&scope).is_err());
    }
}
