// src/auth/local.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use super::{AuthProvider, Identity};
use crate::error::AuthError;

/// Length of generated anonymous ids (same as typical hosted-auth uids).
const UID_LEN: usize = 28;

/// In-process identity provider.
///
/// Anonymous sign-in mints a random-looking uid from a SHA-256 digest of the
/// current time, process id and a counter. It can be told to refuse anonymous
/// sign-in, which is how a degraded session is exercised locally.
#[derive(Debug)]
pub struct LocalAuthProvider {
    current: watch::Sender<Option<Identity>>,
    allow_anonymous: AtomicBool,
    minted: AtomicU64,
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthProvider {
    /// No identity yet; anonymous sign-in allowed.
    pub fn new() -> Self {
        Self {
            current: watch::Sender::new(None),
            allow_anonymous: AtomicBool::new(true),
            minted: AtomicU64::new(0),
        }
    }

    /// Start already signed in as `identity`.
    pub fn with_identity(identity: impl Into<Identity>) -> Self {
        let p = Self::new();
        p.current.send_replace(Some(identity.into()));
        p
    }

    /// Toggle whether anonymous sign-in succeeds.
    pub fn allow_anonymous(self, allow: bool) -> Self {
        self.allow_anonymous.store(allow, Ordering::SeqCst);
        self
    }

    /// Replace the current identity (external sign-in / sign-out).
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Live subscriptions; drops to zero once every session has shut down.
    pub fn subscriber_count(&self) -> usize {
        self.current.receiver_count()
    }

    fn mint_uid(&self) -> Identity {
        let n = self.minted.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(n.to_le_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..UID_LEN].to_string()
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        if !self.allow_anonymous.load(Ordering::SeqCst) {
            return Err(AuthError::AnonymousDisabled);
        }
        let uid = self.mint_uid();
        self.current.send_replace(Some(uid.clone()));
        Ok(uid)
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
