// src/auth/mod.rs
//! Auth provider capability.
//!
//! The session only needs two things from an identity backend: a way to sign
//! in anonymously and a stream of identity changes. Identity changes are
//! delivered through a `watch` channel; the current value is visible right
//! after subscribing, mirroring how auth SDKs fire the listener once on attach.

pub mod local;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;

pub use local::LocalAuthProvider;

/// Opaque user identity assigned by the provider.
pub type Identity = String;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Request an anonymous identity. On success the new identity is also
    /// published to subscribers.
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    /// Subscribe to identity changes (`None` == signed out).
    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>>;

    fn name(&self) -> &'static str;
}
