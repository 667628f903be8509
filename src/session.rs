//! Session bootstrapper.
//!
//! One `Session` is created at startup. It subscribes to the auth provider,
//! signs in anonymously when no identity exists, and publishes a single tagged
//! state that the rest of the app observes through cheap `SessionHandle`s.
//!
//! ```text
//! Uninitialized -> Authenticating -> Ready(identity)
//!                                 -> Degraded(auth error)   (ready, no identity)
//! ```
//!
//! The subscription runs in a background task and is cancelled by
//! `Session::shutdown`; after that no further state changes are published.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthProvider, Identity};
use crate::error::AuthError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Authenticating,
    Ready {
        identity: Identity,
    },
    /// Sign-in failed. Still counts as ready so the app keeps working,
    /// but there is no identity and nothing gets saved.
    Degraded {
        reason: AuthError,
    },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            SessionState::Ready { .. } | SessionState::Degraded { .. }
        )
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            SessionState::Ready { identity } => Some(identity),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&AuthError> {
        match self {
            SessionState::Degraded { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready { .. } => "ready",
            SessionState::Degraded { .. } => "degraded",
        }
    }
}

/// Read-only view of the session state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// A handle frozen at `state`, with no bootstrapper behind it.
    pub fn fixed(state: SessionState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_ready()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.rx.borrow().identity().map(str::to_string)
    }

    /// Wait until bootstrapping finished (Ready or Degraded).
    /// If the bootstrapper is gone first, returns whatever state it left.
    pub async fn wait_ready(&self) -> SessionState {
        let mut rx = self.rx.clone();
        if let Ok(state) = rx.wait_for(SessionState::is_ready).await {
            return state.clone();
        }
        let last = rx.borrow().clone();
        last
    }
}

/// Cancellable identity-change listener.
/// Dropping it aborts the listener; `cancel` stops it and waits for it to finish.
#[derive(Debug)]
pub struct IdentitySubscription {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl IdentitySubscription {
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(target: "session", error = %e, "identity listener ended abnormally");
            }
        }
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct Session {
    handle: SessionHandle,
    subscription: IdentitySubscription,
}

impl Session {
    /// Start bootstrapping against `provider`. Must be called inside a tokio runtime.
    pub fn start(provider: Arc<dyn AuthProvider>) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Uninitialized);
        let identities = provider.on_identity_change();

        state_tx.send_replace(SessionState::Authenticating);
        info!(target: "session", provider = provider.name(), "session bootstrapping");

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(listen(provider, identities, state_tx, cancel_rx));

        Self {
            handle: SessionHandle { rx: state_rx },
            subscription: IdentitySubscription {
                cancel: Some(cancel_tx),
                task: Some(task),
            },
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Unsubscribe from the provider and return the final state.
    pub async fn shutdown(self) -> SessionState {
        self.subscription.cancel().await;
        let last = self.handle.snapshot();
        info!(target: "session", state = last.as_str(), "session torn down");
        last
    }
}

async fn listen(
    provider: Arc<dyn AuthProvider>,
    mut identities: watch::Receiver<Option<Identity>>,
    state: watch::Sender<SessionState>,
    mut cancel: oneshot::Receiver<()>,
) {
    loop {
        let current = identities.borrow_and_update().clone();
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = apply_identity(provider.as_ref(), current, &state) => {}
        }

        tokio::select! {
            biased;
            _ = &mut cancel => break,
            changed = identities.changed() => {
                if changed.is_err() {
                    debug!(target: "session", "auth provider closed its identity channel");
                    break;
                }
            }
        }
    }
}

async fn apply_identity(
    provider: &dyn AuthProvider,
    current: Option<Identity>,
    state: &watch::Sender<SessionState>,
) {
    let next = match current {
        Some(identity) => SessionState::Ready { identity },
        None => {
            set_state(state, SessionState::Authenticating);
            match provider.sign_in_anonymously().await {
                Ok(identity) => SessionState::Ready { identity },
                Err(reason) => {
                    warn!(target: "session", error = %reason, "anonymous sign-in failed; continuing without identity");
                    SessionState::Degraded { reason }
                }
            }
        }
    };
    if let SessionState::Ready { identity } = &next {
        info!(target: "session", identity = %identity, "session ready");
    }
    set_state(state, next);
}

/// Publish only real transitions so watchers are not woken for repeats.
fn set_state(tx: &watch::Sender<SessionState>, next: SessionState) {
    tx.send_if_modified(|cur| {
        if *cur == next {
            false
        } else {
            *cur = next;
            true
        }
    });
}
