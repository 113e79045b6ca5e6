//! Session/identity provider contract and the in-memory backend.
//!
//! Identity is observed through a `watch` channel rather than read from a
//! global handle, so components can tear their subscriptions down on every
//! sign-in/out transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;

use mahto_shared::constants::MIN_PASSWORD_LEN;
use mahto_shared::UserId;

/// Errors produced by the identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid phone number or password")]
    InvalidCredentials,

    #[error("An account already exists for this phone number")]
    AlreadyRegistered,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    /// The backend could not be reached (or its lock was poisoned).
    #[error("Identity service unavailable")]
    Unavailable,
}

/// The session/identity capability surface consumed by the client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current(&self) -> Option<UserId>;

    /// Observe identity changes. The receiver yields the current value
    /// immediately on first borrow.
    fn watch(&self) -> watch::Receiver<Option<UserId>>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    async fn sign_out(&self);
}

struct Account {
    uid: UserId,
    digest: String,
}

#[derive(Default)]
struct AuthInner {
    accounts: HashMap<String, Account>,
}

/// In-memory [`IdentityProvider`] used by tests and local development.
#[derive(Clone)]
pub struct MemoryIdentity {
    inner: Arc<Mutex<AuthInner>>,
    current_tx: Arc<watch::Sender<Option<UserId>>>,
    // Hold a receiver so the channel stays open even when no component is
    // actively subscribed; otherwise `send` fails and the value is lost.
    _keepalive: watch::Receiver<Option<UserId>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        let (current_tx, current_rx) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(AuthInner::default())),
            current_tx: Arc::new(current_tx),
            _keepalive: current_rx,
        }
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn credential_digest(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    fn current(&self) -> Option<UserId> {
        self.current_tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.current_tx.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let mut inner = self.inner.lock().map_err(|_| AuthError::Unavailable)?;
        if inner.accounts.contains_key(email) {
            return Err(AuthError::AlreadyRegistered);
        }
        let uid = UserId::generate();
        inner.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                digest: credential_digest(email, password),
            },
        );
        drop(inner);

        tracing::info!(user = %uid.short(), "account registered");
        let _ = self.current_tx.send(Some(uid.clone()));
        Ok(uid)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let inner = self.inner.lock().map_err(|_| AuthError::Unavailable)?;
        let account = inner
            .accounts
            .get(email)
            .ok_or(AuthError::InvalidCredentials)?;
        if account.digest != credential_digest(email, password) {
            return Err(AuthError::InvalidCredentials);
        }
        let uid = account.uid.clone();
        drop(inner);

        tracing::info!(user = %uid.short(), "signed in");
        let _ = self.current_tx.send(Some(uid.clone()));
        Ok(uid)
    }

    async fn sign_out(&self) {
        tracing::info!("signed out");
        let _ = self.current_tx.send(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_in_round_trip() {
        let auth = MemoryIdentity::new();
        let uid = auth.sign_up("919876543210@mahto.app", "secret1").await.unwrap();
        auth.sign_out().await;
        assert_eq!(auth.current(), None);

        let again = auth.sign_in("919876543210@mahto.app", "secret1").await.unwrap();
        assert_eq!(uid, again);
        assert_eq!(auth.current(), Some(uid));
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let auth = MemoryIdentity::new();
        auth.sign_up("a@mahto.app", "secret1").await.unwrap();
        assert_eq!(
            auth.sign_up("a@mahto.app", "other-pass").await,
            Err(AuthError::AlreadyRegistered)
        );
    }

    #[tokio::test]
    async fn wrong_password_rejected() {
        let auth = MemoryIdentity::new();
        auth.sign_up("a@mahto.app", "secret1").await.unwrap();
        assert_eq!(
            auth.sign_in("a@mahto.app", "nope").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn short_password_rejected() {
        let auth = MemoryIdentity::new();
        assert_eq!(
            auth.sign_up("a@mahto.app", "abc").await,
            Err(AuthError::WeakPassword)
        );
    }

    #[tokio::test]
    async fn watch_observes_transitions() {
        let auth = MemoryIdentity::new();
        let mut rx = auth.watch();
        assert_eq!(*rx.borrow_and_update(), None);

        let uid = auth.sign_up("a@mahto.app", "secret1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(uid));

        auth.sign_out().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
    }
}
