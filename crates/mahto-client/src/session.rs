//! Explicit session value over the identity provider.
//!
//! Identity is never read from a hidden global: components hold a
//! [`Session`] and either ask for the current user or watch transitions.
//! Sign-up derives the virtual email from the phone number and seeds the
//! user's profile document in the same flow.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use mahto_shared::{virtual_email, UserId};
use mahto_store::schema::{new_user_writes, USERS};
use mahto_store::{DocumentStore, IdentityProvider};

use crate::error::{ClientError, Result};

/// Handle to the signed-in identity plus the store it writes through.
#[derive(Clone)]
pub struct Session {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl Session {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { identity, store }
    }

    /// The signed-in user, if any.
    pub fn current(&self) -> Option<UserId> {
        self.identity.current()
    }

    /// Observe sign-in/out transitions.
    pub fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.identity.watch()
    }

    /// The signed-in user, or `NotSignedIn`.
    pub fn require(&self) -> Result<UserId> {
        self.current().ok_or(ClientError::NotSignedIn)
    }

    /// Register a new account and seed its `users/{uid}` profile document.
    pub async fn sign_up(
        &self,
        country_code: &str,
        phone: &str,
        password: &str,
        name: &str,
    ) -> Result<UserId> {
        let email = virtual_email(country_code, phone);
        let uid = self.identity.sign_up(&email, password).await?;

        // Seeding is idempotent so an interrupted sign-up can be retried.
        self.store
            .create_if_absent(USERS, uid.as_str(), new_user_writes(name, phone, &email))
            .await?;

        info!(user = %uid.short(), "account created");
        Ok(uid)
    }

    pub async fn sign_in(&self, country_code: &str, phone: &str, password: &str) -> Result<UserId> {
        let email = virtual_email(country_code, phone);
        let uid = self.identity.sign_in(&email, password).await?;
        Ok(uid)
    }

    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mahto_store::schema::user_profile_from_doc;
    use mahto_store::{MemoryIdentity, MemoryStore};

    fn session() -> (Session, MemoryStore) {
        let store = MemoryStore::new();
        let session = Session::new(
            Arc::new(MemoryIdentity::new()),
            Arc::new(store.clone()),
        );
        (session, store)
    }

    #[tokio::test]
    async fn sign_up_seeds_profile_document() {
        let (session, store) = session();
        let uid = session
            .sign_up("+91", "9876543210", "secret1", "Asha")
            .await
            .unwrap();

        let doc = store.get(USERS, uid.as_str()).await.unwrap().unwrap();
        let profile = user_profile_from_doc(&doc);
        assert_eq!(profile.name, "Asha");
        assert_eq!(profile.phone, "9876543210");
        assert_eq!(profile.email, "919876543210@mahto.app");
        assert_eq!(session.current(), Some(uid));
    }

    #[tokio::test]
    async fn require_fails_signed_out() {
        let (session, _) = session();
        assert!(matches!(session.require(), Err(ClientError::NotSignedIn)));
    }

    #[tokio::test]
    async fn sign_in_uses_the_virtual_email() {
        let (session, _) = session();
        let uid = session
            .sign_up("+91", "9876543210", "secret1", "Asha")
            .await
            .unwrap();
        session.sign_out().await;

        let again = session.sign_in("91", "9876543210", "secret1").await.unwrap();
        assert_eq!(uid, again);
    }
}
