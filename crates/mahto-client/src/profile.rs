//! Mirror of the signed-in user's profile document.
//!
//! A background task follows identity transitions: while a user is signed
//! in it holds exactly one live subscription to their `users/{uid}`
//! document and republishes every snapshot; signed out it publishes the
//! guest snapshot. The previous subscription is always dropped before a
//! new one is attached.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mahto_store::schema::{profile_patch_writes, user_profile_from_doc, USERS};
use mahto_store::{DocumentStore, ProfilePatch, UserProfile};

use crate::session::Session;

/// What the UI renders in the profile corner: the mirrored profile fields
/// plus the login flag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub avatar: Option<String>,
    pub logged_in: bool,
}

impl ProfileSnapshot {
    /// The snapshot published while nobody is signed in.
    pub fn guest() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            avatar: None,
            logged_in: false,
        }
    }

    fn from_profile(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            address: profile.address.clone(),
            avatar: profile.avatar.clone(),
            logged_in: true,
        }
    }

    fn merge(&mut self, patch: &ProfilePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(address) = &patch.address {
            self.address = address.clone();
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar = Some(avatar.clone());
        }
    }
}

/// Local read-model of "who is logged in and what do they look like".
pub struct ProfileMirror {
    session: Session,
    store: Arc<dyn DocumentStore>,
    snapshot_tx: Arc<watch::Sender<ProfileSnapshot>>,
    task: JoinHandle<()>,
}

impl ProfileMirror {
    /// Spawn the mirror task. It runs until the mirror is dropped.
    pub fn spawn(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        let (snapshot_tx, _) = watch::channel(ProfileSnapshot::guest());
        let snapshot_tx = Arc::new(snapshot_tx);

        let task = tokio::spawn(run_mirror(
            store.clone(),
            session.watch(),
            snapshot_tx.clone(),
        ));

        Self {
            session,
            store,
            snapshot_tx,
            task,
        }
    }

    /// Observe the mirrored snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Merge an edit into the local snapshot immediately, then push it to
    /// the store.
    ///
    /// Signed out, the write is skipped and only local state changes. A
    /// failed remote write is logged and the optimistic merge is kept;
    /// the next store-driven snapshot re-synchronises the mirror.
    pub async fn update(&self, patch: ProfilePatch) {
        if patch.is_empty() {
            return;
        }

        self.snapshot_tx.send_modify(|snapshot| snapshot.merge(&patch));

        let Some(uid) = self.session.current() else {
            debug!("profile edit while signed out, keeping local state only");
            return;
        };

        if let Err(e) = self
            .store
            .update(USERS, uid.as_str(), profile_patch_writes(&patch))
            .await
        {
            warn!(user = %uid.short(), error = %e, "profile write failed, local state kept");
        }
    }
}

impl Drop for ProfileMirror {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_mirror(
    store: Arc<dyn DocumentStore>,
    mut identity_rx: watch::Receiver<Option<mahto_shared::UserId>>,
    snapshot_tx: Arc<watch::Sender<ProfileSnapshot>>,
) {
    loop {
        let current = identity_rx.borrow_and_update().clone();
        match current {
            None => {
                snapshot_tx.send_replace(ProfileSnapshot::guest());
                if identity_rx.changed().await.is_err() {
                    return;
                }
            }
            Some(uid) => {
                let mut sub = match store.subscribe_doc(USERS, uid.as_str()).await {
                    Ok(sub) => sub,
                    Err(e) => {
                        warn!(user = %uid.short(), error = %e, "profile subscription failed");
                        if identity_rx.changed().await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                loop {
                    tokio::select! {
                        changed = identity_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            // Drop the old subscription before attaching
                            // the next one.
                            break;
                        }
                        snapshot = sub.next() => {
                            match snapshot {
                                Some(Some(doc)) => {
                                    let profile = user_profile_from_doc(&doc);
                                    snapshot_tx.send_replace(ProfileSnapshot::from_profile(&profile));
                                }
                                Some(None) => {
                                    debug!(user = %uid.short(), "profile document missing");
                                }
                                None => {
                                    warn!(user = %uid.short(), "profile stream ended");
                                    if identity_rx.changed().await.is_err() {
                                        return;
                                    }
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
