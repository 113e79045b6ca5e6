//! Application bootstrap: wires the store and identity provider into the
//! client components.

use std::sync::Arc;

use mahto_store::{DocumentStore, IdentityProvider, MemoryIdentity, MemoryStore};

use crate::config::ClientConfig;
use crate::directory::ConversationDirectory;
use crate::listings::PropertyCatalog;
use crate::profile::ProfileMirror;
use crate::session::Session;
use crate::thread::MessageThread;

/// The assembled application core.
///
/// Owns the profile mirror's background task; dropping the app tears it
/// down along with every handle-owned subscription.
pub struct MahtoApp {
    pub session: Session,
    pub profile: ProfileMirror,
    pub directory: ConversationDirectory,
    pub threads: MessageThread,
    pub catalog: PropertyCatalog,
}

impl MahtoApp {
    /// Wire the components against the given backends.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: ClientConfig,
    ) -> Self {
        let session = Session::new(identity, store.clone());
        let profile = ProfileMirror::spawn(store.clone(), session.clone());
        let directory = ConversationDirectory::new(store.clone(), &config);
        let threads = MessageThread::new(store.clone(), session.clone(), &config);
        let catalog = PropertyCatalog::new(store, session.clone(), &config);

        tracing::info!("client assembled");
        Self {
            session,
            profile,
            directory,
            threads,
            catalog,
        }
    }

    /// Fully in-memory instance for tests and local development.
    pub fn in_memory(config: ClientConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentity::new()),
            config,
        )
    }
}
