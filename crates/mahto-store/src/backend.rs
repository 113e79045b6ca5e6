//! The document-store contract.
//!
//! The hosted platform and the in-memory backend both implement
//! [`DocumentStore`]. Subscriptions deliver the *entire* matching result
//! set on every change, never a diff, and unsubscribe when their handle is
//! dropped.
//!
//! Nested collections are addressed by path, e.g.
//! `conversations/{id}/messages`.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;

use mahto_shared::constants::AUTO_ID_LEN;

use crate::error::Result;
use crate::query::Query;
use crate::value::{Document, WriteFields};

/// Generate a store-style random document id (20 alphanumeric chars).
///
/// Ids are generated client-side so a batched create can reference its own
/// document before the round trip completes.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// One operation inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub(crate) enum BatchOp {
    Create {
        collection: String,
        id: String,
        fields: WriteFields,
    },
    Update {
        collection: String,
        id: String,
        fields: WriteFields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// A set of writes applied atomically: either every operation lands or
/// none does, and subscribers observe a single combined change.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, collection: impl Into<String>, id: impl Into<String>, fields: WriteFields) -> &mut Self {
        self.ops.push(BatchOp::Create {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    pub fn update(&mut self, collection: impl Into<String>, id: impl Into<String>, fields: WriteFields) -> &mut Self {
        self.ops.push(BatchOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Releases backend resources for a subscription when dropped.
pub struct SubscriptionGuard(Option<Box<dyn FnOnce() + Send>>);

impl SubscriptionGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SubscriptionGuard")
    }
}

/// Live stream of full result sets for one query.
#[derive(Debug)]
pub struct QuerySubscription {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
    _guard: SubscriptionGuard,
}

impl QuerySubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<Document>>, guard: SubscriptionGuard) -> Self {
        Self { rx, _guard: guard }
    }

    /// Next snapshot, or `None` once the backend has shut down.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }
}

/// Live stream of snapshots for one document. `Some(None)` means the
/// document does not (or no longer does) exist.
#[derive(Debug)]
pub struct DocumentSubscription {
    rx: mpsc::UnboundedReceiver<Option<Document>>,
    _guard: SubscriptionGuard,
}

impl DocumentSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Option<Document>>, guard: SubscriptionGuard) -> Self {
        Self { rx, _guard: guard }
    }

    pub async fn next(&mut self) -> Option<Option<Document>> {
        self.rx.recv().await
    }
}

/// The document store capability surface consumed by the client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document under a generated id and return the id.
    async fn create(&self, collection: &str, fields: WriteFields) -> Result<String>;

    /// Create a document under the given id. Fails with `AlreadyExists`
    /// when the id is taken.
    async fn create_with_id(&self, collection: &str, id: &str, fields: WriteFields)
        -> Result<()>;

    /// Create the document only if the id is free. Returns `true` when
    /// this call created it. Idempotent by construction, which is what
    /// makes deterministic document keys race-free.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<bool>;

    /// Point read.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merge-write the given fields. Per-field last-write-wins; fails with
    /// `NotFound` when the document is missing.
    async fn update(&self, collection: &str, id: &str, fields: WriteFields) -> Result<()>;

    /// Delete the document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Apply a batch atomically and notify subscribers once.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Subscribe to a query. The first emission arrives immediately with
    /// the current matching set.
    async fn subscribe(&self, collection: &str, query: Query) -> Result<QuerySubscription>;

    /// Subscribe to a single document.
    async fn subscribe_doc(&self, collection: &str, id: &str) -> Result<DocumentSubscription>;
}
