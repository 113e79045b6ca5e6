//! In-memory reference backend.
//!
//! Implements [`DocumentStore`] and backs the test suite and local
//! development. Collections are ordered maps guarded by one mutex;
//! subscribers are re-evaluated after every mutation and always receive
//! the full matching result set, matching the hosted platform's snapshot
//! semantics.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::{
    auto_id, BatchOp, DocumentStore, DocumentSubscription, QuerySubscription, SubscriptionGuard,
    WriteBatch,
};
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::value::{apply_writes, Document, Fields, WriteFields};

struct QuerySubEntry {
    id: Uuid,
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<Vec<Document>>,
}

struct DocSubEntry {
    id: Uuid,
    collection: String,
    doc_id: String,
    tx: mpsc::UnboundedSender<Option<Document>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    query_subs: Vec<QuerySubEntry>,
    doc_subs: Vec<DocSubEntry>,
    last_server_time: Option<DateTime<Utc>>,
}

impl Inner {
    /// Strictly monotonic server clock, so two writes can never resolve
    /// to the same timestamp and timestamp-ordered queries stay total.
    fn server_now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_server_time {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_server_time = Some(now);
        now
    }

    fn eval_query(&self, collection: &str, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(collection)
            .map(|coll| {
                coll.iter()
                    .filter(|(_, fields)| query.matches(fields))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort keeps id order for equal keys, so ties are
        // deterministic across emissions.
        docs.sort_by(|a, b| query.compare(&a.fields, &b.fields));
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        docs
    }

    fn eval_doc(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|coll| coll.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
    }

    /// Re-send snapshots to every subscriber of the given collections.
    /// Subscribers whose receiver is gone are pruned here.
    fn notify(&mut self, touched: &HashSet<String>) {
        let query_snapshots: Vec<(usize, Vec<Document>)> = self
            .query_subs
            .iter()
            .enumerate()
            .filter(|(_, sub)| touched.contains(&sub.collection))
            .map(|(i, sub)| (i, self.eval_query(&sub.collection, &sub.query)))
            .collect();
        let mut dead_queries = Vec::new();
        for (i, snapshot) in query_snapshots {
            if self.query_subs[i].tx.send(snapshot).is_err() {
                dead_queries.push(self.query_subs[i].id);
            }
        }
        self.query_subs.retain(|s| !dead_queries.contains(&s.id));

        let doc_snapshots: Vec<(usize, Option<Document>)> = self
            .doc_subs
            .iter()
            .enumerate()
            .filter(|(_, sub)| touched.contains(&sub.collection))
            .map(|(i, sub)| (i, self.eval_doc(&sub.collection, &sub.doc_id)))
            .collect();
        let mut dead_docs = Vec::new();
        for (i, snapshot) in doc_snapshots {
            if self.doc_subs[i].tx.send(snapshot).is_err() {
                dead_docs.push(self.doc_subs[i].id);
            }
        }
        self.doc_subs.retain(|s| !dead_docs.contains(&s.id));
    }
}

/// In-memory [`DocumentStore`] with live subscriptions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn notify_one(inner: &mut Inner, collection: &str) {
        let mut touched = HashSet::new();
        touched.insert(collection.to_string());
        inner.notify(&touched);
    }

    #[cfg(test)]
    fn query_sub_count(&self) -> usize {
        self.inner.lock().map(|i| i.query_subs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, fields: WriteFields) -> Result<String> {
        let id = auto_id();
        self.create_with_id(collection, &id, fields).await?;
        Ok(id)
    }

    async fn create_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let now = inner.server_now();
        let coll = inner.collections.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Err(StoreError::AlreadyExists(format!("{collection}/{id}")));
        }
        let mut doc = Fields::new();
        apply_writes(&mut doc, &fields, now);
        coll.insert(id.to_string(), doc);
        tracing::debug!(collection, id, "document created");
        Self::notify_one(&mut inner, collection);
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let now = inner.server_now();
        let coll = inner.collections.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Ok(false);
        }
        let mut doc = Fields::new();
        apply_writes(&mut doc, &fields, now);
        coll.insert(id.to_string(), doc);
        tracing::debug!(collection, id, "document created (if-absent)");
        Self::notify_one(&mut inner, collection);
        Ok(true)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.lock()?;
        Ok(inner.eval_doc(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, fields: WriteFields) -> Result<()> {
        let mut inner = self.lock()?;
        let now = inner.server_now();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|coll| coll.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        apply_writes(doc, &fields, now);
        Self::notify_one(&mut inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|coll| coll.remove(id))
            .is_some();
        if removed {
            tracing::debug!(collection, id, "document deleted");
            Self::notify_one(&mut inner, collection);
        }
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.lock()?;

        // Validate the whole batch against the current state (plus the
        // batch's own earlier creates/deletes) before touching anything.
        let mut created: HashSet<(String, String)> = HashSet::new();
        let mut deleted: HashSet<(String, String)> = HashSet::new();
        for op in &batch.ops {
            match op {
                BatchOp::Create { collection, id, .. } => {
                    let key = (collection.clone(), id.clone());
                    let exists = inner
                        .collections
                        .get(collection)
                        .is_some_and(|c| c.contains_key(id));
                    if (exists && !deleted.contains(&key)) || created.contains(&key) {
                        return Err(StoreError::AlreadyExists(format!("{collection}/{id}")));
                    }
                    deleted.remove(&key);
                    created.insert(key);
                }
                BatchOp::Update { collection, id, .. } => {
                    let key = (collection.clone(), id.clone());
                    let exists = inner
                        .collections
                        .get(collection)
                        .is_some_and(|c| c.contains_key(id));
                    if (!exists || deleted.contains(&key)) && !created.contains(&key) {
                        return Err(StoreError::NotFound(format!("{collection}/{id}")));
                    }
                }
                BatchOp::Delete { collection, id } => {
                    let key = (collection.clone(), id.clone());
                    created.remove(&key);
                    deleted.insert(key);
                }
            }
        }

        // Every server timestamp in one batch resolves to the same instant.
        let now = inner.server_now();
        let mut touched = HashSet::new();
        for op in batch.ops {
            match op {
                BatchOp::Create {
                    collection,
                    id,
                    fields,
                } => {
                    let coll = inner.collections.entry(collection.clone()).or_default();
                    let mut doc = Fields::new();
                    apply_writes(&mut doc, &fields, now);
                    coll.insert(id, doc);
                    touched.insert(collection);
                }
                BatchOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    if let Some(doc) = inner
                        .collections
                        .get_mut(&collection)
                        .and_then(|c| c.get_mut(&id))
                    {
                        apply_writes(doc, &fields, now);
                    }
                    touched.insert(collection);
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(coll) = inner.collections.get_mut(&collection) {
                        coll.remove(&id);
                    }
                    touched.insert(collection);
                }
            }
        }
        tracing::debug!(collections = touched.len(), "batch committed");
        inner.notify(&touched);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, query: Query) -> Result<QuerySubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub_id = Uuid::new_v4();
        let mut inner = self.lock()?;

        // Initial emission with the current matching set.
        let snapshot = inner.eval_query(collection, &query);
        let _ = tx.send(snapshot);

        inner.query_subs.push(QuerySubEntry {
            id: sub_id,
            collection: collection.to_string(),
            query,
            tx,
        });
        drop(inner);

        let weak = Arc::downgrade(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.query_subs.retain(|s| s.id != sub_id);
                }
            }
        });
        Ok(QuerySubscription::new(rx, guard))
    }

    async fn subscribe_doc(&self, collection: &str, id: &str) -> Result<DocumentSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub_id = Uuid::new_v4();
        let mut inner = self.lock()?;

        let snapshot = inner.eval_doc(collection, id);
        let _ = tx.send(snapshot);

        inner.doc_subs.push(DocSubEntry {
            id: sub_id,
            collection: collection.to_string(),
            doc_id: id.to_string(),
            tx,
        });
        drop(inner);

        let weak = Arc::downgrade(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.doc_subs.retain(|s| s.id != sub_id);
                }
            }
        });
        Ok(DocumentSubscription::new(rx, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::value::{FieldWrite, Value};

    fn writes(pairs: &[(&str, FieldWrite)]) -> WriteFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn create_get_round_trip() {
        let store = MemoryStore::new();
        let id = store
            .create(
                "users",
                writes(&[("name", FieldWrite::Set(Value::from("Asha")))]),
            )
            .await
            .unwrap();
        let doc = store.get("users", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("Asha"));
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = MemoryStore::new();
        let first = store
            .create_if_absent("conversations", "a__b", WriteFields::new())
            .await
            .unwrap();
        let second = store
            .create_if_absent("conversations", "a__b", WriteFields::new())
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("users", "nobody", WriteFields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscription_sees_initial_and_subsequent_snapshots() {
        let store = MemoryStore::new();
        store
            .create_with_id(
                "properties",
                "p1",
                writes(&[("category", FieldWrite::Set(Value::from("Villa")))]),
            )
            .await
            .unwrap();

        let mut sub = store
            .subscribe(
                "properties",
                Query::new().filter(Filter::eq("category", "Villa")),
            )
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 1);

        store
            .create_with_id(
                "properties",
                "p2",
                writes(&[("category", FieldWrite::Set(Value::from("Villa")))]),
            )
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 2);

        // Non-matching change still re-emits the full (unchanged) set.
        store
            .create_with_id(
                "properties",
                "p3",
                writes(&[("category", FieldWrite::Set(Value::from("Land")))]),
            )
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_trace() {
        let store = MemoryStore::new();
        store
            .create_with_id("conversations", "c1", WriteFields::new())
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch
            .create("conversations/c1/messages", "m1", WriteFields::new())
            .update(
                "conversations",
                "missing",
                writes(&[("lastMessage", FieldWrite::Set(Value::from("hi")))]),
            );
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store
            .get("conversations/c1/messages", "m1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn batch_server_times_share_one_instant() {
        let store = MemoryStore::new();
        store
            .create_with_id("conversations", "c1", WriteFields::new())
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch
            .create(
                "conversations/c1/messages",
                "m1",
                writes(&[("createdAt", FieldWrite::ServerTime)]),
            )
            .update(
                "conversations",
                "c1",
                writes(&[("lastMessageTimestamp", FieldWrite::ServerTime)]),
            );
        store.commit(batch).await.unwrap();

        let msg = store
            .get("conversations/c1/messages", "m1")
            .await
            .unwrap()
            .unwrap();
        let convo = store.get("conversations", "c1").await.unwrap().unwrap();
        assert_eq!(
            msg.get("createdAt").and_then(Value::as_timestamp),
            convo
                .get("lastMessageTimestamp")
                .and_then(Value::as_timestamp)
        );
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_it() {
        let store = MemoryStore::new();
        let sub = store.subscribe("users", Query::new()).await.unwrap();
        assert_eq!(store.query_sub_count(), 1);
        drop(sub);
        assert_eq!(store.query_sub_count(), 0);
    }
}
