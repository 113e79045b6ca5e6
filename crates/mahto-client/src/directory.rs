//! Conversation directory: every thread the signed-in user participates
//! in, newest activity first, each annotated with the counterpart's
//! display profile.
//!
//! Counterpart lookups are memoised in a bounded cache keyed by user id,
//! and the remaining misses are fetched with bounded concurrency, so a
//! burst of snapshot emissions cannot fan out into unbounded point reads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mahto_shared::UserId;
use mahto_store::schema::{conversation_from_doc, user_profile_from_doc, CONVERSATIONS, USERS};
use mahto_store::{Conversation, DocumentStore, Filter, Query, QuerySubscription, UserProfile};

use crate::config::ClientConfig;
use crate::error::Result;

/// Display info for the other side of a conversation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartProfile {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

impl CounterpartProfile {
    fn from_profile(id: UserId, profile: &UserProfile) -> Self {
        let name = if profile.name.is_empty() {
            "User".to_string()
        } else {
            profile.name.clone()
        };
        Self {
            id,
            name,
            avatar: profile.avatar.clone(),
        }
    }

    /// Placeholder used when the counterpart's profile cannot be read.
    fn unknown(id: UserId) -> Self {
        Self {
            id,
            name: "User".to_string(),
            avatar: None,
        }
    }
}

/// One directory row: the conversation plus its resolved counterpart.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub conversation: Conversation,
    pub counterpart: CounterpartProfile,
}

/// Bounded counterpart-profile cache with insertion-order eviction.
struct ProfileCache {
    capacity: usize,
    map: HashMap<UserId, CounterpartProfile>,
    order: VecDeque<UserId>,
}

impl ProfileCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, id: &UserId) -> Option<&CounterpartProfile> {
        self.map.get(id)
    }

    fn insert(&mut self, id: UserId, profile: CounterpartProfile) {
        if self.map.insert(id.clone(), profile).is_none() {
            self.order.push_back(id);
        }
        while self.map.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn invalidate(&mut self, id: &UserId) {
        if self.map.remove(id).is_some() {
            self.order.retain(|k| k != id);
        }
    }
}

/// Factory for per-user directory subscriptions.
#[derive(Clone)]
pub struct ConversationDirectory {
    store: Arc<dyn DocumentStore>,
    cache_capacity: usize,
    fanout: usize,
    limit: usize,
}

impl ConversationDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ClientConfig) -> Self {
        Self {
            store,
            cache_capacity: config.profile_cache_capacity,
            fanout: config.profile_fanout,
            limit: config.directory_limit,
        }
    }

    /// Open the live directory for one user. The subscription is torn
    /// down when the returned handle is dropped.
    pub async fn observe(&self, user: &UserId) -> Result<DirectoryHandle> {
        let query = Query::new()
            .filter(Filter::array_contains("participants", user.as_str()))
            .order_desc("lastMessageTimestamp")
            .limit(self.limit);
        let sub = self.store.subscribe(CONVERSATIONS, query).await?;

        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(run_directory(
            self.store.clone(),
            sub,
            user.clone(),
            tx,
            self.cache_capacity,
            self.fanout,
        ));

        debug!(user = %user.short(), "directory opened");
        Ok(DirectoryHandle { rx, task })
    }
}

/// Live view over one user's conversation list.
pub struct DirectoryHandle {
    rx: watch::Receiver<Vec<ConversationView>>,
    task: JoinHandle<()>,
}

impl DirectoryHandle {
    pub fn subscribe(&self) -> watch::Receiver<Vec<ConversationView>> {
        self.rx.clone()
    }

    pub fn current(&self) -> Vec<ConversationView> {
        self.rx.borrow().clone()
    }
}

impl Drop for DirectoryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_directory(
    store: Arc<dyn DocumentStore>,
    mut sub: QuerySubscription,
    me: UserId,
    tx: watch::Sender<Vec<ConversationView>>,
    cache_capacity: usize,
    fanout: usize,
) {
    let mut cache = ProfileCache::new(cache_capacity);

    while let Some(snapshot) = sub.next().await {
        let mut conversations: Vec<Conversation> = Vec::with_capacity(snapshot.len());
        for doc in &snapshot {
            match conversation_from_doc(doc) {
                Ok(convo) => conversations.push(convo),
                Err(e) => warn!(error = %e, "skipping malformed conversation"),
            }
        }

        // Only cache misses hit the store, and never more than `fanout`
        // at a time.
        let mut misses: Vec<UserId> = Vec::new();
        for convo in &conversations {
            if let Some(other) = convo.counterpart(&me) {
                if cache.get(other).is_none() && !misses.contains(other) {
                    misses.push(other.clone());
                }
            }
        }
        let lookups = misses.into_iter().map(|uid| {
            let store = store.clone();
            async move {
                let result = store.get(USERS, uid.as_str()).await;
                (uid, result)
            }
        });
        let resolved: Vec<_> = stream::iter(lookups)
            .buffer_unordered(fanout.max(1))
            .collect()
            .await;
        for (uid, result) in resolved {
            match result {
                Ok(Some(doc)) => {
                    let profile = user_profile_from_doc(&doc);
                    cache.insert(uid.clone(), CounterpartProfile::from_profile(uid, &profile));
                }
                Ok(None) => cache.invalidate(&uid),
                Err(e) => {
                    warn!(user = %uid.short(), error = %e, "counterpart lookup failed");
                }
            }
        }

        let views: Vec<ConversationView> = conversations
            .into_iter()
            .filter_map(|convo| {
                let other = convo.counterpart(&me)?.clone();
                let counterpart = cache
                    .get(&other)
                    .cloned()
                    .unwrap_or_else(|| CounterpartProfile::unknown(other));
                Some(ConversationView {
                    conversation: convo,
                    counterpart,
                })
            })
            .collect();

        // The whole list is replaced in one step, so observers never see
        // a partially enriched state.
        tx.send_replace(views);
    }

    debug!(user = %me.short(), "directory stream ended");
}
