//! One conversation's message stream plus the send path.
//!
//! Messages are observed newest-first, matching an inverted chat list
//! where the latest message sits next to the input box; reverse the list
//! for chronological display. Sending appends the message and refreshes
//! the parent conversation's summary in a single atomic batch.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use mahto_shared::{ConversationId, MessageId, PropertyId, UserId};
use mahto_store::schema::{
    conversation_summary_writes, message_from_doc, messages_path, new_conversation_writes,
    new_message_writes, CONVERSATIONS,
};
use mahto_store::{auto_id, ChatMessage, DocumentStore, Query, QuerySubscription, WriteBatch};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Listing context attached to a conversation started from a property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyLink {
    pub id: PropertyId,
    pub title: String,
}

/// Message thread operations for the signed-in user.
#[derive(Clone)]
pub struct MessageThread {
    store: Arc<dyn DocumentStore>,
    session: Session,
    send_timeout: Duration,
}

impl MessageThread {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session, config: &ClientConfig) -> Self {
        Self {
            store,
            session,
            send_timeout: config.send_timeout,
        }
    }

    /// Open the live message list for one conversation, ordered by
    /// creation time descending. Torn down when the handle drops.
    pub async fn observe(&self, conversation: &ConversationId) -> Result<ThreadHandle> {
        let sub = self
            .store
            .subscribe(&messages_path(conversation), Query::new().order_desc("createdAt"))
            .await?;

        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(run_thread(sub, conversation.clone(), tx));

        debug!(conversation = %conversation, "thread opened");
        Ok(ThreadHandle { rx, task })
    }

    /// Send a message.
    ///
    /// Whitespace-only text is a silent no-op returning `Ok(None)`; the
    /// store is not touched. Otherwise the message append and the parent
    /// summary refresh are committed as one batch, bounded by the send
    /// timeout.
    pub async fn send(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<Option<MessageId>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let sender = self.session.require()?;

        let message_id = auto_id();
        let mut batch = WriteBatch::new();
        batch
            .create(
                messages_path(conversation),
                &message_id,
                new_message_writes(text, &sender),
            )
            .update(
                CONVERSATIONS,
                conversation.as_str(),
                conversation_summary_writes(text),
            );

        timeout(self.send_timeout, self.store.commit(batch))
            .await
            .map_err(|_| {
                warn!(conversation = %conversation, "send timed out");
                ClientError::Timeout
            })??;

        info!(message = %message_id, conversation = %conversation, "message sent");
        Ok(Some(MessageId::new(message_id)))
    }

    /// Resolve (or lazily create) the conversation with another user.
    ///
    /// The document id is derived from the sorted participant pair, so
    /// concurrent calls from either side settle on the same document and
    /// at most one conversation exists per pair.
    pub async fn start_conversation(
        &self,
        other: &UserId,
        property: Option<&PropertyLink>,
    ) -> Result<ConversationId> {
        let me = self.session.require()?;
        if &me == other {
            return Err(ClientError::SelfConversation);
        }

        let id = ConversationId::for_pair(&me, other);
        let writes = new_conversation_writes(
            &me,
            other,
            property.map(|p| &p.id),
            property.map(|p| p.title.as_str()),
        );

        let created = timeout(
            self.send_timeout,
            self.store
                .create_if_absent(CONVERSATIONS, id.as_str(), writes),
        )
        .await
        .map_err(|_| {
            warn!(conversation = %id, "start conversation timed out");
            ClientError::Timeout
        })??;

        if created {
            info!(conversation = %id, "conversation created");
        } else {
            debug!(conversation = %id, "conversation already exists");
        }
        Ok(id)
    }
}

/// Live view over one conversation's messages, newest first.
pub struct ThreadHandle {
    rx: watch::Receiver<Vec<ChatMessage>>,
    task: JoinHandle<()>,
}

impl ThreadHandle {
    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.rx.clone()
    }

    /// Current messages, newest first.
    pub fn current(&self) -> Vec<ChatMessage> {
        self.rx.borrow().clone()
    }

    /// Current messages in chronological order, for display.
    pub fn chronological(&self) -> Vec<ChatMessage> {
        let mut messages = self.current();
        messages.reverse();
        messages
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Short clock label for a message bubble: `HH:MM` once the server
/// timestamp has resolved, "Just now" while a local write is pending.
pub fn time_label(message: &ChatMessage) -> String {
    match message.created_at {
        Some(ts) => ts.format("%H:%M").to_string(),
        None => "Just now".to_string(),
    }
}

async fn run_thread(
    mut sub: QuerySubscription,
    conversation: ConversationId,
    tx: watch::Sender<Vec<ChatMessage>>,
) {
    while let Some(snapshot) = sub.next().await {
        let mut messages = Vec::with_capacity(snapshot.len());
        for doc in &snapshot {
            match message_from_doc(doc) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(error = %e, "skipping malformed message"),
            }
        }
        tx.send_replace(messages);
    }
    debug!(conversation = %conversation, "thread stream ended");
}
