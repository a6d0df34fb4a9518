//! Room chat log
//!
//! Append-only messages owned collectively by the room, never mutated or
//! deleted individually. Consumers read the full list ordered by send
//! instant ascending.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use watchparty_store::{CollectionSubscription, DocumentStore};

use crate::error::Result;
use crate::identity::UserIdentity;
use crate::schema::{self, ChatMessageDoc};

/// A chat message with its store-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    /// Store-assigned message id
    pub id: String,

    /// Message payload
    pub message: ChatMessageDoc,
}

/// Stream of chat snapshots, each the full message list ordered by
/// timestamp ascending
pub struct ChatFeed {
    sub: CollectionSubscription,
}

impl ChatFeed {
    /// Next chat snapshot, or `None` once the store side closes
    pub async fn next(&mut self) -> Option<Vec<ChatEntry>> {
        let docs = self.sub.next().await?;
        let mut entries: Vec<ChatEntry> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc.data) {
                Ok(message) => Some(ChatEntry {
                    id: doc.id,
                    message,
                }),
                Err(err) => {
                    warn!(%err, "skipping malformed chat message");
                    None
                }
            })
            .collect();
        entries.sort_by_key(|entry| entry.message.timestamp);
        Some(entries)
    }
}

/// Sends and reads one room's chat
pub struct ChatLog {
    store: Arc<dyn DocumentStore>,
    room_id: String,
    identity: UserIdentity,
}

impl ChatLog {
    /// Create a chat log bound to a room and identity
    pub fn new(store: Arc<dyn DocumentStore>, room_id: String, identity: UserIdentity) -> Self {
        Self {
            store,
            room_id,
            identity,
        }
    }

    /// Append a message; blank messages are ignored
    pub async fn send(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Ok(());
        }

        let doc = ChatMessageDoc {
            uid: self.identity.uid.clone(),
            message: message.to_string(),
            display_name: Some(self.identity.label()),
            photo_url: Some(self.identity.photo_or_placeholder()),
            timestamp: Utc::now(),
        };

        self.store
            .add(&schema::chat(&self.room_id), serde_json::to_value(&doc)?)
            .await?;
        Ok(())
    }

    /// Subscribe to the room's messages
    pub async fn feed(&self) -> Result<ChatFeed> {
        let sub = self
            .store
            .watch_collection(&schema::chat(&self.room_id))
            .await?;
        Ok(ChatFeed { sub })
    }
}
