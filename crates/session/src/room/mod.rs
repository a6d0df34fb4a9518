//! Room lifecycle
//!
//! Creating, watching, and ending rooms, plus the periodic `lastActive`
//! ping any participant keeps while inside one. The room document is the
//! authoritative playback record; this module owns its CRUD surface while
//! [`crate::sync`] owns the playback semantics.

mod chat;

pub use chat::{ChatEntry, ChatFeed, ChatLog};

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use url::Url;
use watchparty_store::{DocSubscription, DocumentStore};

use crate::config::PartyConfig;
use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::schema::{self, PlaybackStatus, RoomDoc};
use crate::task::TaskGuard;

/// A change observed on a watched room
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// The room document's current state
    Snapshot(RoomDoc),

    /// The room no longer exists (ended by the host, or never existed)
    Ended,
}

/// Stream of [`RoomEvent`]s for one room
///
/// Snapshots arrive in write order; malformed payloads are skipped with a
/// warning. Dropping the stream releases the subscription.
pub struct RoomEvents {
    room_id: String,
    sub: DocSubscription,
}

impl RoomEvents {
    /// Next room event, or `None` once the store side closes
    pub async fn next(&mut self) -> Option<RoomEvent> {
        loop {
            match self.sub.next().await? {
                None => return Some(RoomEvent::Ended),
                Some(value) => match serde_json::from_value::<RoomDoc>(value) {
                    Ok(doc) => return Some(RoomEvent::Snapshot(doc)),
                    Err(err) => {
                        warn!(room = %self.room_id, %err, "skipping malformed room snapshot");
                    }
                },
            }
        }
    }
}

/// Creates, loads, and ends rooms for one authenticated user
pub struct RoomManager {
    store: Arc<dyn DocumentStore>,
    identity: UserIdentity,
    config: PartyConfig,
}

impl RoomManager {
    /// Create a manager bound to a store and identity
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: UserIdentity,
        config: PartyConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            identity,
            config,
        })
    }

    /// Create a room for a video link; the caller becomes the host
    ///
    /// The room starts paused at position zero. Returns the store-assigned
    /// room id.
    pub async fn create_room(&self, video_url: &str) -> Result<String> {
        let video_id = video_id_from_url(video_url)?;
        let doc = RoomDoc {
            host_id: self.identity.uid.clone(),
            video_id,
            status: PlaybackStatus::Pause,
            timestamp: 0.0,
            last_updated: Utc::now(),
            last_active: None,
        };

        let room_id = self
            .store
            .add(&schema::rooms(), serde_json::to_value(&doc)?)
            .await?;
        info!(room = %room_id, host = %self.identity.uid, "room created");
        Ok(room_id)
    }

    /// Load a room document
    ///
    /// # Errors
    ///
    /// `RoomNotFound` if the room has ended or never existed.
    pub async fn room(&self, room_id: &str) -> Result<RoomDoc> {
        let value = self
            .store
            .get(&schema::room(room_id))
            .await?
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribe to a room's document
    pub async fn watch_room(&self, room_id: &str) -> Result<RoomEvents> {
        let sub = self.store.watch_doc(&schema::room(room_id)).await?;
        Ok(RoomEvents {
            room_id: room_id.to_string(),
            sub,
        })
    }

    /// Whether this user is the room's host
    pub fn is_host(&self, doc: &RoomDoc) -> bool {
        doc.host_id == self.identity.uid
    }

    /// End the party for everyone by deleting the room document
    ///
    /// # Errors
    ///
    /// `RoomNotFound` if the room is already gone, `NotHost` if the caller
    /// does not own the room.
    pub async fn end_party(&self, room_id: &str) -> Result<()> {
        let doc = self.room(room_id).await?;
        if !self.is_host(&doc) {
            return Err(Error::NotHost(room_id.to_string()));
        }
        self.store.delete(&schema::room(room_id)).await?;
        info!(room = %room_id, "party ended by host");
        Ok(())
    }

    /// Start the periodic `lastActive` ping for a joined room
    ///
    /// Runs until the returned guard is dropped. Write failures are logged
    /// and abandoned; the next ping recovers.
    pub fn start_activity_ping(&self, room_id: &str) -> TaskGuard {
        let store = Arc::clone(&self.store);
        let path = schema::room(room_id);
        let interval = self.config.room_activity_interval;

        TaskGuard::new(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let ping = json!({ "lastActive": Utc::now().timestamp_millis() });
                if let Err(err) = store.update(&path, ping).await {
                    warn!(room = %path, %err, "activity ping failed");
                }
            }
        }))
    }

    /// The room's chat log
    pub fn chat(&self, room_id: &str) -> ChatLog {
        ChatLog::new(
            Arc::clone(&self.store),
            room_id.to_string(),
            self.identity.clone(),
        )
    }
}

/// Extract the video id from a share link
///
/// Accepts `youtu.be/{id}`, `watch?v={id}`, and `/videos/{id}` forms.
pub fn video_id_from_url(input: &str) -> Result<String> {
    let url =
        Url::parse(input).map_err(|_| Error::InvalidVideoLink(input.to_string()))?;

    let from_short_host = url
        .host_str()
        .filter(|host| host.ends_with("youtu.be"))
        .and_then(|_| url.path_segments())
        .and_then(|mut segments| segments.next())
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty());

    let from_videos_path = url.path_segments().and_then(|mut segments| {
        while let Some(segment) = segments.next() {
            if segment == "videos" {
                return segments.next().filter(|id| !id.is_empty()).map(str::to_string);
            }
        }
        None
    });

    from_short_host
        .or(from_query)
        .or(from_videos_path)
        .ok_or_else(|| Error::InvalidVideoLink(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchparty_store::MemoryStore;

    fn manager(store: Arc<MemoryStore>, uid: &str) -> RoomManager {
        RoomManager::new(store, UserIdentity::new(uid), PartyConfig::default()).unwrap()
    }

    #[test]
    fn test_video_id_from_watch_url() {
        let id = video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_from_short_url() {
        let id = video_id_from_url("https://youtu.be/dQw4w9WgXcQ?t=42").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_from_videos_path() {
        let id = video_id_from_url("https://example.org/videos/abc123").unwrap();
        assert_eq!(id, "abc123");
    }

    #[test]
    fn test_video_id_rejects_unrelated_url() {
        assert!(video_id_from_url("https://example.org/other").is_err());
        assert!(video_id_from_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_create_room_starts_paused() {
        let store = Arc::new(MemoryStore::new());
        let rooms = manager(store, "host-1");

        let room_id = rooms
            .create_room("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        let doc = rooms.room(&room_id).await.unwrap();

        assert_eq!(doc.host_id, "host-1");
        assert_eq!(doc.video_id, "dQw4w9WgXcQ");
        assert_eq!(doc.status, PlaybackStatus::Pause);
        assert_eq!(doc.timestamp, 0.0);
        assert!(rooms.is_host(&doc));
    }

    #[tokio::test]
    async fn test_missing_room_is_room_not_found() {
        let store = Arc::new(MemoryStore::new());
        let rooms = manager(store, "u1");
        assert!(matches!(
            rooms.room("nope").await,
            Err(Error::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_watch_room_reports_end() {
        let store = Arc::new(MemoryStore::new());
        let rooms = manager(Arc::clone(&store), "host-1");

        let room_id = rooms
            .create_room("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        let mut events = rooms.watch_room(&room_id).await.unwrap();

        assert!(matches!(
            events.next().await.unwrap(),
            RoomEvent::Snapshot(_)
        ));

        rooms.end_party(&room_id).await.unwrap();
        assert_eq!(events.next().await.unwrap(), RoomEvent::Ended);
    }

    #[tokio::test]
    async fn test_end_party_requires_host() {
        let store = Arc::new(MemoryStore::new());
        let host = manager(Arc::clone(&store), "host-1");
        let guest = manager(store, "guest-1");

        let room_id = host
            .create_room("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        assert!(matches!(
            guest.end_party(&room_id).await,
            Err(Error::NotHost(_))
        ));
        host.end_party(&room_id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_ping_touches_last_active() {
        let store = Arc::new(MemoryStore::new());
        let rooms = manager(Arc::clone(&store), "host-1");

        let room_id = rooms
            .create_room("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        assert!(rooms.room(&room_id).await.unwrap().last_active.is_none());

        let _ping = rooms.start_activity_ping(&room_id);
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        assert!(rooms.room(&room_id).await.unwrap().last_active.is_some());
    }
}
