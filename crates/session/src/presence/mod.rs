//! Presence & activity tracking
//!
//! Every joined voice participant merge-upserts its record on a fixed
//! heartbeat; subscribers derive the *effective* active set client-side by
//! filtering on the liveness window. A participant that crashes keeps
//! showing as active for up to one window, and stale records are never
//! purged server-side; both are accepted properties of the design.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};
use watchparty_store::{DocPath, DocumentStore};

use crate::config::PartyConfig;
use crate::error::Result;
use crate::identity::UserIdentity;
use crate::schema::{self, VoiceParticipantDoc};
use crate::task::TaskGuard;

/// Filter participant records down to the effective active set
///
/// A record counts as active only while its `active` flag is set AND its
/// last ping is younger than the liveness window; the flag alone is not
/// trusted, because abnormal disconnects never clear it.
pub fn active_set(
    docs: &[VoiceParticipantDoc],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<VoiceParticipantDoc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    docs.iter()
        .filter(|doc| doc.active && now - doc.last_ping < window)
        .cloned()
        .collect()
}

/// Maintains one participant's liveness signal
pub struct PresenceTracker;

impl PresenceTracker {
    /// Start the heartbeat and the participant watcher for a room
    ///
    /// The initial upsert happens immediately so joining is visible
    /// without waiting a full heartbeat. Heartbeat write failures are
    /// logged and abandoned; the next beat recovers.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        identity: UserIdentity,
        config: PartyConfig,
        room_id: &str,
        muted: Arc<AtomicBool>,
    ) -> Result<PresenceHandle> {
        let path = schema::participant(room_id, &identity.uid);

        upsert(&store, &path, &identity, &muted).await;

        let heartbeat = {
            let store = Arc::clone(&store);
            let path = path.clone();
            let identity = identity.clone();
            let muted = Arc::clone(&muted);
            let interval = config.presence_heartbeat;
            TaskGuard::new(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    upsert(&store, &path, &identity, &muted).await;
                }
            }))
        };

        let mut sub = store
            .watch_collection(&schema::voice_participants(room_id))
            .await?;
        let (participants_tx, participants_rx) = watch::channel(Vec::new());
        let window = config.presence_window;
        let watcher = TaskGuard::new(tokio::spawn(async move {
            while let Some(docs) = sub.next().await {
                let parsed: Vec<VoiceParticipantDoc> = docs
                    .into_iter()
                    .filter_map(|doc| match serde_json::from_value(doc.data) {
                        Ok(parsed) => Some(parsed),
                        Err(err) => {
                            warn!(%err, "skipping malformed participant record");
                            None
                        }
                    })
                    .collect();
                let active = active_set(&parsed, Utc::now(), window);
                if participants_tx.send(active).is_err() {
                    break;
                }
            }
            debug!("participant watcher stopped");
        }));

        Ok(PresenceHandle {
            store,
            path,
            participants_rx,
            heartbeat: Some(heartbeat),
            _watcher: watcher,
        })
    }
}

/// Handle to a running presence tracker
///
/// Dropping the handle cancels the heartbeat and the watcher; call
/// [`PresenceHandle::mark_inactive`] first for an orderly teardown that
/// clears the record's `active` flag (the record itself is never deleted).
pub struct PresenceHandle {
    store: Arc<dyn DocumentStore>,
    path: DocPath,
    participants_rx: watch::Receiver<Vec<VoiceParticipantDoc>>,
    heartbeat: Option<TaskGuard>,
    _watcher: TaskGuard,
}

impl PresenceHandle {
    /// Subscribe to the effective active set
    pub fn participants(&self) -> watch::Receiver<Vec<VoiceParticipantDoc>> {
        self.participants_rx.clone()
    }

    /// Persist the mute flag for remote UI display
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.store
            .merge(&self.path, json!({ "muted": muted }))
            .await?;
        Ok(())
    }

    /// Orderly-teardown step: cancel the heartbeat, then clear `active`
    pub async fn mark_inactive(&mut self) -> Result<()> {
        // Heartbeat first, so a concurrent beat cannot resurrect the flag.
        self.heartbeat.take();
        self.store
            .merge(&self.path, json!({ "active": false }))
            .await?;
        Ok(())
    }
}

async fn upsert(
    store: &Arc<dyn DocumentStore>,
    path: &DocPath,
    identity: &UserIdentity,
    muted: &Arc<AtomicBool>,
) {
    let doc = VoiceParticipantDoc {
        user_id: identity.uid.clone(),
        display_name: identity.label(),
        photo_url: identity.photo_or_placeholder(),
        email: identity.email.clone(),
        active: true,
        last_ping: Utc::now(),
        muted: muted.load(Ordering::Relaxed),
    };

    let value = match serde_json::to_value(&doc) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "could not encode participant record");
            return;
        }
    };

    if let Err(err) = store.merge(path, value).await {
        warn!(path = %path, %err, "presence heartbeat failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchparty_store::MemoryStore;

    fn record(uid: &str, active: bool, age: Duration) -> VoiceParticipantDoc {
        VoiceParticipantDoc {
            user_id: uid.to_string(),
            display_name: uid.to_string(),
            photo_url: String::new(),
            email: None,
            active,
            last_ping: Utc::now() - chrono::Duration::from_std(age).unwrap(),
            muted: false,
        }
    }

    #[test]
    fn test_active_set_excludes_stale_pings() {
        let window = Duration::from_secs(10);
        let docs = vec![
            record("fresh", true, Duration::from_secs(3)),
            record("stale-but-flagged", true, Duration::from_secs(15)),
            record("inactive", false, Duration::from_secs(1)),
        ];

        let active = active_set(&docs, Utc::now(), window);
        let ids: Vec<&str> = active.iter().map(|d| d.user_id.as_str()).collect();
        assert_eq!(ids, vec!["fresh"]);
    }

    #[test]
    fn test_active_set_boundary_is_exclusive() {
        let window = Duration::from_secs(10);
        let docs = vec![record("edge", true, Duration::from_secs(10))];
        assert!(active_set(&docs, Utc::now(), window).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_is_visible_immediately() {
        let store = Arc::new(MemoryStore::new());
        let muted = Arc::new(AtomicBool::new(false));

        let _handle = PresenceTracker::start(
            store.clone(),
            UserIdentity::new("alice").with_display_name("Ada"),
            PartyConfig::default(),
            "r1",
            muted,
        )
        .await
        .unwrap();

        let doc = store
            .get(&schema::participant("r1", "alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["active"], true);
        assert_eq!(doc["displayName"], "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_refreshes_last_ping() {
        let store = Arc::new(MemoryStore::new());
        let muted = Arc::new(AtomicBool::new(false));

        let _handle = PresenceTracker::start(
            store.clone(),
            UserIdentity::new("alice"),
            PartyConfig::default(),
            "r1",
            muted,
        )
        .await
        .unwrap();

        let first = store
            .get(&schema::participant("r1", "alice"))
            .await
            .unwrap()
            .unwrap()["lastPing"]
            .as_i64()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;

        let second = store
            .get(&schema::participant("r1", "alice"))
            .await
            .unwrap()
            .unwrap()["lastPing"]
            .as_i64()
            .unwrap();
        assert!(second >= first, "heartbeat must keep refreshing lastPing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_inactive_clears_flag_and_stops_heartbeat() {
        let store = Arc::new(MemoryStore::new());
        let muted = Arc::new(AtomicBool::new(false));

        let mut handle = PresenceTracker::start(
            store.clone(),
            UserIdentity::new("alice"),
            PartyConfig::default(),
            "r1",
            muted,
        )
        .await
        .unwrap();

        handle.mark_inactive().await.unwrap();

        tokio::time::sleep(Duration::from_secs(12)).await;
        let doc = store
            .get(&schema::participant("r1", "alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["active"], false, "a cancelled heartbeat must not resurrect the record");
    }

    #[tokio::test(start_paused = true)]
    async fn test_participants_watch_applies_liveness_window() {
        let store = Arc::new(MemoryStore::new());
        let muted = Arc::new(AtomicBool::new(false));

        // A ghost record from a participant that crashed long ago.
        store
            .merge(
                &schema::participant("r1", "ghost"),
                serde_json::to_value(record("ghost", true, Duration::from_secs(3600))).unwrap(),
            )
            .await
            .unwrap();

        let handle = PresenceTracker::start(
            store.clone(),
            UserIdentity::new("alice"),
            PartyConfig::default(),
            "r1",
            muted,
        )
        .await
        .unwrap();

        let mut participants = handle.participants();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let current = participants.borrow_and_update().clone();
        let ids: Vec<&str> = current.iter().map(|d| d.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice"], "ghost records stay filtered out");
    }
}
