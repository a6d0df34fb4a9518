//! The playback synchronization engine task

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use watchparty_store::DocumentStore;

use crate::config::PartyConfig;
use crate::error::Result;
use crate::identity::UserIdentity;
use crate::schema::{self, PlaybackStatus, PlaybackUpdate, RoomDoc};
use crate::sync::seek_target;
use crate::task::TaskGuard;

/// Playback widget collaborator
///
/// The engine drives whatever widget the application embeds through this
/// seam; it never renders or decodes anything itself.
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Current playback position in seconds
    async fn current_time(&self) -> Result<f64>;

    /// Seek to a position
    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<()>;

    /// Start playback
    async fn play(&self) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;
}

/// Player state transition reported by the widget's state-change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Playback started
    Playing,
    /// Playback paused
    Paused,
}

/// One room's playback synchronization engine
pub struct PlaybackSyncEngine;

impl PlaybackSyncEngine {
    /// Start the engine for a room
    ///
    /// Subscribes to the room document and spawns the engine task. Feed the
    /// widget's state-change events through the returned handle; dropping
    /// it stops the engine and releases the subscription.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        identity: UserIdentity,
        config: PartyConfig,
        room_id: &str,
        player: Arc<dyn PlayerControl>,
    ) -> Result<SyncHandle> {
        config.validate()?;
        let room_sub = store.watch_doc(&schema::room(room_id)).await?;
        let (player_tx, player_rx) = mpsc::unbounded_channel();

        let mut engine = Engine {
            store,
            identity,
            config,
            room_id: room_id.to_string(),
            player,
            host: None,
            guard_until: None,
        };

        let task = TaskGuard::new(tokio::spawn(async move {
            engine.run(room_sub, player_rx).await;
        }));

        Ok(SyncHandle { player_tx, task })
    }
}

/// Handle to a running sync engine
pub struct SyncHandle {
    player_tx: mpsc::UnboundedSender<PlayerEvent>,
    #[allow(dead_code)]
    task: TaskGuard,
}

impl SyncHandle {
    /// Forward a widget state-change event to the engine
    pub fn player_event(&self, event: PlayerEvent) {
        // The engine stopping (room ended) makes these no-ops.
        let _ = self.player_tx.send(event);
    }
}

struct Engine {
    store: Arc<dyn DocumentStore>,
    identity: UserIdentity,
    config: PartyConfig,
    room_id: String,
    player: Arc<dyn PlayerControl>,

    /// Whether this user currently holds `hostId`; unknown before the
    /// first snapshot
    host: Option<bool>,

    /// While set and in the future, locally generated player events must
    /// not trigger an outbound write
    guard_until: Option<Instant>,
}

impl Engine {
    async fn run(
        &mut self,
        mut room_sub: watchparty_store::DocSubscription,
        mut player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    ) {
        loop {
            tokio::select! {
                snapshot = room_sub.next() => match snapshot {
                    None => break,
                    Some(None) => {
                        info!(room = %self.room_id, "room ended, playback sync stopped");
                        break;
                    }
                    Some(Some(value)) => self.handle_snapshot(value).await,
                },
                event = player_rx.recv() => match event {
                    None => break,
                    Some(event) => self.handle_player_event(event).await,
                },
            }
        }
    }

    async fn handle_snapshot(&mut self, value: serde_json::Value) {
        let doc: RoomDoc = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(room = %self.room_id, %err, "skipping malformed room snapshot");
                return;
            }
        };

        let is_host = doc.host_id == self.identity.uid;
        self.host = Some(is_host);
        if is_host {
            // The host's own player is the authority; it never reconciles.
            return;
        }

        let target = seek_target(doc.status, doc.timestamp, doc.last_updated, Utc::now());
        self.guard_until = Some(Instant::now() + self.config.sync_guard);

        if let Err(err) = self.player.seek_to(target, true).await {
            warn!(room = %self.room_id, %err, "seek failed during reconciliation");
            return;
        }
        let result = match doc.status {
            PlaybackStatus::Play => self.player.play().await,
            PlaybackStatus::Pause => self.player.pause().await,
        };
        if let Err(err) = result {
            warn!(room = %self.room_id, %err, "player command failed during reconciliation");
        }
    }

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        if let Some(deadline) = self.guard_until {
            if Instant::now() < deadline {
                debug!(room = %self.room_id, ?event, "player event suppressed during sync guard");
                return;
            }
        }

        // Only the host's transitions are authoritative.
        if self.host != Some(true) {
            return;
        }

        let position = match self.player.current_time().await {
            Ok(position) => position,
            Err(err) => {
                warn!(room = %self.room_id, %err, "could not read playback position");
                return;
            }
        };

        let update = PlaybackUpdate {
            status: match event {
                PlayerEvent::Playing => PlaybackStatus::Play,
                PlayerEvent::Paused => PlaybackStatus::Pause,
            },
            timestamp: position,
            last_updated: Utc::now(),
        };

        // Fire and forget: a lost write is a missed sync tick, recovered by
        // the host's next transition.
        match serde_json::to_value(&update) {
            Ok(value) => {
                if let Err(err) = self
                    .store
                    .update(&schema::room(&self.room_id), value)
                    .await
                {
                    warn!(room = %self.room_id, %err, "playback sync write failed");
                }
            }
            Err(err) => warn!(room = %self.room_id, %err, "could not encode playback update"),
        }
    }
}
