//! Voice channel
//!
//! Establishes exactly one bidirectional audio stream between two
//! participants of a room via an offer/answer/ICE exchange mediated by the
//! shared document store. The observed design assumes two-party signaling
//! per room, not a full mesh.

pub mod peer;
mod session;
mod signaling;

pub use session::VoicePhase;
pub use signaling::{OfferClaim, SignalingChannel, VoiceRole};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;
use watchparty_store::DocumentStore;

use crate::audio::{ActiveSpeakers, LevelSource, SpeakerMonitor};
use crate::config::PartyConfig;
use crate::error::Result;
use crate::identity::UserIdentity;
use crate::presence::PresenceTracker;
use crate::schema::VoiceParticipantDoc;
use crate::task::TaskGuard;
use peer::{AudioTrackHandle, MediaCapture, PeerConnector};
use session::{VoiceCommand, VoiceSession};

/// A joined voice session
///
/// Dropping the channel aborts the session and stops capture; prefer
/// [`VoiceChannel::leave`] for an orderly teardown that also clears the
/// participant record's `active` flag.
pub struct VoiceChannel {
    cmd_tx: mpsc::UnboundedSender<VoiceCommand>,
    phase_rx: watch::Receiver<VoicePhase>,
    participants_rx: watch::Receiver<Vec<VoiceParticipantDoc>>,
    speakers: Arc<ActiveSpeakers>,
    muted: Arc<AtomicBool>,
    track: Arc<dyn AudioTrackHandle>,
    config: PartyConfig,
    remote_monitors: Mutex<Vec<TaskGuard>>,
    _local_monitor: Option<TaskGuard>,
    _task: TaskGuard,
}

impl std::fmt::Debug for VoiceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceChannel").finish_non_exhaustive()
    }
}

impl VoiceChannel {
    /// Join a room's voice session
    ///
    /// Acquires audio capture, creates the peer link, starts the presence
    /// heartbeat and the local level monitor, then spawns the session task
    /// that negotiates roles and exchanges candidates.
    ///
    /// # Errors
    ///
    /// `MediaAccess` when capture is denied or unavailable: a non-fatal
    /// connection failure; the rest of the room keeps working.
    pub async fn join(
        store: Arc<dyn DocumentStore>,
        identity: UserIdentity,
        config: PartyConfig,
        room_id: &str,
        media: &dyn MediaCapture,
        connector: &dyn PeerConnector,
    ) -> Result<Self> {
        config.validate()?;

        let track = media.capture_audio().await?;
        let muted = Arc::new(AtomicBool::new(false));

        let (link, peer_rx) = match connector.connect(&config.ice, Arc::clone(&track)).await {
            Ok(pair) => pair,
            Err(err) => {
                track.stop();
                return Err(err);
            }
        };

        let presence = match PresenceTracker::start(
            Arc::clone(&store),
            identity.clone(),
            config.clone(),
            room_id,
            Arc::clone(&muted),
        )
        .await
        {
            Ok(presence) => presence,
            Err(err) => {
                track.stop();
                let _ = link.close().await;
                return Err(err);
            }
        };
        let participants_rx = presence.participants();

        let speakers = Arc::new(ActiveSpeakers::new());
        let local_monitor = track.level_source().map(|source| {
            SpeakerMonitor::spawn_local(
                source,
                identity.uid.clone(),
                Arc::clone(&muted),
                Arc::clone(&speakers),
                &config,
            )
        });

        let signaling = SignalingChannel::new(Arc::clone(&store), room_id, identity.clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(VoicePhase::AcquiringMedia);

        let voice_session = VoiceSession {
            room_id: room_id.to_string(),
            link,
            track: Arc::clone(&track),
            signaling,
            presence,
            muted: Arc::clone(&muted),
            phase_tx,
            local_applied: false,
            remote_applied: false,
            pending: Vec::new(),
            seen_candidates: 0,
        };
        let task = TaskGuard::new(tokio::spawn(voice_session.run(peer_rx, cmd_rx)));

        info!(room = %room_id, user = %identity.uid, "joined voice");
        Ok(Self {
            cmd_tx,
            phase_rx,
            participants_rx,
            speakers,
            muted,
            track,
            config,
            remote_monitors: Mutex::new(Vec::new()),
            _local_monitor: local_monitor,
            _task: task,
        })
    }

    /// Subscribe to the session's lifecycle phase
    pub fn phase(&self) -> watch::Receiver<VoicePhase> {
        self.phase_rx.clone()
    }

    /// Subscribe to the effective active participant set
    pub fn participants(&self) -> watch::Receiver<Vec<VoiceParticipantDoc>> {
        self.participants_rx.clone()
    }

    /// Subscribe to the active-speaker slot
    pub fn active_speaker(&self) -> watch::Receiver<Option<String>> {
        self.speakers.subscribe()
    }

    /// Whether local outgoing audio is currently disabled
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Toggle local outgoing audio and persist the flag for remote UIs
    ///
    /// No renegotiation happens; the track is disabled in place.
    pub fn set_muted(&self, muted: bool) {
        let _ = self.cmd_tx.send(VoiceCommand::SetMuted(muted));
    }

    /// Start level monitoring for a received remote stream
    pub fn watch_remote_stream(&self, user_id: &str, source: Box<dyn LevelSource>) {
        let guard = SpeakerMonitor::spawn_remote(
            source,
            user_id.to_string(),
            Arc::clone(&self.speakers),
            &self.config,
        );
        self.remote_monitors.lock().push(guard);
    }

    /// Leave the voice session: stop capture, close the link, cancel the
    /// heartbeat, and mark this participant inactive.
    pub async fn leave(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(VoiceCommand::Leave(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for VoiceChannel {
    fn drop(&mut self) {
        // Stopping an already-stopped track is a no-op; this covers the
        // abort path where the session task never ran its teardown.
        self.track.stop();
    }
}
