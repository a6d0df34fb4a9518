//! The per-participant voice session task
//!
//! One event loop owns the whole lifecycle:
//! `DeterminingRole → Offering | Answering → Connected → Closed`, with
//! media acquisition happening before the task is spawned. Store
//! snapshots, peer events, and commands are consumed sequentially, so no
//! two handlers ever interleave on session state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::presence::PresenceHandle;
use crate::schema::{IceCandidateDoc, SdpKind, SessionDescriptionDoc};
use crate::voice::peer::{
    AudioTrackHandle, LinkState, PeerEvent, PeerLink, SessionDescription, SignalingState,
};
use crate::voice::signaling::{OfferClaim, SignalingChannel, VoiceRole};

/// Lifecycle phase of a voice session
///
/// The idle state is the absence of a session; a channel starts in
/// `AcquiringMedia` and ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePhase {
    /// Requesting local audio-only capture
    AcquiringMedia,
    /// Reading the offer record to decide offerer vs. answerer
    DeterminingRole,
    /// This session proposed the offer and awaits an answer
    Offering,
    /// This session is answering an existing offer
    Answering,
    /// The link reports media flowing
    Connected,
    /// The link reported disconnected/failed; no renegotiation is
    /// attempted
    Disconnected,
    /// Torn down
    Closed,
}

impl VoicePhase {
    /// Whether the peer link is currently delivering media
    pub fn is_connected(&self) -> bool {
        matches!(self, VoicePhase::Connected)
    }
}

/// Commands accepted by a running session
#[derive(Debug)]
pub(crate) enum VoiceCommand {
    /// Toggle the local outgoing audio and persist the flag
    SetMuted(bool),
    /// Tear down and acknowledge
    Leave(oneshot::Sender<()>),
}

pub(crate) struct VoiceSession {
    pub(crate) room_id: String,
    pub(crate) link: Arc<dyn PeerLink>,
    pub(crate) track: Arc<dyn AudioTrackHandle>,
    pub(crate) signaling: SignalingChannel,
    pub(crate) presence: PresenceHandle,
    pub(crate) muted: Arc<AtomicBool>,
    pub(crate) phase_tx: watch::Sender<VoicePhase>,

    /// Whether a local description has been applied; candidates gathered
    /// before that are not emitted
    pub(crate) local_applied: bool,

    /// Whether the remote description has been applied; remote candidates
    /// arriving before that are buffered
    pub(crate) remote_applied: bool,

    /// Remote candidates awaiting the remote description
    pub(crate) pending: Vec<IceCandidateDoc>,

    /// How far into the remote candidate collection we have read
    pub(crate) seen_candidates: usize,
}

impl VoiceSession {
    pub(crate) async fn run(
        mut self,
        mut peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
        mut cmd_rx: mpsc::UnboundedReceiver<VoiceCommand>,
    ) {
        self.set_phase(VoicePhase::DeterminingRole);
        let role = match self.negotiate().await {
            Ok(role) => role,
            Err(err) => {
                warn!(room = %self.room_id, %err, "voice negotiation failed");
                self.teardown().await;
                return;
            }
        };

        let mut answer_sub = match self.signaling.watch_answer().await {
            Ok(sub) => sub,
            Err(err) => {
                warn!(room = %self.room_id, %err, "could not watch answer record");
                self.teardown().await;
                return;
            }
        };
        let mut candidate_sub = match self.signaling.watch_remote_candidates(role).await {
            Ok(sub) => sub,
            Err(err) => {
                warn!(room = %self.room_id, %err, "could not watch remote candidates");
                self.teardown().await;
                return;
            }
        };

        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    None => {
                        // The owning channel is gone; treat as leave.
                        self.teardown().await;
                        return;
                    }
                    Some(VoiceCommand::SetMuted(muted)) => self.apply_mute(muted).await,
                    Some(VoiceCommand::Leave(ack)) => {
                        self.teardown().await;
                        let _ = ack.send(());
                        return;
                    }
                },
                event = peer_rx.recv() => match event {
                    None => {
                        warn!(room = %self.room_id, "peer link event stream ended");
                        self.teardown().await;
                        return;
                    }
                    Some(event) => self.handle_peer_event(role, event).await,
                },
                snapshot = answer_sub.next() => match snapshot {
                    None => {
                        self.teardown().await;
                        return;
                    }
                    // The answer record does not exist yet.
                    Some(None) => {}
                    Some(Some(value)) => self.handle_answer(role, value).await,
                },
                docs = candidate_sub.next() => match docs {
                    None => {
                        self.teardown().await;
                        return;
                    }
                    Some(docs) => self.handle_remote_candidates(docs).await,
                },
            }
        }
    }

    /// Decide offerer vs. answerer and run the matching half of the
    /// handshake.
    async fn negotiate(&mut self) -> crate::Result<VoiceRole> {
        let offer = self.link.create_offer().await?;

        match self.signaling.claim_offer(&offer).await? {
            OfferClaim::Offerer => {
                self.set_phase(VoicePhase::Offering);
                self.link.set_local_description(offer).await?;
                self.local_applied = true;
                info!(room = %self.room_id, "acting as offerer");
                Ok(VoiceRole::Offerer)
            }
            OfferClaim::Answerer(remote) => {
                self.set_phase(VoicePhase::Answering);

                // Only answer from a stable state; a conflicting state
                // means another negotiation already touched this link.
                if self.link.signaling_state().await != SignalingState::Stable {
                    debug!(room = %self.room_id, "offer not applied, signaling state not stable");
                    return Ok(VoiceRole::Answerer);
                }

                self.link
                    .set_remote_description(SessionDescription {
                        kind: remote.kind,
                        sdp: remote.sdp,
                    })
                    .await?;
                self.remote_applied = true;

                let answer = self.link.create_answer().await?;
                self.link.set_local_description(answer.clone()).await?;
                self.local_applied = true;

                if let Err(err) = self.signaling.publish_answer(&answer).await {
                    warn!(room = %self.room_id, %err, "could not publish answer");
                }
                info!(room = %self.room_id, "acting as answerer");
                Ok(VoiceRole::Answerer)
            }
        }
    }

    async fn handle_peer_event(&mut self, role: VoiceRole, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if !self.local_applied {
                    debug!(room = %self.room_id, "dropping candidate gathered before local description");
                    return;
                }
                if let Err(err) = self.signaling.push_candidate(role, &candidate).await {
                    warn!(room = %self.room_id, %err, "candidate write failed");
                }
            }
            PeerEvent::StateChanged(state) => self.handle_link_state(state),
            PeerEvent::RemoteStream { stream_id } => {
                debug!(room = %self.room_id, %stream_id, "remote stream attached");
            }
        }
    }

    fn handle_link_state(&mut self, state: LinkState) {
        match state {
            LinkState::Connected => {
                info!(room = %self.room_id, "voice link connected");
                self.set_phase(VoicePhase::Connected);
            }
            LinkState::Disconnected | LinkState::Failed => {
                warn!(room = %self.room_id, ?state, "voice link lost");
                self.set_phase(VoicePhase::Disconnected);
            }
            LinkState::New | LinkState::Connecting | LinkState::Closed => {
                debug!(room = %self.room_id, ?state, "voice link state change");
            }
        }
    }

    /// Apply the answer record (offerer side only).
    async fn handle_answer(&mut self, role: VoiceRole, value: serde_json::Value) {
        if role != VoiceRole::Offerer || self.remote_applied {
            return;
        }

        let doc: SessionDescriptionDoc = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(room = %self.room_id, %err, "skipping malformed answer record");
                return;
            }
        };
        if doc.kind != SdpKind::Answer {
            debug!(room = %self.room_id, "ignoring non-answer record");
            return;
        }

        // Apply only while awaiting a remote description.
        if self.link.signaling_state().await != SignalingState::HaveLocalOffer {
            debug!(room = %self.room_id, "answer ignored, not awaiting a remote description");
            return;
        }

        match self
            .link
            .set_remote_description(SessionDescription {
                kind: doc.kind,
                sdp: doc.sdp,
            })
            .await
        {
            Ok(()) => {
                self.remote_applied = true;
                self.flush_pending().await;
            }
            Err(err) => {
                warn!(room = %self.room_id, %err, "could not apply answer");
            }
        }
    }

    async fn handle_remote_candidates(&mut self, docs: Vec<watchparty_store::Document>) {
        let total = docs.len();
        for doc in docs.into_iter().skip(self.seen_candidates) {
            let candidate: IceCandidateDoc = match serde_json::from_value(doc.data) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(room = %self.room_id, %err, "skipping malformed candidate");
                    continue;
                }
            };

            if self.remote_applied {
                if let Err(err) = self.link.add_ice_candidate(candidate).await {
                    warn!(room = %self.room_id, %err, "error adding ICE candidate");
                }
            } else {
                debug!(room = %self.room_id, "buffering candidate until remote description is set");
                self.pending.push(candidate);
            }
        }
        self.seen_candidates = self.seen_candidates.max(total);
    }

    /// Apply candidates that arrived before the remote description.
    async fn flush_pending(&mut self) {
        for candidate in std::mem::take(&mut self.pending) {
            if let Err(err) = self.link.add_ice_candidate(candidate).await {
                warn!(room = %self.room_id, %err, "error adding buffered ICE candidate");
            }
        }
    }

    async fn apply_mute(&mut self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
        self.track.set_enabled(!muted);
        if let Err(err) = self.presence.set_muted(muted).await {
            warn!(room = %self.room_id, %err, "mute flag write failed");
        }
        debug!(room = %self.room_id, muted, "mute toggled");
    }

    /// Release everything this session acquired: capture, link, heartbeat,
    /// and the participant's active flag. Subscriptions drop with the
    /// task.
    async fn teardown(&mut self) {
        self.track.stop();
        if let Err(err) = self.link.close().await {
            warn!(room = %self.room_id, %err, "error closing peer link");
        }
        if let Err(err) = self.presence.mark_inactive().await {
            warn!(room = %self.room_id, %err, "could not mark participant inactive");
        }
        self.set_phase(VoicePhase::Closed);
        info!(room = %self.room_id, "voice session closed");
    }

    fn set_phase(&self, phase: VoicePhase) {
        debug!(room = %self.room_id, ?phase, "voice phase");
        self.phase_tx.send_replace(phase);
    }
}
