//! In-process fakes for the platform collaborators
//!
//! Scripted implementations of the capture, peer-link, and player seams,
//! used by the crate's tests and runnable examples. The fakes model the
//! platform's observable behavior (signaling-state transitions, candidate
//! ordering, capture denial) without any media stack.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::audio::LevelSource;
use crate::config::IceConfig;
use crate::error::{Error, Result};
use crate::schema::{IceCandidateDoc, SdpKind};
use crate::sync::PlayerControl;
use crate::voice::peer::{
    AudioTrackHandle, MediaCapture, PeerConnector, PeerEvent, PeerLink, SessionDescription,
    SignalingState,
};

/// Scripted audio capture track
pub struct FakeTrack {
    enabled: AtomicBool,
    stopped: Arc<AtomicBool>,
    levels: Arc<Mutex<VecDeque<u8>>>,
}

impl FakeTrack {
    /// A live, enabled track with no scripted levels
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            stopped: Arc::new(AtomicBool::new(false)),
            levels: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Whether outgoing audio is currently enabled
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the capture device has been stopped
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Queue levels for the track's level source to play back
    pub fn script_levels(&self, levels: &[u8]) {
        self.levels.lock().extend(levels.iter().copied());
    }
}

impl Default for FakeTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioTrackHandle for FakeTrack {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn level_source(&self) -> Option<Box<dyn LevelSource>> {
        Some(Box::new(QueueLevelSource {
            levels: Arc::clone(&self.levels),
            stopped: Arc::clone(&self.stopped),
        }))
    }
}

/// Level source backed by a shared queue
///
/// Reports silence while the queue is empty and ends once the owning
/// track has been stopped.
pub struct QueueLevelSource {
    levels: Arc<Mutex<VecDeque<u8>>>,
    stopped: Arc<AtomicBool>,
}

impl LevelSource for QueueLevelSource {
    fn sample(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let level = self.levels.lock().pop_front().unwrap_or(0);
        buf.fill(level);
        Some(buf.len())
    }
}

/// Capture-device access that can be scripted to deny
pub struct FakeMediaCapture {
    track: Arc<FakeTrack>,
    deny: bool,
}

impl FakeMediaCapture {
    /// Capture that succeeds and hands out the same inspectable track
    pub fn new() -> Self {
        Self {
            track: Arc::new(FakeTrack::new()),
            deny: false,
        }
    }

    /// Capture that fails as a denied/unavailable device
    pub fn denied() -> Self {
        Self {
            track: Arc::new(FakeTrack::new()),
            deny: true,
        }
    }

    /// The track this capture hands out
    pub fn track(&self) -> Arc<FakeTrack> {
        Arc::clone(&self.track)
    }
}

impl Default for FakeMediaCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCapture for FakeMediaCapture {
    async fn capture_audio(&self) -> Result<Arc<dyn AudioTrackHandle>> {
        if self.deny {
            return Err(Error::MediaAccess("capture denied".to_string()));
        }
        Ok(Arc::clone(&self.track) as Arc<dyn AudioTrackHandle>)
    }
}

/// Peer link with faithful signaling-state transitions and scriptable
/// events
pub struct FakeLink {
    label: String,
    state: Mutex<SignalingState>,
    closed: AtomicBool,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidateDoc>>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

impl FakeLink {
    /// Create a link and its event stream
    pub fn new(label: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<PeerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                label: label.into(),
                state: Mutex::new(SignalingState::Stable),
                closed: AtomicBool::new(false),
                local: Mutex::new(None),
                remote: Mutex::new(None),
                candidates: Mutex::new(Vec::new()),
                events: tx,
            }),
            rx,
        )
    }

    /// Emit an event as the platform would
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    /// Emit a locally gathered candidate
    pub fn emit_candidate(&self, candidate: &str) {
        self.emit(PeerEvent::LocalCandidate(IceCandidateDoc {
            candidate: candidate.to_string(),
            sdp_mid: Some("audio".to_string()),
            sdp_m_line_index: Some(0),
        }));
    }

    /// The remote description applied so far, if any
    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    /// The local description applied so far, if any
    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    /// Remote candidates applied to this link, in order
    pub fn applied_candidates(&self) -> Vec<IceCandidateDoc> {
        self.candidates.lock().clone()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerLink for FakeLink {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: format!("offer-sdp-{}", self.label),
        })
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: format!("answer-sdp-{}", self.label),
        })
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.state.lock();
        let next = match (desc.kind, *state) {
            (SdpKind::Offer, SignalingState::Stable) => SignalingState::HaveLocalOffer,
            (SdpKind::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
            (kind, current) => {
                return Err(Error::PeerConnection(format!(
                    "cannot apply local {:?} in state {:?}",
                    kind, current
                )))
            }
        };
        *state = next;
        *self.local.lock() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.state.lock();
        let next = match (desc.kind, *state) {
            (SdpKind::Offer, SignalingState::Stable) => SignalingState::HaveRemoteOffer,
            (SdpKind::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (kind, current) => {
                return Err(Error::PeerConnection(format!(
                    "cannot apply remote {:?} in state {:?}",
                    kind, current
                )))
            }
        };
        *state = next;
        *self.remote.lock() = Some(desc);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateDoc) -> Result<()> {
        if self.remote.lock().is_none() {
            return Err(Error::PeerConnection(
                "no remote description applied".to_string(),
            ));
        }
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn signaling_state(&self) -> SignalingState {
        *self.state.lock()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that records every link it creates
pub struct FakeConnector {
    label: String,
    links: Mutex<Vec<Arc<FakeLink>>>,
    sequence: AtomicUsize,
}

impl FakeConnector {
    /// Create an empty connector
    pub fn new() -> Self {
        Self::with_label("link")
    }

    /// Create a connector whose links carry a distinguishing label
    /// (useful when several participants each bring their own connector)
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            links: Mutex::new(Vec::new()),
            sequence: AtomicUsize::new(0),
        }
    }

    /// The most recently created link
    pub fn last_link(&self) -> Option<Arc<FakeLink>> {
        self.links.lock().last().cloned()
    }

    /// Link by creation order
    pub fn link(&self, index: usize) -> Option<Arc<FakeLink>> {
        self.links.lock().get(index).cloned()
    }
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(
        &self,
        _ice: &IceConfig,
        _track: Arc<dyn AudioTrackHandle>,
    ) -> Result<(Arc<dyn PeerLink>, mpsc::UnboundedReceiver<PeerEvent>)> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let (link, rx) = FakeLink::new(format!("{}-{}", self.label, n));
        self.links.lock().push(Arc::clone(&link));
        Ok((link as Arc<dyn PeerLink>, rx))
    }
}

/// Recorded playback-widget command
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// `seek_to` with the target position
    Seek(f64),
    /// `play`
    Play,
    /// `pause`
    Pause,
}

/// Playback widget that records every command it receives
#[derive(Default)]
pub struct FakePlayer {
    position: Mutex<f64>,
    commands: Mutex<Vec<PlayerCommand>>,
}

impl FakePlayer {
    /// Create a player at position zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the position `current_time` reports
    pub fn set_position(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    /// Every command received so far, in order
    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl PlayerControl for FakePlayer {
    async fn current_time(&self) -> Result<f64> {
        Ok(*self.position.lock())
    }

    async fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) -> Result<()> {
        self.commands.lock().push(PlayerCommand::Seek(seconds));
        *self.position.lock() = seconds;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.commands.lock().push(PlayerCommand::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.commands.lock().push(PlayerCommand::Pause);
        Ok(())
    }
}
