//! Peer audio primitives
//!
//! Capture-device access, peer connection establishment, and ICE candidate
//! events are platform capabilities the core depends on but does not
//! implement. The platform layer (browser bindings, a native WebRTC stack,
//! or the in-process fakes used by tests) implements these traits and the
//! session consumes them; nothing here links a media stack.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::LevelSource;
use crate::config::IceConfig;
use crate::error::Result;
use crate::schema::{IceCandidateDoc, SdpKind};

/// Connection state reported by the underlying link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link created, negotiation not finished
    New,
    /// Transports are being established
    Connecting,
    /// Media is flowing
    Connected,
    /// Link lost; no automatic renegotiation is attempted
    Disconnected,
    /// Negotiation or transport failed
    Failed,
    /// Link closed locally
    Closed,
}

/// Negotiation phase of the link, gating which operations are valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No pending local or remote description
    Stable,
    /// A local offer has been applied; awaiting the remote answer
    HaveLocalOffer,
    /// A remote offer has been applied; a local answer is owed
    HaveRemoteOffer,
}

/// A session description produced or consumed by a link
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescription {
    /// Offer or answer
    pub kind: SdpKind,

    /// Description payload
    pub sdp: String,
}

/// Events emitted by a peer link
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A locally gathered ICE candidate
    LocalCandidate(IceCandidateDoc),

    /// The link's connection state changed
    StateChanged(LinkState),

    /// A remote audio stream arrived
    RemoteStream {
        /// Platform identifier of the stream
        stream_id: String,
    },
}

/// Local audio capture track
pub trait AudioTrackHandle: Send + Sync {
    /// Enable or disable the outgoing audio (mute control)
    fn set_enabled(&self, enabled: bool);

    /// Stop the capture device
    fn stop(&self);

    /// Frequency-domain level probe for this track, when the platform
    /// exposes one
    fn level_source(&self) -> Option<Box<dyn LevelSource>>;
}

/// Capture-device access
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Request local audio-only capture
    ///
    /// # Errors
    ///
    /// `MediaAccess` when the device is denied or unavailable; surfaced to
    /// the UI as a non-fatal connection failure.
    async fn capture_audio(&self) -> Result<Arc<dyn AudioTrackHandle>>;
}

/// A two-party peer connection
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Create a local offer description (does not apply it)
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create a local answer description (does not apply it)
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    /// Apply a remote description
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Apply a remote ICE candidate; valid only once the remote
    /// description is set
    async fn add_ice_candidate(&self, candidate: IceCandidateDoc) -> Result<()>;

    /// Current negotiation phase
    async fn signaling_state(&self) -> SignalingState;

    /// Close the link and release its transports
    async fn close(&self) -> Result<()>;
}

/// Peer connection establishment
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a link with the local track attached; returns the link and
    /// its event stream
    async fn connect(
        &self,
        ice: &IceConfig,
        track: Arc<dyn AudioTrackHandle>,
    ) -> Result<(Arc<dyn PeerLink>, mpsc::UnboundedReceiver<PeerEvent>)>;
}
