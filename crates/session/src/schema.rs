//! Binding store schema for party rooms
//!
//! Path helpers and document types for the `rooms/{roomId}` document and
//! its sub-collections (`chat`, `voiceParticipants`, `offers/current`,
//! `answers/current`, `callerCandidates`, `calleeCandidates`). Field names
//! and wall-clock encodings (epoch milliseconds) are part of the external
//! contract and must not change independently of the other clients of the
//! store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use watchparty_store::{CollectionPath, DocPath};

/// Top-level rooms collection
pub fn rooms() -> CollectionPath {
    CollectionPath::root("rooms")
}

/// Room document
pub fn room(room_id: &str) -> DocPath {
    rooms().doc(room_id)
}

/// Append-only chat sub-collection
pub fn chat(room_id: &str) -> CollectionPath {
    room(room_id).collection("chat")
}

/// Voice participant sub-collection, keyed by user id
pub fn voice_participants(room_id: &str) -> CollectionPath {
    room(room_id).collection("voiceParticipants")
}

/// A user's voice participant record
pub fn participant(room_id: &str, uid: &str) -> DocPath {
    voice_participants(room_id).doc(uid)
}

/// The room's singleton offer record
pub fn offer(room_id: &str) -> DocPath {
    room(room_id).collection("offers").doc("current")
}

/// The room's singleton answer record
pub fn answer(room_id: &str) -> DocPath {
    room(room_id).collection("answers").doc("current")
}

/// ICE candidates written by the offerer
pub fn caller_candidates(room_id: &str) -> CollectionPath {
    room(room_id).collection("callerCandidates")
}

/// ICE candidates written by the answerer
pub fn callee_candidates(room_id: &str) -> CollectionPath {
    room(room_id).collection("calleeCandidates")
}

/// Playback state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Host is playing
    Play,
    /// Host is paused
    Pause,
}

/// The `rooms/{roomId}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoc {
    /// Owning participant; the only identity whose playback writes are
    /// authoritative
    pub host_id: String,

    /// Reference to the remote video content
    pub video_id: String,

    /// Playback state at the last host transition
    pub status: PlaybackStatus,

    /// Position in the content (seconds) at the last host transition
    pub timestamp: f64,

    /// Wall-clock instant of the last host transition
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,

    /// Heartbeat instant; written by any participant, never consumed here
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_active: Option<DateTime<Utc>>,
}

/// Host playback-transition write: the subset of [`RoomDoc`] a host
/// updates on every play/pause transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    /// New playback state
    pub status: PlaybackStatus,

    /// Playback position (seconds) when the transition happened
    pub timestamp: f64,

    /// Transition instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

/// Kind of a stored session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Offerer's proposal
    Offer,
    /// Answerer's response
    Answer,
}

/// The `offers/current` / `answers/current` documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptionDoc {
    /// "offer" or "answer"
    #[serde(rename = "type")]
    pub kind: SdpKind,

    /// Session description payload
    pub sdp: String,

    /// Identity that produced the description
    pub user_id: String,

    /// Creation instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// An ICE candidate descriptor, as appended to the candidate collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateDoc {
    /// Candidate string (address/port/protocol)
    pub candidate: String,

    /// Media-line identifier, when the platform provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Media-line index, when the platform provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// The `voiceParticipants/{uid}` document, merge-upserted on every
/// heartbeat and mute toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceParticipantDoc {
    /// Participant identity
    pub user_id: String,

    /// Display name (placeholder-derived when the identity has none)
    pub display_name: String,

    /// Avatar URL
    #[serde(rename = "photoURL")]
    pub photo_url: String,

    /// Account email, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Cleared on orderly teardown; stale `true` values are filtered by
    /// the liveness window instead
    pub active: bool,

    /// Last heartbeat instant
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_ping: DateTime<Utc>,

    /// Whether the participant's outgoing audio is disabled
    #[serde(default)]
    pub muted: bool,
}

/// A `chat/{autoId}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDoc {
    /// Author identity
    pub uid: String,

    /// Message body
    pub message: String,

    /// Author display name, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Author avatar, if recorded
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Send instant; consumers order ascending by this field
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_paths_match_store_contract() {
        assert_eq!(room("r1").as_str(), "rooms/r1");
        assert_eq!(chat("r1").as_str(), "rooms/r1/chat");
        assert_eq!(offer("r1").as_str(), "rooms/r1/offers/current");
        assert_eq!(answer("r1").as_str(), "rooms/r1/answers/current");
        assert_eq!(caller_candidates("r1").as_str(), "rooms/r1/callerCandidates");
        assert_eq!(callee_candidates("r1").as_str(), "rooms/r1/calleeCandidates");
        assert_eq!(
            participant("r1", "u1").as_str(),
            "rooms/r1/voiceParticipants/u1"
        );
    }

    #[test]
    fn test_room_doc_field_names() {
        let doc = RoomDoc {
            host_id: "host".to_string(),
            video_id: "dQw4w9WgXcQ".to_string(),
            status: PlaybackStatus::Play,
            timestamp: 120.0,
            last_updated: t0(),
            last_active: None,
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["hostId"], "host");
        assert_eq!(value["videoId"], "dQw4w9WgXcQ");
        assert_eq!(value["status"], "play");
        assert_eq!(value["lastUpdated"], 1_700_000_000_000i64);
        assert!(value.get("lastActive").is_none());

        let back: RoomDoc = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_session_description_doc_uses_type_field() {
        let doc = SessionDescriptionDoc {
            kind: SdpKind::Offer,
            sdp: "v=0".to_string(),
            user_id: "alice".to_string(),
            created_at: t0(),
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "offer");
        assert_eq!(value["userId"], "alice");
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_ice_candidate_field_names() {
        let doc = IceCandidateDoc {
            candidate: "candidate:1 1 udp 2122260223 192.0.2.1 54400 typ host".to_string(),
            sdp_mid: Some("audio".to_string()),
            sdp_m_line_index: Some(0),
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["sdpMid"], "audio");
        assert_eq!(value["sdpMLineIndex"], 0);
    }

    #[test]
    fn test_participant_photo_field_name() {
        let doc = VoiceParticipantDoc {
            user_id: "u1".to_string(),
            display_name: "Ada".to_string(),
            photo_url: "https://example.org/a.png".to_string(),
            email: None,
            active: true,
            last_ping: t0(),
            muted: false,
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["photoURL"], "https://example.org/a.png");
        assert_eq!(value["lastPing"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_chat_message_tolerates_minimal_payload() {
        // Some clients only record uid/message/timestamp.
        let value = serde_json::json!({
            "uid": "u1",
            "message": "hi",
            "timestamp": 1_700_000_000_000i64,
        });

        let doc: ChatMessageDoc = serde_json::from_value(value).unwrap();
        assert_eq!(doc.display_name, None);
        assert_eq!(doc.timestamp, t0());
    }
}
