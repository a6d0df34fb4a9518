//! Playback synchronization
//!
//! Keeps every non-host player within a small drift of the host's
//! reported state. The host's own player drives freely; its play/pause
//! transitions are written to the room document and every guest
//! reconciles from the resulting snapshots.

mod engine;

pub use engine::{PlaybackSyncEngine, PlayerControl, PlayerEvent, SyncHandle};

use chrono::{DateTime, Utc};

use crate::schema::PlaybackStatus;

/// Compute the seek target a guest reconciles to from a room snapshot
///
/// While playing, the host's reported position is advanced by the
/// wall-clock time elapsed since the report; while paused it is used
/// as-is, with no drift compensation.
pub fn seek_target(
    status: PlaybackStatus,
    timestamp: f64,
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    match status {
        PlaybackStatus::Play => {
            let delay = (now - last_updated).num_milliseconds() as f64 / 1000.0;
            timestamp + delay
        }
        PlaybackStatus::Pause => timestamp,
    }
}
