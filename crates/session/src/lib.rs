//! Real-time coordination core for group video watching
//!
//! This crate implements the engines that keep independent clients of a
//! room consistent over the shared document store: playback lock-step
//! synchronization driven by the host's reports, store-mediated voice
//! signaling, presence heartbeats, and audio level monitoring. The
//! store, identity provider, playback widget, and peer audio primitives
//! are external collaborators injected at construction time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Application (UI, routing, auth)                         │
//! │  ↓ injects store / identity / player / media / connector │
//! │  watchparty-session                                      │
//! │  ├─ RoomManager + ChatLog     (room lifecycle, chat)     │
//! │  ├─ PlaybackSyncEngine        (host writes, guests seek) │
//! │  ├─ VoiceChannel                                         │
//! │  │   ├─ SignalingChannel      (offer/answer/candidates)  │
//! │  │   ├─ VoiceSession          (role + handshake loop)    │
//! │  │   └─ PresenceTracker       (heartbeats, active set)   │
//! │  └─ SpeakerMonitor            (level sampling loops)     │
//! │     ↓                                                    │
//! │  watchparty-store::DocumentStore                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every engine is a single task owning a channel of typed events; all
//! cross-client coordination goes through store documents, delivered in
//! write order per document.
//!
//! # Example
//!
//! ```
//! use watchparty_session::{PartyConfig, RoomManager, UserIdentity};
//! use watchparty_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> watchparty_session::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let rooms = RoomManager::new(
//!     store,
//!     UserIdentity::new("host-uid").with_display_name("Host"),
//!     PartyConfig::default(),
//! )?;
//!
//! let room_id = rooms.create_room("https://youtu.be/dQw4w9WgXcQ").await?;
//! assert!(rooms.is_host(&rooms.room(&room_id).await?));
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod audio;
pub mod config;
mod error;
pub mod identity;
pub mod presence;
pub mod room;
pub mod schema;
pub mod sync;
mod task;
pub mod voice;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::{IceConfig, PartyConfig};
pub use error::{Error, Result};
pub use identity::UserIdentity;
pub use room::{ChatEntry, ChatFeed, ChatLog, RoomEvent, RoomEvents, RoomManager};
pub use sync::{seek_target, PlaybackSyncEngine, PlayerControl, PlayerEvent, SyncHandle};
pub use task::TaskGuard;
pub use voice::{VoiceChannel, VoicePhase, VoiceRole};
