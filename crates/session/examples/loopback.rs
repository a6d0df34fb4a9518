//! Two simulated participants sharing a room end to end
//!
//! Drives the full coordination flow (room creation, chat, voice
//! handshake, candidate exchange, playback sync, speaking detection,
//! teardown) against the in-memory store and the scripted platform
//! fakes.
//!
//! Run with:
//!
//! ```sh
//! cargo run -p watchparty-session --example loopback --features testkit
//! ```

use std::sync::Arc;
use std::time::Duration;

use watchparty_session::testkit::{FakeConnector, FakeMediaCapture, FakePlayer};
use watchparty_session::voice::peer::{LinkState, PeerEvent};
use watchparty_session::{
    PartyConfig, PlaybackSyncEngine, PlayerEvent as WidgetEvent, RoomManager, UserIdentity,
    VoiceChannel,
};
use watchparty_store::{DocumentStore, MemoryStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> watchparty_session::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let config = PartyConfig::default();

    let alice = UserIdentity::new("alice").with_display_name("Alice");
    let bob = UserIdentity::new("bob").with_display_name("Bob");

    // Alice hosts a room.
    let rooms = RoomManager::new(Arc::clone(&store), alice.clone(), config.clone())?;
    let room_id = rooms.create_room("https://youtu.be/dQw4w9WgXcQ").await?;
    println!("room created: {room_id}");

    // Chat flows through the room's append-only collection.
    rooms.chat(&room_id).send("welcome to the party!").await?;
    let bob_rooms = RoomManager::new(Arc::clone(&store), bob.clone(), config.clone())?;
    let mut chat = bob_rooms.chat(&room_id).feed().await?;
    if let Some(messages) = chat.next().await {
        for entry in &messages {
            println!(
                "chat: {}: {}",
                entry.message.display_name.as_deref().unwrap_or("?"),
                entry.message.message
            );
        }
    }

    // Both participants join voice; the first claims the offer.
    let alice_media = FakeMediaCapture::new();
    let alice_connector = FakeConnector::with_label("alice");
    let alice_voice = VoiceChannel::join(
        Arc::clone(&store),
        alice.clone(),
        config.clone(),
        &room_id,
        &alice_media,
        &alice_connector,
    )
    .await?;

    let bob_media = FakeMediaCapture::new();
    let bob_connector = FakeConnector::with_label("bob");
    let bob_voice = VoiceChannel::join(
        Arc::clone(&store),
        bob.clone(),
        config.clone(),
        &room_id,
        &bob_media,
        &bob_connector,
    )
    .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let alice_link = alice_connector.last_link().expect("alice link");
    let bob_link = bob_connector.last_link().expect("bob link");

    // Candidate exchange and connection establishment.
    alice_link.emit_candidate("candidate:alice 1 udp 2122260223 192.0.2.1 54400 typ host");
    bob_link.emit_candidate("candidate:bob 1 udp 2122260223 192.0.2.2 54401 typ host");
    alice_link.emit(PeerEvent::StateChanged(LinkState::Connected));
    bob_link.emit(PeerEvent::StateChanged(LinkState::Connected));
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("alice phase: {:?}", *alice_voice.phase().borrow());
    println!("bob phase:   {:?}", *bob_voice.phase().borrow());
    println!(
        "participants seen by bob: {:?}",
        bob_voice
            .participants()
            .borrow()
            .iter()
            .map(|p| p.display_name.clone())
            .collect::<Vec<_>>()
    );

    // Alice speaks; her local monitor claims the active-speaker slot.
    alice_media.track().script_levels(&[80; 64]);
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!(
        "active speaker for alice's view: {:?}",
        alice_voice.active_speaker().borrow().clone()
    );

    // Playback sync: Alice is the host, Bob's player follows hers.
    let alice_player = Arc::new(FakePlayer::new());
    let bob_player = Arc::new(FakePlayer::new());
    let host_sync = PlaybackSyncEngine::start(
        Arc::clone(&store),
        alice.clone(),
        config.clone(),
        &room_id,
        alice_player.clone(),
    )
    .await?;
    let _guest_sync = PlaybackSyncEngine::start(
        Arc::clone(&store),
        bob.clone(),
        config.clone(),
        &room_id,
        bob_player.clone(),
    )
    .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    alice_player.set_position(30.0);
    host_sync.player_event(WidgetEvent::Playing);
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("bob's player received: {:?}", bob_player.commands());

    // Orderly teardown: capture stops, links close, records go inactive.
    alice_voice.leave().await;
    bob_voice.leave().await;
    rooms.end_party(&room_id).await?;
    println!("party ended");

    Ok(())
}
