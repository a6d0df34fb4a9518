//! Host-to-guest playback synchronization over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use watchparty_session::testkit::{FakePlayer, PlayerCommand};
use watchparty_session::{
    PartyConfig, PlaybackSyncEngine, PlayerEvent, RoomManager, UserIdentity,
};
use watchparty_store::{DocumentStore, MemoryStore};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_guest_follows_host_transitions() {
    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn DocumentStore> = Arc::clone(&store) as _;

    let host_rooms = RoomManager::new(
        Arc::clone(&store_dyn),
        UserIdentity::new("host"),
        PartyConfig::default(),
    )
    .unwrap();
    let room_id = host_rooms
        .create_room("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();

    let host_player = Arc::new(FakePlayer::new());
    let guest_player = Arc::new(FakePlayer::new());

    let host = PlaybackSyncEngine::start(
        Arc::clone(&store_dyn),
        UserIdentity::new("host"),
        PartyConfig::default(),
        &room_id,
        host_player.clone(),
    )
    .await
    .unwrap();

    let _guest = PlaybackSyncEngine::start(
        store_dyn,
        UserIdentity::new("guest"),
        PartyConfig::default(),
        &room_id,
        guest_player.clone(),
    )
    .await
    .unwrap();
    settle().await;

    // The freshly created room is paused at zero; the guest reconciled to
    // that snapshot, the host ignored it.
    assert_eq!(
        guest_player.commands(),
        vec![PlayerCommand::Seek(0.0), PlayerCommand::Pause]
    );
    assert!(host_player.commands().is_empty());

    // Host starts playing at 42.5s.
    host_player.set_position(42.5);
    host.player_event(PlayerEvent::Playing);
    settle().await;

    let commands = guest_player.commands();
    assert_eq!(commands.len(), 4);
    match commands[2] {
        PlayerCommand::Seek(target) => {
            assert!((target - 42.5).abs() < 0.5, "target was {target}");
        }
        ref other => panic!("expected seek, got {:?}", other),
    }
    assert_eq!(commands[3], PlayerCommand::Play);

    // Host pauses at 100s; the guest seeks there exactly, no drift
    // compensation.
    host_player.set_position(100.0);
    host.player_event(PlayerEvent::Paused);
    settle().await;

    let commands = guest_player.commands();
    assert_eq!(
        &commands[4..],
        &[PlayerCommand::Seek(100.0), PlayerCommand::Pause]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guest_transitions_never_write() {
    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn DocumentStore> = Arc::clone(&store) as _;

    let rooms = RoomManager::new(
        Arc::clone(&store_dyn),
        UserIdentity::new("host"),
        PartyConfig::default(),
    )
    .unwrap();
    let room_id = rooms
        .create_room("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();

    let guest_player = Arc::new(FakePlayer::new());
    let guest = PlaybackSyncEngine::start(
        store_dyn,
        UserIdentity::new("guest"),
        PartyConfig::default(),
        &room_id,
        guest_player.clone(),
    )
    .await
    .unwrap();
    settle().await;

    // Let the reconciliation guard expire, then simulate a local scrub.
    tokio::time::sleep(Duration::from_secs(1)).await;
    guest_player.set_position(500.0);
    guest.player_event(PlayerEvent::Playing);
    settle().await;

    let doc = rooms.room(&room_id).await.unwrap();
    assert_eq!(doc.timestamp, 0.0, "guest events must never reach the room");
}
