//! End-to-end voice handshake over the in-memory store
//!
//! Exercises role determination, answer application, candidate routing
//! and buffering, mute, and teardown with two simulated participants.

use std::sync::Arc;
use std::time::Duration;

use watchparty_session::schema;
use watchparty_session::testkit::{FakeConnector, FakeLink, FakeMediaCapture, FakeTrack};
use watchparty_session::voice::peer::{LinkState, PeerEvent};
use watchparty_session::{PartyConfig, UserIdentity, VoiceChannel, VoicePhase};
use watchparty_store::{DocumentStore, MemoryStore};

const ROOM: &str = "r1";

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

struct Participant {
    channel: VoiceChannel,
    link: Arc<FakeLink>,
    track: Arc<FakeTrack>,
}

async fn join(store: &Arc<MemoryStore>, uid: &str) -> Participant {
    let media = FakeMediaCapture::new();
    let connector = FakeConnector::with_label(uid);
    let channel = VoiceChannel::join(
        Arc::clone(store) as Arc<dyn DocumentStore>,
        UserIdentity::new(uid).with_display_name(uid),
        PartyConfig::default(),
        ROOM,
        &media,
        &connector,
    )
    .await
    .expect("join must succeed");
    settle().await;

    let link = connector.last_link().expect("connector must create a link");
    Participant {
        channel,
        link,
        track: media.track(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_sequential_joiners_get_exclusive_roles() {
    let store = Arc::new(MemoryStore::new());

    let alice = join(&store, "alice").await;
    let bob = join(&store, "bob").await;

    // The first joiner persisted the only offer.
    let offer = store
        .get(&schema::offer(ROOM))
        .await
        .unwrap()
        .expect("offer record must exist");
    assert_eq!(offer["userId"], "alice");

    assert_eq!(*alice.channel.phase().borrow(), VoicePhase::Offering);
    assert_eq!(*bob.channel.phase().borrow(), VoicePhase::Answering);

    // The answerer applied the offer and published the only answer.
    assert_eq!(
        bob.link.remote_description().unwrap().sdp,
        "offer-sdp-alice-0"
    );
    let answer = store
        .get(&schema::answer(ROOM))
        .await
        .unwrap()
        .expect("answer record must exist");
    assert_eq!(answer["userId"], "bob");

    // The offerer applied that answer while awaiting a remote description.
    assert_eq!(
        alice.link.remote_description().unwrap().sdp,
        "answer-sdp-bob-0"
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_joiners_still_split_roles() {
    let store = Arc::new(MemoryStore::new());

    let (alice, bob) = tokio::join!(join(&store, "alice"), join(&store, "bob"));
    settle().await;

    let offer = store
        .get(&schema::offer(ROOM))
        .await
        .unwrap()
        .expect("offer record must exist");
    let offerer_uid = offer["userId"].as_str().unwrap().to_string();

    let phases = [
        ("alice", *alice.channel.phase().borrow()),
        ("bob", *bob.channel.phase().borrow()),
    ];
    for (uid, phase) in phases {
        if uid == offerer_uid {
            assert_eq!(phase, VoicePhase::Offering, "{uid} won the offer");
        } else {
            assert_eq!(phase, VoicePhase::Answering, "{uid} must switch to answerer");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_candidates_route_by_role_and_reach_the_peer() {
    let store = Arc::new(MemoryStore::new());
    let alice = join(&store, "alice").await;
    let bob = join(&store, "bob").await;

    alice.link.emit_candidate("cand-alice");
    bob.link.emit_candidate("cand-bob");
    settle().await;

    // Offerer candidates land in callerCandidates, answerer candidates in
    // calleeCandidates, never the other way around.
    let mut caller = store
        .watch_collection(&schema::caller_candidates(ROOM))
        .await
        .unwrap();
    let caller_docs = caller.next().await.unwrap();
    assert_eq!(caller_docs.len(), 1);
    assert_eq!(caller_docs[0].data["candidate"], "cand-alice");

    let mut callee = store
        .watch_collection(&schema::callee_candidates(ROOM))
        .await
        .unwrap();
    let callee_docs = callee.next().await.unwrap();
    assert_eq!(callee_docs.len(), 1);
    assert_eq!(callee_docs[0].data["candidate"], "cand-bob");

    // Each side applied the other's candidate.
    let applied_by_bob: Vec<String> = bob
        .link
        .applied_candidates()
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(applied_by_bob, vec!["cand-alice".to_string()]);

    let applied_by_alice: Vec<String> = alice
        .link
        .applied_candidates()
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(applied_by_alice, vec!["cand-bob".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_early_remote_candidates_are_buffered_until_answer() {
    let store = Arc::new(MemoryStore::new());
    let alice = join(&store, "alice").await;

    // A callee candidate lands before any answer exists; the offerer has
    // no remote description yet and must buffer it, not drop it.
    store
        .add(
            &schema::callee_candidates(ROOM),
            serde_json::json!({ "candidate": "early-cand" }),
        )
        .await
        .unwrap();
    settle().await;
    assert!(alice.link.applied_candidates().is_empty());

    // The answerer arrives, the answer is applied, the buffer flushes.
    let _bob = join(&store, "bob").await;
    settle().await;

    let applied: Vec<String> = alice
        .link
        .applied_candidates()
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(applied, vec!["early-cand".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_link_state_drives_phase() {
    let store = Arc::new(MemoryStore::new());
    let alice = join(&store, "alice").await;

    alice.link.emit(PeerEvent::StateChanged(LinkState::Connected));
    settle().await;
    assert_eq!(*alice.channel.phase().borrow(), VoicePhase::Connected);
    assert!(alice.channel.phase().borrow().is_connected());

    // Loss reports a not-connected state; no renegotiation is attempted.
    alice.link.emit(PeerEvent::StateChanged(LinkState::Failed));
    settle().await;
    assert_eq!(*alice.channel.phase().borrow(), VoicePhase::Disconnected);
    assert!(!alice.link.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_denied_capture_is_a_nonfatal_media_error() {
    let store = Arc::new(MemoryStore::new());
    let media = FakeMediaCapture::denied();
    let connector = FakeConnector::new();

    let err = VoiceChannel::join(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        UserIdentity::new("alice"),
        PartyConfig::default(),
        ROOM,
        &media,
        &connector,
    )
    .await
    .expect_err("denied capture must fail the join");

    assert!(err.is_media_error());
    // Nothing was signaled and no presence was recorded.
    assert!(store.get(&schema::offer(ROOM)).await.unwrap().is_none());
    assert!(store
        .get(&schema::participant(ROOM, "alice"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_mute_disables_track_without_teardown() {
    let store = Arc::new(MemoryStore::new());
    let alice = join(&store, "alice").await;

    alice.channel.set_muted(true);
    settle().await;

    assert!(alice.channel.is_muted());
    assert!(!alice.track.enabled(), "outgoing audio must be disabled");
    assert!(!alice.track.stopped(), "capture keeps running while muted");
    assert!(!alice.link.is_closed(), "mute must not tear down the link");

    let participant = store
        .get(&schema::participant(ROOM, "alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(participant["muted"], true);

    alice.channel.set_muted(false);
    settle().await;
    assert!(alice.track.enabled());
}

#[tokio::test(start_paused = true)]
async fn test_leave_releases_everything_but_keeps_records() {
    let store = Arc::new(MemoryStore::new());
    let alice = join(&store, "alice").await;
    let link = Arc::clone(&alice.link);
    let track = Arc::clone(&alice.track);

    alice.channel.leave().await;

    assert!(track.stopped());
    assert!(link.is_closed());

    // The participant record is marked inactive, never deleted; the offer
    // record also persists (stale offers are a known limitation).
    let participant = store
        .get(&schema::participant(ROOM, "alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(participant["active"], false);
    assert!(store.get(&schema::offer(ROOM)).await.unwrap().is_some());
}
