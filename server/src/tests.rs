use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use laneclash_engine::BattleState;
use laneclash_types::protocol::ServerMessage;
use laneclash_types::{BattleStatus, Board, Card, CardRarity, PlayerId, SessionId};
use tokio::sync::mpsc;

use crate::battles::BattleCoordinator;
use crate::config::ServerConfig;
use crate::connections::ConnectionRegistry;
use crate::matchmaker::Matchmaker;
use crate::registry::SessionRegistry;
use crate::store::{BattleStore, MemoryStore, PlayerRecord, StoreError};

struct Harness<S: BattleStore> {
    connections: Arc<ConnectionRegistry>,
    registry: Arc<SessionRegistry>,
    coordinator: Arc<BattleCoordinator<S>>,
    matchmaker: Arc<Matchmaker<S>>,
}

fn harness<S: BattleStore>(store: S) -> Harness<S> {
    let config = ServerConfig {
        finalize_retries: 3,
        finalize_backoff: Duration::from_millis(1),
        ..ServerConfig::default()
    };
    let connections = Arc::new(ConnectionRegistry::new());
    let registry = Arc::new(SessionRegistry::new());
    let coordinator = Arc::new(BattleCoordinator::new(
        registry.clone(),
        connections.clone(),
        store,
        &config,
    ));
    let matchmaker = Arc::new(Matchmaker::new(
        registry.clone(),
        connections.clone(),
        coordinator.clone(),
    ));
    Harness {
        connections,
        registry,
        coordinator,
        matchmaker,
    }
}

/// Bind a player to a collector channel, standing in for a live socket.
fn connect<S: BattleStore>(
    harness: &Harness<S>,
    name: &str,
) -> (PlayerId, mpsc::UnboundedReceiver<ServerMessage>) {
    let player = PlayerId::from(name);
    let (tx, rx) = mpsc::unbounded_channel();
    harness.connections.register(&player, tx);
    (player, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn card(power: u16) -> Card {
    Card::new(format!("test-{power}"), power, CardRarity::Common)
}

/// Create a battle record in the store but a live session with fixed hands,
/// so gameplay scenarios are deterministic.
async fn scripted_session(
    harness: &Harness<MemoryStore>,
    store: &MemoryStore,
    alice: &PlayerId,
    bob: &PlayerId,
    hand_one: Vec<Card>,
    hand_two: Vec<Card>,
) -> SessionId {
    let session_id = store.create_battle(alice, bob).await.unwrap();
    harness.registry.insert(BattleState::new(
        session_id,
        [alice.clone(), bob.clone()],
        [hand_one, hand_two],
    ));
    harness.coordinator.join_battle(session_id, alice).await;
    harness.coordinator.join_battle(session_id, bob).await;
    session_id
}

async fn wait_finalized(store: &MemoryStore, id: &SessionId) -> crate::store::BattleRecord {
    for _ in 0..200 {
        if let Some(record) = store.battle(id) {
            if record.status == BattleStatus::Completed {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("battle record never finalized");
}

/// Store wrapper that fails a configured number of creates or finalizes.
#[derive(Clone)]
struct FlakyStore {
    inner: MemoryStore,
    create_failures: Arc<AtomicUsize>,
}

impl FlakyStore {
    fn new(create_failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(7),
            create_failures: Arc::new(AtomicUsize::new(create_failures)),
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
            value.checked_sub(1)
        })
        .is_ok()
}

impl BattleStore for FlakyStore {
    async fn resolve_player(&self, player: &PlayerId) -> Result<PlayerRecord, StoreError> {
        self.inner.resolve_player(player).await
    }

    async fn deal_hand(&self, player: &PlayerId, size: usize) -> Result<Vec<Card>, StoreError> {
        self.inner.deal_hand(player, size).await
    }

    async fn create_battle(
        &self,
        player1: &PlayerId,
        player2: &PlayerId,
    ) -> Result<SessionId, StoreError> {
        if take_failure(&self.create_failures) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }
        self.inner.create_battle(player1, player2).await
    }

    async fn finalize_battle(
        &self,
        session: SessionId,
        winner: Option<PlayerId>,
        final_board: Board,
    ) -> Result<(), StoreError> {
        self.inner.finalize_battle(session, winner, final_board).await
    }
}

#[tokio::test]
async fn test_queue_pairing_scenario() {
    let store = MemoryStore::new(7);
    let harness = harness(store);
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    harness.matchmaker.join(alice.clone()).await;
    harness.matchmaker.join(bob.clone()).await;
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::QueueJoined { position: 1 }]
    );
    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::QueueJoined { position: 2 }]
    );

    harness.matchmaker.tick().await;
    assert_eq!(harness.matchmaker.queue_len().await, 0);

    let alice_events = drain(&mut alice_rx);
    let bob_events = drain(&mut bob_rx);
    let session_id = match (&alice_events[..], &bob_events[..]) {
        (
            [ServerMessage::BattleFound {
                session_id: alice_session,
                opponent_id: alice_opponent,
            }],
            [ServerMessage::BattleFound {
                session_id: bob_session,
                opponent_id: bob_opponent,
            }],
        ) => {
            assert_eq!(alice_session, bob_session);
            assert_eq!(alice_opponent, &bob);
            assert_eq!(bob_opponent, &alice);
            *alice_session
        }
        other => panic!("unexpected events: {other:?}"),
    };

    // Both players join the battle; the second join starts it, with the
    // first-queued player taking the first turn.
    harness.coordinator.join_battle(session_id, &alice).await;
    assert!(drain(&mut alice_rx).is_empty());
    harness.coordinator.join_battle(session_id, &bob).await;

    let expected = vec![
        ServerMessage::BattleStart {
            first_turn: alice.clone(),
        },
        ServerMessage::TurnUpdate {
            current_turn: alice.clone(),
            turn_count: 0,
        },
    ];
    assert_eq!(drain(&mut alice_rx), expected);
    assert_eq!(drain(&mut bob_rx), expected);
}

#[tokio::test]
async fn test_queue_rejects_duplicates_and_fighters() {
    let store = MemoryStore::new(7);
    let harness = harness(store.clone());
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    harness.matchmaker.join(alice.clone()).await;
    harness.matchmaker.join(alice.clone()).await;
    let events = drain(&mut alice_rx);
    assert_eq!(events[0], ServerMessage::QueueJoined { position: 1 });
    assert_eq!(
        events[1],
        ServerMessage::Error {
            message: "already in queue".to_string()
        }
    );

    // Pair them, then try to queue again while fighting.
    harness.matchmaker.join(bob.clone()).await;
    harness.matchmaker.tick().await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.matchmaker.join(alice.clone()).await;
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::Error {
            message: "already in battle".to_string()
        }]
    );
}

#[tokio::test]
async fn test_leave_queue_and_disconnect() {
    let store = MemoryStore::new(7);
    let harness = harness(store);
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    harness.matchmaker.join(alice.clone()).await;
    harness.matchmaker.join(bob.clone()).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness.matchmaker.leave(&alice).await;
    assert_eq!(drain(&mut alice_rx), vec![ServerMessage::QueueLeft {}]);
    // Leaving again is silent.
    harness.matchmaker.leave(&alice).await;
    assert!(drain(&mut alice_rx).is_empty());

    harness.matchmaker.disconnect(&bob).await;
    assert_eq!(harness.matchmaker.queue_len().await, 0);
    assert!(drain(&mut bob_rx).is_empty());

    // Nobody left to pair.
    harness.matchmaker.tick().await;
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn test_failed_creation_requeues_pair_in_order() {
    let store = FlakyStore::new(1);
    let harness = harness(store);
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    harness.matchmaker.join(alice.clone()).await;
    harness.matchmaker.join(bob.clone()).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // First tick hits the injected failure: both players are notified and
    // land back at the front of the queue.
    harness.matchmaker.tick().await;
    assert_eq!(harness.matchmaker.queue_len().await, 2);
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::Error {
            message: "failed to create battle".to_string()
        }]
    );
    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::Error {
            message: "failed to create battle".to_string()
        }]
    );
    assert!(harness.registry.is_empty());

    // The store recovered: the same pair is matched, in the same order.
    harness.matchmaker.tick().await;
    match &drain(&mut alice_rx)[..] {
        [ServerMessage::BattleFound { opponent_id, .. }] => assert_eq!(opponent_id, &bob),
        other => panic!("unexpected events: {other:?}"),
    }
    match &drain(&mut bob_rx)[..] {
        [ServerMessage::BattleFound { opponent_id, .. }] => assert_eq!(opponent_id, &alice),
        other => panic!("unexpected events: {other:?}"),
    }
    assert_eq!(harness.registry.len(), 1);
}

#[tokio::test]
async fn test_off_turn_action_errors_only_to_actor() {
    let store = MemoryStore::new(7);
    let harness = harness(store.clone());
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    let ace = card(40);
    let ace_id = ace.id;
    let session_id =
        scripted_session(&harness, &store, &alice, &bob, vec![ace], vec![card(30)]).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // Alice places into lane 2; both observe it.
    harness
        .coordinator
        .place_card(session_id, &alice, ace_id, 2)
        .await;
    assert_eq!(drain(&mut alice_rx).len(), 1);
    assert_eq!(drain(&mut bob_rx).len(), 1);

    // Bob tries to end a turn he does not own: only bob hears about it.
    harness.coordinator.end_turn(session_id, &bob).await;
    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::Error {
            message: "not your turn".to_string()
        }]
    );
    assert!(drain(&mut alice_rx).is_empty());

    // Alice ends her turn; both see the handover.
    harness.coordinator.end_turn(session_id, &alice).await;
    let expected = vec![ServerMessage::TurnUpdate {
        current_turn: bob.clone(),
        turn_count: 1,
    }];
    assert_eq!(drain(&mut alice_rx), expected);
    assert_eq!(drain(&mut bob_rx), expected);
}

#[tokio::test]
async fn test_lethal_attack_completes_and_tears_down_session() {
    let store = MemoryStore::new(7);
    let harness = harness(store.clone());
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    let ace = card(40);
    let ace_id = ace.id;
    let chump = card(30);
    let chump_id = chump.id;
    let session_id =
        scripted_session(&harness, &store, &alice, &bob, vec![ace], vec![chump]).await;

    harness
        .coordinator
        .place_card(session_id, &alice, ace_id, 1)
        .await;
    harness.coordinator.end_turn(session_id, &alice).await;
    harness
        .coordinator
        .place_card(session_id, &bob, chump_id, 2)
        .await;
    harness.coordinator.end_turn(session_id, &bob).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    harness
        .coordinator
        .attack_card(session_id, &alice, ace_id, chump_id, 1, 2)
        .await;

    let events = drain(&mut bob_rx);
    assert_eq!(events.len(), 3);
    match &events[0] {
        ServerMessage::AttackResult {
            damage,
            target_card,
            ..
        } => {
            assert_eq!(*damage, 40);
            assert_eq!(target_card.current_power, 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(
        events[1],
        ServerMessage::CardDefeated {
            lane_index: 2,
            card_id: chump_id
        }
    );
    match &events[2] {
        ServerMessage::BattleEnd { winner_id, .. } => {
            assert_eq!(winner_id.as_ref(), Some(&alice));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(drain(&mut alice_rx), events);

    // The session is gone immediately; addressing it again fails.
    assert!(harness.registry.get(&session_id).is_none());
    harness.coordinator.end_turn(session_id, &alice).await;
    assert_eq!(
        drain(&mut alice_rx),
        vec![ServerMessage::Error {
            message: "battle not found".to_string()
        }]
    );

    // The record catches up in the background.
    let record = wait_finalized(&store, &session_id).await;
    assert_eq!(record.winner, Some(alice));
    assert!(record.final_board.is_some());
}

#[tokio::test]
async fn test_reaper_completes_idle_sessions() {
    let store = MemoryStore::new(7);
    let harness = harness(store.clone());
    let (alice, mut alice_rx) = connect(&harness, "0xalice");
    let (bob, mut bob_rx) = connect(&harness, "0xbob");

    let session_id =
        scripted_session(&harness, &store, &alice, &bob, vec![card(40)], vec![card(30)]).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // Nothing is stale yet.
    harness.coordinator.reap_idle(Duration::from_secs(3600)).await;
    assert_eq!(harness.registry.len(), 1);
    assert!(drain(&mut alice_rx).is_empty());

    // With a zero timeout everything is stale: the session is forced to a
    // no-winner end and torn down.
    harness.coordinator.reap_idle(Duration::ZERO).await;
    assert!(harness.registry.get(&session_id).is_none());
    match &drain(&mut alice_rx)[..] {
        [ServerMessage::BattleEnd { winner_id, .. }] => assert!(winner_id.is_none()),
        other => panic!("unexpected events: {other:?}"),
    }
    match &drain(&mut bob_rx)[..] {
        [ServerMessage::BattleEnd { winner_id, .. }] => assert!(winner_id.is_none()),
        other => panic!("unexpected events: {other:?}"),
    }

    let record = wait_finalized(&store, &session_id).await;
    assert!(record.winner.is_none());
}
