//! Matchmaking service.
//!
//! Owns the waiting list behind a single async lock and runs the periodic
//! pairing pass. Holding the lock for the whole pass serializes pairing
//! against concurrent joins and leaves; distinct battle sessions are
//! unaffected.

use std::sync::Arc;

use laneclash_engine::{MatchQueue, QueueError};
use laneclash_types::protocol::ServerMessage;
use laneclash_types::PlayerId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::battles::BattleCoordinator;
use crate::connections::ConnectionRegistry;
use crate::registry::SessionRegistry;
use crate::store::BattleStore;

pub struct Matchmaker<S: BattleStore> {
    queue: Mutex<MatchQueue>,
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionRegistry>,
    coordinator: Arc<BattleCoordinator<S>>,
}

impl<S: BattleStore> Matchmaker<S> {
    pub fn new(
        registry: Arc<SessionRegistry>,
        connections: Arc<ConnectionRegistry>,
        coordinator: Arc<BattleCoordinator<S>>,
    ) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::new()),
            registry,
            connections,
            coordinator,
        }
    }

    /// Enqueue a player. Players already waiting or already fighting are
    /// rejected with an error event; accepted joins are answered with their
    /// 1-based queue position.
    pub async fn join(&self, player: PlayerId) {
        if self.registry.contains_player(&player) {
            debug!(%player, "queue join rejected: already in battle");
            self.connections.send(
                &player,
                ServerMessage::Error {
                    message: QueueError::AlreadyInBattle.to_string(),
                },
            );
            return;
        }
        let result = self.queue.lock().await.join(player.clone());
        match result {
            Ok(position) => {
                info!(%player, position, "player joined matchmaking queue");
                self.connections
                    .send(&player, ServerMessage::QueueJoined { position });
            }
            Err(err) => {
                debug!(%player, error = %err, "queue join rejected");
                self.connections.send(
                    &player,
                    ServerMessage::Error {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// Dequeue a player. Absent players are a silent no-op.
    pub async fn leave(&self, player: &PlayerId) {
        let removed = self.queue.lock().await.leave(player);
        if removed {
            info!(%player, "player left matchmaking queue");
            self.connections.send(player, ServerMessage::QueueLeft {});
        }
    }

    /// Drop a disconnected player's queue entry.
    pub async fn disconnect(&self, player: &PlayerId) {
        if self.queue.lock().await.leave(player) {
            debug!(%player, "removed disconnected player from queue");
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// One pairing pass: match the two oldest waiting players while at
    /// least two remain. A failed session creation requeues the pair at the
    /// front and ends the pass; the same pair would otherwise be retried in
    /// a tight loop while the store is down.
    pub async fn tick(&self) {
        let mut queue = self.queue.lock().await;
        while queue.len() >= 2 {
            let Some((first, second)) = queue.pop_pair() else {
                break;
            };
            match self
                .coordinator
                .create_session(&first.player_id, &second.player_id)
                .await
            {
                Ok(session_id) => {
                    info!(
                        %session_id,
                        player1 = %first.player_id,
                        player2 = %second.player_id,
                        "paired players into battle"
                    );
                    self.connections.send(
                        &first.player_id,
                        ServerMessage::BattleFound {
                            session_id,
                            opponent_id: second.player_id.clone(),
                        },
                    );
                    self.connections.send(
                        &second.player_id,
                        ServerMessage::BattleFound {
                            session_id,
                            opponent_id: first.player_id.clone(),
                        },
                    );
                }
                Err(err) => {
                    warn!(error = %err, "battle creation failed; requeueing pair at the front");
                    for player in [&first.player_id, &second.player_id] {
                        self.connections.send(
                            player,
                            ServerMessage::Error {
                                message: "failed to create battle".to_string(),
                            },
                        );
                    }
                    queue.requeue_front(first, second);
                    break;
                }
            }
        }
    }
}
