//! Battle session coordination.
//!
//! Bridges the deterministic battle state machine to storage and connected
//! players: creates sessions for freshly paired players, dispatches actions
//! to the addressed session under its lock, fans the resulting events out to
//! both participants, and drives the terminal lifecycle (persist the outcome,
//! drop the session from the registry).

use std::sync::Arc;
use std::time::{Duration, Instant};

use laneclash_engine::{BattleError, BattleState};
use laneclash_types::protocol::ServerMessage;
use laneclash_types::{CardId, MatchOutcome, PlayerId, SessionId};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connections::ConnectionRegistry;
use crate::registry::SessionRegistry;
use crate::store::{BattleStore, StoreError};

pub struct BattleCoordinator<S: BattleStore> {
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionRegistry>,
    store: S,
    hand_size: usize,
    finalize_retries: u32,
    finalize_backoff: Duration,
}

impl<S: BattleStore> BattleCoordinator<S> {
    pub fn new(
        registry: Arc<SessionRegistry>,
        connections: Arc<ConnectionRegistry>,
        store: S,
        config: &ServerConfig,
    ) -> Self {
        Self {
            registry,
            connections,
            store,
            hand_size: config.hand_size,
            finalize_retries: config.finalize_retries,
            finalize_backoff: config.finalize_backoff,
        }
    }

    /// Create a live session for a paired match: resolve both players, deal
    /// both hands, write the battle record, then make the session visible.
    /// A storage failure at any step leaves no session behind.
    pub async fn create_session(
        &self,
        player1: &PlayerId,
        player2: &PlayerId,
    ) -> Result<SessionId, StoreError> {
        self.store.resolve_player(player1).await?;
        self.store.resolve_player(player2).await?;
        let hand1 = self.store.deal_hand(player1, self.hand_size).await?;
        let hand2 = self.store.deal_hand(player2, self.hand_size).await?;
        let session_id = self.store.create_battle(player1, player2).await?;

        let battle = BattleState::new(
            session_id,
            [player1.clone(), player2.clone()],
            [hand1, hand2],
        );
        self.registry.insert(battle);
        info!(%session_id, %player1, %player2, "battle session created");
        Ok(session_id)
    }

    pub async fn join_battle(&self, session_id: SessionId, player: &PlayerId) {
        self.apply(session_id, player, |battle| battle.join(player))
            .await;
    }

    pub async fn place_card(
        &self,
        session_id: SessionId,
        player: &PlayerId,
        card_id: CardId,
        lane_index: u8,
    ) {
        self.apply(session_id, player, |battle| {
            battle.place_card(player, card_id, lane_index)
        })
        .await;
    }

    pub async fn attack_card(
        &self,
        session_id: SessionId,
        player: &PlayerId,
        attacking_card_id: CardId,
        target_card_id: CardId,
        from_lane: u8,
        to_lane: u8,
    ) {
        self.apply(session_id, player, |battle| {
            battle.attack_card(player, attacking_card_id, target_card_id, from_lane, to_lane)
        })
        .await;
    }

    pub async fn move_card(
        &self,
        session_id: SessionId,
        player: &PlayerId,
        card_id: CardId,
        from_lane: u8,
        to_lane: u8,
    ) {
        self.apply(session_id, player, |battle| {
            battle.move_card(player, card_id, from_lane, to_lane)
        })
        .await;
    }

    pub async fn end_turn(&self, session_id: SessionId, player: &PlayerId) {
        self.apply(session_id, player, |battle| battle.end_turn(player))
            .await;
    }

    /// Run one action against the addressed session. Accepted actions commit
    /// under the session lock and their events are delivered to both
    /// participants in commit order; rejections are surfaced only to the
    /// acting connection.
    async fn apply<F>(&self, session_id: SessionId, actor: &PlayerId, op: F)
    where
        F: FnOnce(&mut BattleState) -> Result<Vec<ServerMessage>, BattleError>,
    {
        let Some(cell) = self.registry.get(&session_id) else {
            self.connections.send(
                actor,
                ServerMessage::Error {
                    message: "battle not found".to_string(),
                },
            );
            return;
        };

        let result = {
            let mut session = cell.lock().unwrap();
            match op(&mut session.battle) {
                Ok(events) => {
                    session.last_action = Instant::now();
                    Ok((
                        events,
                        session.battle.players().clone(),
                        session.battle.outcome().cloned(),
                        session.created_at,
                    ))
                }
                Err(err) => Err(err),
            }
        };

        match result {
            Ok((events, participants, outcome, created_at)) => {
                for event in &events {
                    self.connections.send_each(&participants, event);
                }
                if let Some(outcome) = outcome {
                    self.registry.remove(&session_id);
                    info!(
                        %session_id,
                        winner = ?outcome.winner,
                        duration_ms = created_at.elapsed().as_millis() as u64,
                        "battle completed"
                    );
                    self.spawn_finalize(outcome);
                }
            }
            Err(err) => {
                debug!(%session_id, player = %actor, error = %err, "battle action rejected");
                self.connections.send(
                    actor,
                    ServerMessage::Error {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// Sweep live sessions and force-complete any that have sat idle past
    /// the timeout. Reaped battles finalize with no winner.
    pub async fn reap_idle(&self, idle_timeout: Duration) {
        for (session_id, cell) in self.registry.entries() {
            let reaped = {
                let mut session = cell.lock().unwrap();
                if session.last_action.elapsed() < idle_timeout {
                    None
                } else {
                    let events = session.battle.force_complete(None);
                    if events.is_empty() {
                        None
                    } else {
                        Some((
                            events,
                            session.battle.players().clone(),
                            session.battle.outcome().cloned(),
                        ))
                    }
                }
            };
            let Some((events, participants, outcome)) = reaped else {
                continue;
            };
            warn!(%session_id, "reaping idle battle session");
            for event in &events {
                self.connections.send_each(&participants, event);
            }
            self.registry.remove(&session_id);
            if let Some(outcome) = outcome {
                self.spawn_finalize(outcome);
            }
        }
    }

    /// Persist the outcome in the background. The live result has already
    /// been delivered; a write failure is retried with backoff and, once
    /// exhausted, logged as a consistency fault rather than propagated.
    fn spawn_finalize(&self, outcome: MatchOutcome) {
        let store = self.store.clone();
        let retries = self.finalize_retries;
        let mut backoff = self.finalize_backoff;
        tokio::spawn(async move {
            let session_id = outcome.session_id;
            let mut attempt = 0u32;
            loop {
                match store
                    .finalize_battle(
                        session_id,
                        outcome.winner.clone(),
                        outcome.final_board.clone(),
                    )
                    .await
                {
                    Ok(()) => {
                        if attempt > 0 {
                            info!(%session_id, attempt, "battle record finalized after retry");
                        }
                        return;
                    }
                    Err(err) if attempt >= retries => {
                        error!(
                            %session_id,
                            error = %err,
                            "giving up on battle record finalization; durable history lags the live outcome"
                        );
                        return;
                    }
                    Err(err) => {
                        warn!(%session_id, error = %err, attempt, "battle record finalization failed");
                        tokio::time::sleep(jittered(backoff)).await;
                        backoff = backoff.saturating_mul(2);
                        attempt += 1;
                    }
                }
            }
        });
    }
}

/// Equal jitter: the delay lands in `[backoff/2, backoff]`.
fn jittered(backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }
    let half_ms = backoff_ms / 2;
    let jitter_ms = rand::thread_rng().gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}
