//! WebSocket endpoint.
//!
//! One socket per player. Outbound events flow through an unbounded channel
//! drained by a writer task; inbound frames are parsed into typed actions
//! and dispatched to the matchmaker or the battle coordinator. The first
//! action naming a player binds the connection for event delivery, and a
//! close drops the binding and any queue entry.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use laneclash_types::protocol::{ClientMessage, ServerMessage};
use laneclash_types::PlayerId;
use tokio::sync::mpsc;
use tracing::warn;

use crate::battles::BattleCoordinator;
use crate::connections::ConnectionRegistry;
use crate::matchmaker::Matchmaker;
use crate::store::BattleStore;

#[derive(Clone)]
pub struct AppState<S: BattleStore> {
    pub matchmaker: Arc<Matchmaker<S>>,
    pub coordinator: Arc<BattleCoordinator<S>>,
    pub connections: Arc<ConnectionRegistry>,
}

pub fn router<S: BattleStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<S>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn ws_handler<S: BattleStore>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn handle_socket<S: BattleStore>(socket: WebSocket, state: AppState<S>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(payload) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Players this socket delivers events for.
    let mut bound: HashSet<PlayerId> = HashSet::new();

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(inbound) => {
                    let player = inbound.player_id().clone();
                    if bound.insert(player.clone()) {
                        state.connections.register(&player, tx.clone());
                    }
                    dispatch(inbound, &state).await;
                }
                Err(err) => {
                    warn!(error = %err, "invalid inbound message");
                    let _ = tx.send(ServerMessage::Error {
                        message: "invalid message".to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // The socket is gone: drop the connection bindings (unless a reconnect
    // already replaced them) and any queue entries bound to it.
    for player in &bound {
        if state.connections.unregister(player, &tx) {
            state.matchmaker.disconnect(player).await;
        }
    }
    write_task.abort();
}

async fn dispatch<S: BattleStore>(message: ClientMessage, state: &AppState<S>) {
    match message {
        ClientMessage::JoinQueue { player_id } => state.matchmaker.join(player_id).await,
        ClientMessage::LeaveQueue { player_id } => state.matchmaker.leave(&player_id).await,
        ClientMessage::JoinBattle {
            session_id,
            player_id,
        } => state.coordinator.join_battle(session_id, &player_id).await,
        ClientMessage::PlaceCard {
            session_id,
            player_id,
            card_id,
            lane_index,
        } => {
            state
                .coordinator
                .place_card(session_id, &player_id, card_id, lane_index)
                .await
        }
        ClientMessage::AttackCard {
            session_id,
            player_id,
            attacking_card_id,
            target_card_id,
            from_lane,
            to_lane,
        } => {
            state
                .coordinator
                .attack_card(
                    session_id,
                    &player_id,
                    attacking_card_id,
                    target_card_id,
                    from_lane,
                    to_lane,
                )
                .await
        }
        // Relocation never resolves combat; the engage target is accepted on
        // the wire and the follow-up attack is its own action.
        ClientMessage::MoveCard {
            session_id,
            player_id,
            attacking_card_id,
            target_card_id: _,
            from_lane,
            to_lane,
        } => {
            state
                .coordinator
                .move_card(session_id, &player_id, attacking_card_id, from_lane, to_lane)
                .await
        }
        ClientMessage::EndTurn {
            session_id,
            player_id,
        } => state.coordinator.end_turn(session_id, &player_id).await,
    }
}
