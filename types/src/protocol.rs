//! WebSocket protocol messages.
//!
//! One JSON object per action or event, discriminated by a `type` field.
//! Field names are camelCase on the wire. Lane fields are raw `u8` values so
//! an out-of-range lane is rejected by the session as an invalid lane rather
//! than failing to parse.

use serde::{Deserialize, Serialize};

use crate::battle::{Board, PlacedCard, PlayerId, SessionId, Side};
use crate::card::CardId;

/// Actions a client can send over its connection.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "joinQueue")]
    JoinQueue {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    #[serde(rename = "leaveQueue")]
    LeaveQueue {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    #[serde(rename = "joinBattle")]
    JoinBattle {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    #[serde(rename = "placeCard")]
    PlaceCard {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "cardId")]
        card_id: CardId,
        #[serde(rename = "laneIndex")]
        lane_index: u8,
    },
    #[serde(rename = "attackCard")]
    AttackCard {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "attackingCardId")]
        attacking_card_id: CardId,
        #[serde(rename = "targetCardId")]
        target_card_id: CardId,
        #[serde(rename = "fromLane")]
        from_lane: u8,
        #[serde(rename = "toLane")]
        to_lane: u8,
    },
    /// Combined move-then-engage action. The engage target rides along on
    /// the wire; relocation itself never resolves combat.
    #[serde(rename = "moveCard")]
    MoveCard {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "attackingCardId")]
        attacking_card_id: CardId,
        #[serde(rename = "targetCardId")]
        target_card_id: Option<CardId>,
        #[serde(rename = "fromLane")]
        from_lane: u8,
        #[serde(rename = "toLane")]
        to_lane: u8,
    },
    #[serde(rename = "endTurn")]
    EndTurn {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

impl ClientMessage {
    /// The acting player; the server binds the connection to this id.
    pub fn player_id(&self) -> &PlayerId {
        match self {
            ClientMessage::JoinQueue { player_id }
            | ClientMessage::LeaveQueue { player_id }
            | ClientMessage::JoinBattle { player_id, .. }
            | ClientMessage::PlaceCard { player_id, .. }
            | ClientMessage::AttackCard { player_id, .. }
            | ClientMessage::MoveCard { player_id, .. }
            | ClientMessage::EndTurn { player_id, .. } => player_id,
        }
    }
}

/// Events delivered to one or both participants.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "queueJoined")]
    QueueJoined { position: usize },
    #[serde(rename = "queueLeft")]
    QueueLeft {},
    #[serde(rename = "battleFound")]
    BattleFound {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "opponentId")]
        opponent_id: PlayerId,
    },
    #[serde(rename = "battleStart")]
    BattleStart {
        #[serde(rename = "firstTurn")]
        first_turn: PlayerId,
    },
    #[serde(rename = "turnUpdate")]
    TurnUpdate {
        #[serde(rename = "currentTurn")]
        current_turn: PlayerId,
        #[serde(rename = "turnCount")]
        turn_count: u64,
    },
    #[serde(rename = "cardPlaced")]
    CardPlaced {
        #[serde(rename = "laneIndex")]
        lane_index: u8,
        side: Side,
        card: PlacedCard,
    },
    #[serde(rename = "cardMoved")]
    CardMoved {
        #[serde(rename = "fromLane")]
        from_lane: u8,
        #[serde(rename = "toLane")]
        to_lane: u8,
        side: Side,
        #[serde(rename = "cardId")]
        card_id: CardId,
    },
    #[serde(rename = "attackResult")]
    AttackResult {
        #[serde(rename = "fromLane")]
        from_lane: u8,
        #[serde(rename = "toLane")]
        to_lane: u8,
        #[serde(rename = "attackingCard")]
        attacking_card: PlacedCard,
        #[serde(rename = "targetCard")]
        target_card: PlacedCard,
        damage: u16,
    },
    #[serde(rename = "cardDefeated")]
    CardDefeated {
        #[serde(rename = "laneIndex")]
        lane_index: u8,
        #[serde(rename = "cardId")]
        card_id: CardId,
    },
    #[serde(rename = "battleEnd")]
    BattleEnd {
        #[serde(rename = "winnerId")]
        winner_id: Option<PlayerId>,
        #[serde(rename = "finalLaneSnapshot")]
        final_lane_snapshot: Board,
    },
    #[serde(rename = "error")]
    Error { message: String },
}
