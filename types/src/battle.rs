use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::{Card, CardId};

/// Player identifier: the wallet address the player authenticated with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(wallet: impl Into<String>) -> Self {
        Self(wallet.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Battle session identifier. Allocated by the persistence layer when the
/// battle record is created and used to address the live session thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One of the three battle lanes. Wire values are 1..=3.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    One = 1,
    Two = 2,
    Three = 3,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::One, Lane::Two, Lane::Three];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    fn index(&self) -> usize {
        (*self as u8 - 1) as usize
    }
}

impl TryFrom<u8> for Lane {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Lane::One),
            2 => Ok(Lane::Two),
            3 => Ok(Lane::Three),
            _ => Err(()),
        }
    }
}

/// Which of the two participants a lane sequence or placed card belongs to.
/// Sides are assigned by pairing order: the first-queued player is `One`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "player1")]
    One,
    #[serde(rename = "player2")]
    Two,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }
}

/// Battle lifecycle status.
///
/// `Pending` and `SetupPhase` belong to the persisted record's vocabulary:
/// a record is created `Pending` before any live session exists. The live
/// machine starts at `WaitingPlayers` and moves to `InProgress` once both
/// participants have joined. `Completed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleStatus {
    Pending,
    WaitingPlayers,
    SetupPhase,
    InProgress,
    Completed,
}

/// A card placed into a lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCard {
    pub card_id: CardId,
    pub initial_power: u16,
    pub current_power: u16,
}

impl PlacedCard {
    pub fn from_card(card: &Card) -> Self {
        Self {
            card_id: card.id,
            initial_power: card.power,
            current_power: card.power,
        }
    }

    /// Apply damage, flooring `current_power` at zero. Returns true when the
    /// card is defeated.
    pub fn apply_damage(&mut self, damage: u16) -> bool {
        self.current_power = self.current_power.saturating_sub(damage);
        self.current_power == 0
    }
}

/// Both sides' card sequences for a single lane.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneCards {
    #[serde(rename = "player1")]
    pub player_one: Vec<PlacedCard>,
    #[serde(rename = "player2")]
    pub player_two: Vec<PlacedCard>,
}

impl LaneCards {
    fn side(&self, side: Side) -> &Vec<PlacedCard> {
        match side {
            Side::One => &self.player_one,
            Side::Two => &self.player_two,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<PlacedCard> {
        match side {
            Side::One => &mut self.player_one,
            Side::Two => &mut self.player_two,
        }
    }
}

/// The full lane state of a battle: three lanes, two ordered card sequences
/// per lane. Also serves as the final snapshot persisted and broadcast at
/// battle end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub lanes: [LaneCards; 3],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self, lane: Lane, side: Side) -> &[PlacedCard] {
        self.lanes[lane.index()].side(side)
    }

    pub fn push(&mut self, lane: Lane, side: Side, card: PlacedCard) {
        self.lanes[lane.index()].side_mut(side).push(card);
    }

    /// Locate a card within one lane on one side.
    pub fn find(&self, lane: Lane, side: Side, card_id: CardId) -> Option<usize> {
        self.lanes[lane.index()]
            .side(side)
            .iter()
            .position(|card| card.card_id == card_id)
    }

    pub fn card_mut(&mut self, lane: Lane, side: Side, index: usize) -> &mut PlacedCard {
        &mut self.lanes[lane.index()].side_mut(side)[index]
    }

    pub fn remove(&mut self, lane: Lane, side: Side, index: usize) -> PlacedCard {
        self.lanes[lane.index()].side_mut(side).remove(index)
    }

    /// Whether the side holds at least one placed card in any lane.
    pub fn side_has_cards(&self, side: Side) -> bool {
        Lane::ALL
            .iter()
            .any(|lane| !self.cards(*lane, side).is_empty())
    }
}

/// The terminal result of a battle. Produced exactly once, at the transition
/// into `Completed`, and handed to the persistence layer. `winner` is `None`
/// for a draw or a reaped session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchOutcome {
    pub session_id: SessionId,
    pub winner: Option<PlayerId>,
    pub final_board: Board,
}
