//! Battle session state machine.
//!
//! A battle is a turn-based fight between exactly two participants over
//! three lanes. Each participant holds a dealt hand; on their turn they may
//! place cards from hand into lanes, move placed cards between lanes, attack
//! opposing cards, and end the turn. A side with no placed cards left in any
//! lane (while the opponent still holds at least one) loses.
//!
//! Every mutating operation returns the ordered list of events to deliver to
//! both participants, or an error that leaves the state untouched and is
//! surfaced only to the acting connection.

use laneclash_types::protocol::ServerMessage;
use laneclash_types::{
    BattleStatus, Board, Card, CardId, Lane, MatchOutcome, PlacedCard, PlayerId, SessionId, Side,
};
use thiserror::Error;

/// Rejection reasons for battle actions. Each rejects a single action and
/// mutates nothing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BattleError {
    #[error("player is not part of this battle")]
    NotParticipant,
    #[error("battle has not started")]
    NotStarted,
    #[error("battle already completed")]
    Completed,
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid lane: {lane}")]
    InvalidLane { lane: u8 },
    #[error("card not found: {card_id}")]
    CardNotFound { card_id: CardId },
    #[error("card not in hand: {card_id}")]
    CardOwnership { card_id: CardId },
}

/// Live state of one battle session.
///
/// Owned by the session registry; all access is serialized by the caller.
#[derive(Clone, Debug)]
pub struct BattleState {
    session_id: SessionId,
    players: [PlayerId; 2],
    joined: [bool; 2],
    hands: [Vec<Card>; 2],
    status: BattleStatus,
    board: Board,
    current_turn: Side,
    turn_count: u64,
    outcome: Option<MatchOutcome>,
}

impl BattleState {
    /// Create a fresh session in `WaitingPlayers`. The first player in
    /// `players` is side one and takes the first turn.
    pub fn new(session_id: SessionId, players: [PlayerId; 2], hands: [Vec<Card>; 2]) -> Self {
        assert_ne!(players[0], players[1], "participants must be distinct");
        Self {
            session_id,
            players,
            joined: [false, false],
            hands,
            status: BattleStatus::WaitingPlayers,
            board: Board::new(),
            current_turn: Side::One,
            turn_count: 0,
            outcome: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn status(&self) -> BattleStatus {
        self.status
    }

    pub fn players(&self) -> &[PlayerId; 2] {
        &self.players
    }

    pub fn player_id(&self, side: Side) -> &PlayerId {
        &self.players[side.index()]
    }

    pub fn current_turn(&self) -> &PlayerId {
        self.player_id(self.current_turn)
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn hand(&self, side: Side) -> &[Card] {
        &self.hands[side.index()]
    }

    /// The terminal outcome, available once the battle is `Completed`.
    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn side_of(&self, player: &PlayerId) -> Option<Side> {
        if player == &self.players[0] {
            Some(Side::One)
        } else if player == &self.players[1] {
            Some(Side::Two)
        } else {
            None
        }
    }

    /// Bind a participant slot. Once both slots are bound the battle starts:
    /// status moves to `InProgress` and the start events are emitted. A
    /// rejoin of an already-bound slot is accepted and emits nothing.
    pub fn join(&mut self, player: &PlayerId) -> Result<Vec<ServerMessage>, BattleError> {
        if self.status == BattleStatus::Completed {
            return Err(BattleError::Completed);
        }
        let side = self.side_of(player).ok_or(BattleError::NotParticipant)?;
        self.joined[side.index()] = true;

        if self.status == BattleStatus::WaitingPlayers && self.joined == [true, true] {
            self.status = BattleStatus::InProgress;
            return Ok(vec![
                ServerMessage::BattleStart {
                    first_turn: self.current_turn().clone(),
                },
                ServerMessage::TurnUpdate {
                    current_turn: self.current_turn().clone(),
                    turn_count: self.turn_count,
                },
            ]);
        }
        Ok(Vec::new())
    }

    /// Place a card from the acting player's hand into a lane. Placement
    /// does not end the turn.
    pub fn place_card(
        &mut self,
        player: &PlayerId,
        card_id: CardId,
        lane_index: u8,
    ) -> Result<Vec<ServerMessage>, BattleError> {
        let side = self.require_turn(player)?;
        let lane = decode_lane(lane_index)?;
        let position = self.hands[side.index()]
            .iter()
            .position(|card| card.id == card_id)
            .ok_or(BattleError::CardOwnership { card_id })?;
        let card = self.hands[side.index()].remove(position);
        let placed = PlacedCard::from_card(&card);
        self.board.push(lane, side, placed.clone());
        Ok(vec![ServerMessage::CardPlaced {
            lane_index: lane.as_u8(),
            side,
            card: placed,
        }])
    }

    /// Attack an opposing card. Damage equals the attacker's current power,
    /// floored at zero on the target. A target reduced to zero is removed,
    /// after which the win condition is evaluated.
    pub fn attack_card(
        &mut self,
        player: &PlayerId,
        attacking_card_id: CardId,
        target_card_id: CardId,
        from_lane: u8,
        to_lane: u8,
    ) -> Result<Vec<ServerMessage>, BattleError> {
        let side = self.require_turn(player)?;
        let from = decode_lane(from_lane)?;
        let to = decode_lane(to_lane)?;

        let attacker_index = self
            .board
            .find(from, side, attacking_card_id)
            .ok_or(BattleError::CardNotFound {
                card_id: attacking_card_id,
            })?;
        let target_index = self
            .board
            .find(to, side.opponent(), target_card_id)
            .ok_or(BattleError::CardNotFound {
                card_id: target_card_id,
            })?;

        let damage = self.board.cards(from, side)[attacker_index].current_power;
        let target = self.board.card_mut(to, side.opponent(), target_index);
        let defeated = target.apply_damage(damage);
        let target_snapshot = target.clone();
        let attacker_snapshot = self.board.cards(from, side)[attacker_index].clone();

        let mut events = vec![ServerMessage::AttackResult {
            from_lane: from.as_u8(),
            to_lane: to.as_u8(),
            attacking_card: attacker_snapshot,
            target_card: target_snapshot,
            damage,
        }];

        if defeated {
            self.board.remove(to, side.opponent(), target_index);
            events.push(ServerMessage::CardDefeated {
                lane_index: to.as_u8(),
                card_id: target_card_id,
            });
            events.extend(self.evaluate_win());
        }
        Ok(events)
    }

    /// Relocate one of the acting side's cards between lanes. The card is
    /// neither duplicated nor destroyed and its power is untouched; any
    /// engagement with cards in the destination lane is a separate attack.
    pub fn move_card(
        &mut self,
        player: &PlayerId,
        card_id: CardId,
        from_lane: u8,
        to_lane: u8,
    ) -> Result<Vec<ServerMessage>, BattleError> {
        let side = self.require_turn(player)?;
        let from = decode_lane(from_lane)?;
        let to = decode_lane(to_lane)?;
        let index = self
            .board
            .find(from, side, card_id)
            .ok_or(BattleError::CardNotFound { card_id })?;
        let card = self.board.remove(from, side, index);
        self.board.push(to, side, card);
        Ok(vec![ServerMessage::CardMoved {
            from_lane: from.as_u8(),
            to_lane: to.as_u8(),
            side,
            card_id,
        }])
    }

    /// Pass control to the other participant.
    pub fn end_turn(&mut self, player: &PlayerId) -> Result<Vec<ServerMessage>, BattleError> {
        self.require_turn(player)?;
        self.current_turn = self.current_turn.opponent();
        self.turn_count += 1;
        Ok(vec![ServerMessage::TurnUpdate {
            current_turn: self.current_turn().clone(),
            turn_count: self.turn_count,
        }])
    }

    /// Force the battle into its terminal state, e.g. when an abandoned
    /// session is reaped. Emits nothing if the battle already completed.
    pub fn force_complete(&mut self, winner: Option<Side>) -> Vec<ServerMessage> {
        if self.status == BattleStatus::Completed {
            return Vec::new();
        }
        self.complete(winner)
    }

    fn require_turn(&self, player: &PlayerId) -> Result<Side, BattleError> {
        match self.status {
            BattleStatus::Completed => return Err(BattleError::Completed),
            BattleStatus::InProgress => {}
            _ => return Err(BattleError::NotStarted),
        }
        let side = self.side_of(player).ok_or(BattleError::NotParticipant)?;
        if side != self.current_turn {
            return Err(BattleError::NotYourTurn);
        }
        Ok(side)
    }

    /// Evaluate the win condition after a card removal. A side with all
    /// three lanes empty while the opponent holds at least one card loses;
    /// both sides empty is a draw.
    fn evaluate_win(&mut self) -> Vec<ServerMessage> {
        let one = self.board.side_has_cards(Side::One);
        let two = self.board.side_has_cards(Side::Two);
        if one && two {
            return Vec::new();
        }
        let winner = match (one, two) {
            (true, false) => Some(Side::One),
            (false, true) => Some(Side::Two),
            _ => None,
        };
        self.complete(winner)
    }

    fn complete(&mut self, winner: Option<Side>) -> Vec<ServerMessage> {
        self.status = BattleStatus::Completed;
        let winner_id = winner.map(|side| self.player_id(side).clone());
        self.outcome = Some(MatchOutcome {
            session_id: self.session_id,
            winner: winner_id.clone(),
            final_board: self.board.clone(),
        });
        vec![ServerMessage::BattleEnd {
            winner_id,
            final_lane_snapshot: self.board.clone(),
        }]
    }
}

fn decode_lane(lane: u8) -> Result<Lane, BattleError> {
    Lane::try_from(lane).map_err(|_| BattleError::InvalidLane { lane })
}
