//! Persistence boundary for battle records and player lookups.
//!
//! The engine never talks to storage directly; everything durable goes
//! through [`BattleStore`]. The server creates a battle record before a live
//! session becomes visible and finalizes it after the terminal events have
//! been delivered, so a storage failure can abort a pairing but never roll
//! back live gameplay.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use laneclash_types::{BattleStatus, Board, Card, CardRarity, PlayerId, SessionId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),
    #[error("battle not found: {0}")]
    BattleNotFound(SessionId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A resolved player, keyed by wallet address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub username: String,
}

/// A durable battle record. Created `Pending` at pairing time; status,
/// winner, and the final lane snapshot are written at finalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleRecord {
    pub id: SessionId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub status: BattleStatus,
    pub winner: Option<PlayerId>,
    pub final_board: Option<Board>,
}

/// Trait for interacting with battle persistence.
pub trait BattleStore: Clone + Send + Sync + 'static {
    /// Resolve a wallet address to a player.
    fn resolve_player(
        &self,
        player: &PlayerId,
    ) -> impl Future<Output = Result<PlayerRecord, StoreError>> + Send;

    /// Deal a hand of owned cards for the player to battle with.
    fn deal_hand(
        &self,
        player: &PlayerId,
        size: usize,
    ) -> impl Future<Output = Result<Vec<Card>, StoreError>> + Send;

    /// Create a battle record for a freshly paired match. Returns the record
    /// id, which doubles as the live session id.
    fn create_battle(
        &self,
        player1: &PlayerId,
        player2: &PlayerId,
    ) -> impl Future<Output = Result<SessionId, StoreError>> + Send;

    /// Write the terminal result of a battle.
    fn finalize_battle(
        &self,
        session: SessionId,
        winner: Option<PlayerId>,
        final_board: Board,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory store for development and tests.
///
/// Registers unknown players on first resolution and deals hands with
/// rarity-weighted random powers, standing in for the account and collection
/// services.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

struct MemoryInner {
    players: HashMap<PlayerId, PlayerRecord>,
    battles: HashMap<SessionId, BattleRecord>,
    rng: StdRng,
}

impl MemoryStore {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                players: HashMap::new(),
                battles: HashMap::new(),
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    pub fn battle(&self, session: &SessionId) -> Option<BattleRecord> {
        self.inner.lock().unwrap().battles.get(session).cloned()
    }

    pub fn battle_count(&self) -> usize {
        self.inner.lock().unwrap().battles.len()
    }
}

impl BattleStore for MemoryStore {
    async fn resolve_player(&self, player: &PlayerId) -> Result<PlayerRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .players
            .entry(player.clone())
            .or_insert_with(|| PlayerRecord {
                player_id: player.clone(),
                username: player.to_string(),
            });
        Ok(record.clone())
    }

    async fn deal_hand(&self, _player: &PlayerId, size: usize) -> Result<Vec<Card>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut hand = Vec::with_capacity(size);
        for index in 0..size {
            let roll = inner.rng.gen_range(0..100u8);
            let rarity = CardRarity::from_roll(roll);
            let (min, max) = rarity.power_range();
            let power = inner.rng.gen_range(min..=max);
            hand.push(Card::new(
                format!("{}-{}", rarity.as_str().to_lowercase(), index + 1),
                power,
                rarity,
            ));
        }
        Ok(hand)
    }

    async fn create_battle(
        &self,
        player1: &PlayerId,
        player2: &PlayerId,
    ) -> Result<SessionId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = SessionId::generate();
        inner.battles.insert(
            id,
            BattleRecord {
                id,
                player1: player1.clone(),
                player2: player2.clone(),
                status: BattleStatus::Pending,
                winner: None,
                final_board: None,
            },
        );
        Ok(id)
    }

    async fn finalize_battle(
        &self,
        session: SessionId,
        winner: Option<PlayerId>,
        final_board: Board,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .battles
            .get_mut(&session)
            .ok_or(StoreError::BattleNotFound(session))?;
        record.status = BattleStatus::Completed;
        record.winner = winner;
        record.final_board = Some(final_board);
        Ok(())
    }
}
