//! Matchmaking waiting list.
//!
//! A strict FIFO queue of players seeking a match. Admission order is
//! recorded as a monotonically increasing ticket; pairing always removes the
//! two oldest entries. The queue itself is pure state; the periodic pairing
//! pass and the already-in-battle check live in the server, which serializes
//! all access behind one lock.

use std::collections::VecDeque;

use laneclash_types::PlayerId;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("already in queue")]
    AlreadyQueued,
    #[error("already in battle")]
    AlreadyInBattle,
}

/// A waiting player. The live connection handle is held by the connection
/// registry, not the queue entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedPlayer {
    pub player_id: PlayerId,
    /// Admission order; strictly increasing across the queue's lifetime.
    pub ticket: u64,
    /// Recorded for rating-aware pairing later; FIFO pairing ignores it.
    pub rating: Option<u32>,
}

#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueuedPlayer>,
    next_ticket: u64,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.entries.iter().any(|entry| &entry.player_id == player)
    }

    /// Append a player. Returns the 1-based queue position.
    pub fn join(&mut self, player_id: PlayerId) -> Result<usize, QueueError> {
        if self.contains(&player_id) {
            return Err(QueueError::AlreadyQueued);
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.entries.push_back(QueuedPlayer {
            player_id,
            ticket,
            rating: None,
        });
        Ok(self.entries.len())
    }

    /// Remove a player's entry. Returns whether an entry was removed; absent
    /// players are a no-op, not an error.
    pub fn leave(&mut self, player: &PlayerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.player_id != player);
        self.entries.len() != before
    }

    /// Dequeue the two oldest entries, or `None` if fewer than two wait.
    pub fn pop_pair(&mut self) -> Option<(QueuedPlayer, QueuedPlayer)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        Some((first, second))
    }

    /// Reinsert a failed pair at the front, preserving their relative order,
    /// so players closest to being matched are not starved.
    pub fn requeue_front(&mut self, first: QueuedPlayer, second: QueuedPlayer) {
        self.entries.push_front(second);
        self.entries.push_front(first);
    }
}
