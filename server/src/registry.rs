//! Registry of live battle sessions.
//!
//! The single source of truth for which matches are live. Each session is
//! guarded by its own lock so distinct battles proceed independently; the
//! registry's own lock is only held for lookup and insertion, never while a
//! session is being mutated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use laneclash_engine::BattleState;
use laneclash_types::{PlayerId, SessionId};

/// A live session plus the bookkeeping the reaper needs.
#[derive(Debug)]
pub struct LiveSession {
    pub battle: BattleState,
    pub created_at: Instant,
    /// Updated on every accepted action; the idle sweep compares against it.
    pub last_action: Instant,
}

impl LiveSession {
    fn new(battle: BattleState) -> Self {
        let now = Instant::now();
        Self {
            battle,
            created_at: now,
            last_action: now,
        }
    }
}

pub type SessionHandle = Arc<Mutex<LiveSession>>;

struct SessionEntry {
    players: [PlayerId; 2],
    cell: SessionHandle,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created session and return its handle.
    pub fn insert(&self, battle: BattleState) -> SessionHandle {
        let id = battle.session_id();
        let players = battle.players().clone();
        let cell = Arc::new(Mutex::new(LiveSession::new(battle)));
        self.sessions.lock().unwrap().insert(
            id,
            SessionEntry {
                players,
                cell: cell.clone(),
            },
        );
        cell
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .map(|entry| entry.cell.clone())
    }

    /// Delete a session. Called exactly once per session, by the coordinator
    /// at completion or by the reaper.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.lock().unwrap().remove(id).is_some()
    }

    /// Whether the player participates in any live session.
    pub fn contains_player(&self, player: &PlayerId) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .any(|entry| entry.players.contains(player))
    }

    /// Snapshot of all live sessions, for the idle sweep.
    pub fn entries(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(id, entry)| (*id, entry.cell.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneclash_types::SessionId;

    fn battle() -> BattleState {
        BattleState::new(
            SessionId::generate(),
            [PlayerId::from("0xalice"), PlayerId::from("0xbob")],
            [vec![], vec![]],
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = SessionRegistry::new();
        let battle = battle();
        let id = battle.session_id();

        registry.insert(battle);
        assert!(registry.get(&id).is_some());
        assert!(registry.contains_player(&PlayerId::from("0xalice")));
        assert!(!registry.contains_player(&PlayerId::from("0xmallory")));

        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }
}
