//! Registry of live player connections.
//!
//! Maps a player id to the outbound channel of its WebSocket writer task.
//! Both the matchmaker and the battle coordinator push events through here;
//! a registration replaces any previous connection for the same player, so a
//! reconnect simply takes over event delivery.

use std::collections::HashMap;
use std::sync::Mutex;

use laneclash_types::protocol::ServerMessage;
use laneclash_types::PlayerId;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<PlayerId, mpsc::UnboundedSender<ServerMessage>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a player to a connection, replacing any previous binding.
    pub fn register(&self, player: &PlayerId, sender: mpsc::UnboundedSender<ServerMessage>) {
        self.inner.lock().unwrap().insert(player.clone(), sender);
    }

    /// Remove a player's binding, but only if it still points at the given
    /// connection: a reconnect must not be torn down by the old socket's
    /// cleanup. Returns whether the binding was removed.
    pub fn unregister(&self, player: &PlayerId, sender: &mpsc::UnboundedSender<ServerMessage>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .get(player)
            .is_some_and(|current| current.same_channel(sender))
        {
            inner.remove(player);
            return true;
        }
        false
    }

    /// Deliver an event to one player. Events for players without a live
    /// connection are dropped; the session state remains authoritative.
    pub fn send(&self, player: &PlayerId, message: ServerMessage) {
        let inner = self.inner.lock().unwrap();
        let Some(sender) = inner.get(player) else {
            debug!(%player, "dropping event for disconnected player");
            return;
        };
        if sender.send(message).is_err() {
            debug!(%player, "dropping event for closed connection");
        }
    }

    /// Deliver an event to each of the given players, in order.
    pub fn send_each(&self, players: &[PlayerId], message: &ServerMessage) {
        for player in players {
            self.send(player, message.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
