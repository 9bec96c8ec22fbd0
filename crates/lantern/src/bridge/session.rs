use std::collections::HashMap;

use crate::net::{IdentifierAddress, PeerAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStatus {
    /// The player finished the login handshake and is in the world.
    pub spawned: bool,
}

/// What the bridge needs from the protocol layer. The protocol layer owns
/// the player table; the bridge only asks.
pub trait SessionHost: Send + Sync {
    fn open_session(&self, identifier: &str);
    fn find_player(&self, address: &PeerAddress) -> Option<PlayerStatus>;
    fn close_player(&self, address: &PeerAddress, message: &str, reason: &str);
}

#[derive(Debug, Default)]
pub(crate) struct SessionTable {
    sessions: HashMap<IdentifierAddress, SessionState>,
}

impl SessionTable {
    pub(crate) fn state(&self, address: &IdentifierAddress) -> SessionState {
        self.sessions
            .get(address)
            .copied()
            .unwrap_or(SessionState::Unopened)
    }

    pub(crate) fn open(&mut self, address: IdentifierAddress) -> SessionState {
        self.sessions
            .insert(address, SessionState::Open)
            .unwrap_or(SessionState::Unopened)
    }

    /// Marks a known session closed and returns its previous state. Unknown
    /// identifiers leave no marker behind.
    pub(crate) fn close(&mut self, address: IdentifierAddress) -> SessionState {
        match self.sessions.get_mut(&address) {
            Some(state) => std::mem::replace(state, SessionState::Closed),
            None => SessionState::Unopened,
        }
    }

    /// Forgets closed markers. Returns how many were dropped.
    pub(crate) fn prune_closed(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, state| *state != SessionState::Closed);
        before - self.sessions.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| **s == SessionState::Open)
            .count()
    }
}
