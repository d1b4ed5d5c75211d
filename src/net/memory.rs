//! In-process lobby.
//!
//! Every [`MemoryPeer`] joined to the same [`MemoryLobby`] sees the same host
//! values and peer slots, the way members of a real lobby see replicated
//! lobby data. Values are visible immediately; there is no message loss.
//!
//! The lobby keeps the most recent writes for inspection, up to
//! [`DEFAULT_WRITE_LOG_CAPACITY`] unless built with
//! [`MemoryLobby::with_write_log_capacity`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{PeerId, ReplicationBridge};
use crate::error::TransportError;

/// Writes retained by [`MemoryLobby::new`].
pub const DEFAULT_WRITE_LOG_CAPACITY: usize = 1024;

/// Which kind of value a write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    Host,
    Peer,
}

/// One successful write, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyWrite {
    pub peer: PeerId,
    pub scope: WriteScope,
    pub key: String,
    pub value: String,
}

#[derive(Debug)]
struct LobbyState {
    open: bool,
    host: Option<PeerId>,
    members: Vec<PeerId>,
    next_peer: u64,
    host_values: BTreeMap<String, String>,
    peer_values: BTreeMap<PeerId, BTreeMap<String, String>>,
    writes: VecDeque<LobbyWrite>,
    write_log_capacity: usize,
}

impl LobbyState {
    fn record(&mut self, write: LobbyWrite) {
        if self.write_log_capacity == 0 {
            return;
        }
        while self.writes.len() >= self.write_log_capacity {
            self.writes.pop_front();
        }
        self.writes.push_back(write);
    }
}

/// Shared lobby state. Clones refer to the same lobby.
#[derive(Debug, Clone)]
pub struct MemoryLobby {
    state: Arc<Mutex<LobbyState>>,
}

impl Default for MemoryLobby {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLobby {
    pub fn new() -> Self {
        Self::with_write_log_capacity(DEFAULT_WRITE_LOG_CAPACITY)
    }

    /// Lobby that keeps at most `capacity` writes. Zero disables the log.
    pub fn with_write_log_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LobbyState {
                open: true,
                host: None,
                members: Vec::new(),
                next_peer: 1,
                host_values: BTreeMap::new(),
                peer_values: BTreeMap::new(),
                writes: VecDeque::new(),
                write_log_capacity: capacity,
            })),
        }
    }

    /// Add a member. The first member to join becomes host.
    pub fn join(&self) -> MemoryPeer {
        let mut state = self.state.lock().expect("lobby lock poisoned");
        let id = PeerId(state.next_peer);
        state.next_peer += 1;
        state.members.push(id);
        if state.host.is_none() {
            state.host = Some(id);
        }

        MemoryPeer {
            lobby: self.clone(),
            id,
        }
    }

    /// Hand host role to `peer`.
    pub fn set_host(&self, peer: PeerId) {
        let mut state = self.state.lock().expect("lobby lock poisoned");
        state.host = Some(peer);
    }

    /// Remove a member and its slots. If it was host, the next member takes over.
    pub fn leave(&self, peer: PeerId) {
        let mut state = self.state.lock().expect("lobby lock poisoned");
        state.members.retain(|p| *p != peer);
        state.peer_values.remove(&peer);
        if state.host == Some(peer) {
            state.host = state.members.first().copied();
        }
    }

    /// End the session for everyone.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("lobby lock poisoned");
        state.open = false;
    }

    pub fn host(&self) -> Option<PeerId> {
        self.state.lock().expect("lobby lock poisoned").host
    }

    pub fn host_value(&self, key: &str) -> Option<String> {
        let state = self.state.lock().expect("lobby lock poisoned");
        state.host_values.get(key).cloned()
    }

    pub fn peer_value(&self, peer: PeerId, key: &str) -> Option<String> {
        let state = self.state.lock().expect("lobby lock poisoned");
        state.peer_values.get(&peer)?.get(key).cloned()
    }

    /// Retained successful writes, oldest first.
    pub fn writes(&self) -> Vec<LobbyWrite> {
        let state = self.state.lock().expect("lobby lock poisoned");
        state.writes.iter().cloned().collect()
    }

    /// Number of retained successful writes by `peer` to `key`.
    pub fn write_count(&self, peer: PeerId, key: &str) -> usize {
        let state = self.state.lock().expect("lobby lock poisoned");
        state
            .writes
            .iter()
            .filter(|w| w.peer == peer && w.key == key)
            .count()
    }
}

/// One member's view of a [`MemoryLobby`].
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    lobby: MemoryLobby,
    id: PeerId,
}

impl MemoryPeer {
    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn lobby(&self) -> &MemoryLobby {
        &self.lobby
    }
}

impl ReplicationBridge for MemoryPeer {
    fn pump(&mut self) {}

    fn is_host(&self) -> bool {
        let state = self.lobby.state.lock().expect("lobby lock poisoned");
        state.open && state.host == Some(self.id) && state.members.contains(&self.id)
    }

    fn session_active(&self) -> bool {
        let state = self.lobby.state.lock().expect("lobby lock poisoned");
        state.open && state.members.contains(&self.id)
    }

    fn local_peer(&self) -> Option<PeerId> {
        self.session_active().then_some(self.id)
    }

    fn peers(&self) -> Vec<PeerId> {
        let state = self.lobby.state.lock().expect("lobby lock poisoned");
        if state.open {
            state.members.clone()
        } else {
            Vec::new()
        }
    }

    fn host_value(&self, key: &str) -> Option<String> {
        self.lobby.host_value(key)
    }

    fn set_host_value(&mut self, key: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.lobby.state.lock().expect("lobby lock poisoned");
        if !state.open || !state.members.contains(&self.id) {
            return Err(TransportError::NoSession);
        }
        if state.host != Some(self.id) {
            return Err(TransportError::NotHost);
        }

        state.host_values.insert(key.to_string(), value.to_string());
        let write = LobbyWrite {
            peer: self.id,
            scope: WriteScope::Host,
            key: key.to_string(),
            value: value.to_string(),
        };
        state.record(write);
        Ok(())
    }

    fn peer_value(&self, peer: PeerId, key: &str) -> Option<String> {
        self.lobby.peer_value(peer, key)
    }

    fn set_local_value(&mut self, key: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.lobby.state.lock().expect("lobby lock poisoned");
        if !state.open || !state.members.contains(&self.id) {
            return Err(TransportError::NoSession);
        }

        state
            .peer_values
            .entry(self.id)
            .or_default()
            .insert(key.to_string(), value.to_string());
        let write = LobbyWrite {
            peer: self.id,
            scope: WriteScope::Peer,
            key: key.to_string(),
            value: value.to_string(),
        };
        state.record(write);
        Ok(())
    }
}
