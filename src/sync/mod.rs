//! Host-authoritative label replication.
//!
//! The sync manager is a small state machine. Each tick it asks the bridge
//! whether a session is active and who hosts it, and switches between
//! [`RoleKind::Offline`], [`RoleKind::Host`] and [`RoleKind::Client`]. Leaving a
//! role drops its state, which cancels any catch-up still in flight.
//!
//! The manager never mutates the record store. Inbound changes are returned
//! as [`SyncEvent`]s and the engine applies them with network origin, which is
//! what keeps them from being echoed back out.

mod client;
mod host;

use std::time::{Duration, Instant};

use client::ClientState;
use host::HostState;

use crate::config::EngineConfig;
use crate::models::{encode_label_map, LabelMap, LabelPayload};
use crate::net::{PeerId, Replication, ReplicationBridge, LAST_LABEL_CHANGE, SYNCED_LABELS};
use crate::store::RecordStore;

/// Protocol timing and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub sync_request_min_interval: Duration,
    pub retry_attempts: u32,
    pub retry_interval: Duration,
    pub full_sync_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SyncSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            sync_request_min_interval: config.sync_request_min_interval(),
            retry_attempts: config.retry_attempts,
            retry_interval: config.retry_interval(),
            full_sync_interval: config.full_sync_interval(),
        }
    }
}

/// A remote change for the engine to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Host only: a member pushed a change through its slot.
    PeerChange { peer: PeerId, payload: LabelPayload },
    /// Client only: the host's last-change value moved.
    HostChange(LabelPayload),
    /// Client only: the host's full state, on join or when republished.
    FullState(LabelMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Offline,
    Host,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub available: bool,
    pub role: RoleKind,
    pub known_peers: usize,
    /// Catch-up attempts made so far, while a catch-up is running.
    pub retry_attempt: Option<u32>,
}

#[derive(Debug)]
enum Role {
    Offline,
    Host(HostState),
    Client(ClientState),
}

impl Role {
    fn kind(&self) -> RoleKind {
        match self {
            Self::Offline => RoleKind::Offline,
            Self::Host(_) => RoleKind::Host,
            Self::Client(_) => RoleKind::Client,
        }
    }
}

#[derive(Debug)]
pub struct SyncManager {
    replication: Replication,
    settings: SyncSettings,
    role: Role,
}

impl SyncManager {
    pub fn new(replication: Replication, settings: SyncSettings) -> Self {
        Self {
            replication,
            settings,
            role: Role::Offline,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Replication::disabled(), SyncSettings::default())
    }

    pub fn is_available(&self) -> bool {
        self.replication.is_available()
    }

    pub fn role(&self) -> RoleKind {
        self.role.kind()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            available: self.is_available(),
            role: self.role.kind(),
            known_peers: match &self.role {
                Role::Host(host) => host.known_peers(),
                _ => 0,
            },
            retry_attempt: match &self.role {
                Role::Client(client) => client.retry_attempt(),
                _ => None,
            },
        }
    }

    /// Advance the protocol by one tick. No-op without replication.
    pub fn tick(&mut self, now: Instant, store: &RecordStore) -> Vec<SyncEvent> {
        let settings = &self.settings;
        let Some(bridge) = self.replication.bridge_mut() else {
            return Vec::new();
        };
        bridge.pump();

        let wanted = if !bridge.session_active() {
            RoleKind::Offline
        } else if bridge.is_host() {
            RoleKind::Host
        } else {
            RoleKind::Client
        };

        if wanted != self.role.kind() {
            tracing::info!("Label sync role {:?} -> {:?}", self.role.kind(), wanted);
            if let Role::Client(client) = &mut self.role {
                client.abandon();
            }

            match wanted {
                RoleKind::Offline => {
                    self.role = Role::Offline;
                    return Vec::new();
                }
                RoleKind::Host => {
                    self.role = Role::Host(HostState::new(&*bridge, now, settings));
                }
                RoleKind::Client => {
                    let (client, event) = ClientState::join(&*bridge, now, store, settings);
                    self.role = Role::Client(client);
                    return vec![event];
                }
            }
        }

        match &mut self.role {
            Role::Offline => Vec::new(),
            Role::Host(host) => host.tick(bridge, now, store, settings),
            Role::Client(client) => client.tick(bridge, now, store, settings),
        }
    }

    /// Host: publish the full state if it changed during this tick.
    pub fn flush(&mut self, store: &RecordStore) {
        let Some(bridge) = self.replication.bridge_mut() else {
            return;
        };
        if let Role::Host(host) = &mut self.role {
            host.flush(bridge, store);
        }
    }

    /// Push a locally originated change for `id`.
    ///
    /// The host publishes it as its last-change value; a client in a session
    /// writes it to its own slot for the host to pick up.
    pub fn notify_local_change(&mut self, store: &RecordStore, id: &str) {
        let Some(bridge) = self.replication.bridge_mut() else {
            return;
        };
        let Some(record) = store.get(id) else {
            tracing::debug!("Not sending change for untracked label {}", id);
            return;
        };
        let payload = match record.to_payload().encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Could not encode label {}: {}", id, e);
                return;
            }
        };

        if bridge.is_host() {
            if let Err(e) = bridge.set_host_value(LAST_LABEL_CHANGE, &payload) {
                tracing::warn!("Could not broadcast label change {}: {}", id, e);
                return;
            }
            if let Role::Host(host) = &mut self.role {
                host.mark_dirty();
            }
        } else if bridge.session_active() {
            if let Err(e) = bridge.set_local_value(LAST_LABEL_CHANGE, &payload) {
                tracing::warn!("Could not send label change {}: {}", id, e);
            }
        }
    }

    /// Host: rebroadcast a change received from a member, after it was applied.
    pub fn publish_host_change(&mut self, store: &RecordStore, id: &str) {
        let Some(bridge) = self.replication.bridge_mut() else {
            return;
        };
        let Role::Host(host) = &mut self.role else {
            return;
        };
        let Some(record) = store.get(id) else {
            return;
        };

        match record.to_payload().encode() {
            Ok(payload) => {
                if let Err(e) = bridge.set_host_value(LAST_LABEL_CHANGE, &payload) {
                    tracing::warn!("Could not rebroadcast label change {}: {}", id, e);
                }
            }
            Err(e) => tracing::error!("Could not encode label {}: {}", id, e),
        }
        host.mark_dirty();
    }

    /// Host: publish the full state now.
    pub fn broadcast_full_state(&mut self, store: &RecordStore) -> bool {
        let Some(bridge) = self.replication.bridge_mut() else {
            return false;
        };
        if !bridge.is_host() {
            return false;
        }
        publish_full_state(bridge, store)
    }

    /// Leave whatever role is active. The next tick re-selects it.
    pub fn terminate(&mut self) {
        if let Role::Client(client) = &mut self.role {
            client.abandon();
        }
        self.role = Role::Offline;
    }
}

/// Serialize the applied records and publish them as the host's full state.
pub(crate) fn publish_full_state(bridge: &mut dyn ReplicationBridge, store: &RecordStore) -> bool {
    let applied = store.applied();
    let json = match encode_label_map(&applied) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Could not encode label state: {}", e);
            return false;
        }
    };

    match bridge.set_host_value(SYNCED_LABELS, &json) {
        Ok(()) => {
            tracing::debug!("Broadcast {} labels", applied.len());
            true
        }
        Err(e) => {
            tracing::warn!("Could not broadcast label state: {}", e);
            false
        }
    }
}
