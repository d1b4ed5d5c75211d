//! Replication transport abstraction.
//!
//! The engine talks to the lobby through four primitives:
//!
//! - a host-written, all-readable **full state** value ([`SYNCED_LABELS`]),
//! - a host-written, all-readable **last change** value ([`LAST_LABEL_CHANGE`]),
//! - **per-peer slots** written by their owner and read by the host
//!   ([`LAST_LABEL_CHANGE`], [`REQUEST_LABEL_SYNC`]),
//! - membership queries.
//!
//! [`Replication`] wraps an optional bridge so a missing or broken transport
//! degrades to single-peer operation instead of failing.

pub mod memory;

use std::fmt;

use crate::error::TransportError;

/// Host value holding the full identifier → payload map.
pub const SYNCED_LABELS: &str = "SyncedLabels";
/// Host value and per-peer slot holding one changed payload.
pub const LAST_LABEL_CHANGE: &str = "LastLabelChange";
/// Per-peer slot a client bumps to ask the host for a full broadcast.
pub const REQUEST_LABEL_SYNC: &str = "RequestLabelSync";

/// Identifier of a lobby member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Capabilities the sync manager needs from a lobby transport.
///
/// Reads are non-blocking polls of already-replicated values. Implementations
/// must reject host value writes from non-hosts with [`TransportError::NotHost`].
pub trait ReplicationBridge {
    /// Whether the transport is usable right now.
    fn is_available(&self) -> bool {
        true
    }

    /// Process pending transport messages.
    fn pump(&mut self);

    fn is_host(&self) -> bool;

    fn session_active(&self) -> bool;

    fn local_peer(&self) -> Option<PeerId>;

    /// Current members in a stable order.
    fn peers(&self) -> Vec<PeerId>;

    fn host_value(&self, key: &str) -> Option<String>;

    fn set_host_value(&mut self, key: &str, value: &str) -> Result<(), TransportError>;

    fn peer_value(&self, peer: PeerId, key: &str) -> Option<String>;

    /// Write a slot owned by the local peer.
    fn set_local_value(&mut self, key: &str, value: &str) -> Result<(), TransportError>;
}

/// Optional transport. Absent means single-peer mode.
#[derive(Default)]
pub struct Replication {
    bridge: Option<Box<dyn ReplicationBridge>>,
}

impl Replication {
    pub fn disabled() -> Self {
        Self { bridge: None }
    }

    /// Build a bridge, treating construction failure as "replication unavailable".
    pub fn connect<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn ReplicationBridge>, TransportError>,
    {
        match factory() {
            Ok(bridge) => {
                tracing::info!("Label replication enabled");
                Self {
                    bridge: Some(bridge),
                }
            }
            Err(e) => {
                tracing::warn!("Label replication disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn from_bridge(bridge: impl ReplicationBridge + 'static) -> Self {
        Self {
            bridge: Some(Box::new(bridge)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.bridge.as_ref().is_some_and(|b| b.is_available())
    }

    /// The bridge, if present and available.
    pub fn bridge(&self) -> Option<&dyn ReplicationBridge> {
        match &self.bridge {
            Some(bridge) if bridge.is_available() => {
                let bridge: &dyn ReplicationBridge = bridge.as_ref();
                Some(bridge)
            }
            _ => None,
        }
    }

    pub fn bridge_mut(&mut self) -> Option<&mut dyn ReplicationBridge> {
        match &mut self.bridge {
            Some(bridge) if bridge.is_available() => {
                let bridge: &mut dyn ReplicationBridge = bridge.as_mut();
                Some(bridge)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Replication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replication")
            .field("available", &self.is_available())
            .finish()
    }
}
