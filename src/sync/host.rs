use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use super::{publish_full_state, SyncEvent, SyncSettings};
use crate::models::LabelPayload;
use crate::net::{PeerId, ReplicationBridge, LAST_LABEL_CHANGE, REQUEST_LABEL_SYNC};
use crate::schedule::Timer;
use crate::store::RecordStore;

/// Host side of the protocol.
///
/// The host never receives pushes. It polls each member's slots once per tick
/// and remembers the last value it saw per member, so a slot is acted on once
/// per distinct value.
#[derive(Debug)]
pub(crate) struct HostState {
    known: BTreeSet<PeerId>,
    seen_changes: BTreeMap<PeerId, String>,
    seen_requests: BTreeMap<PeerId, String>,
    last_request_response: Option<Instant>,
    dirty: bool,
    next_full_sync: Timer,
}

impl HostState {
    /// Take over as host.
    ///
    /// Slot values already present were written for the previous host, so they
    /// are marked seen. Members are still treated as new so each gets a full
    /// broadcast on the first tick.
    pub(crate) fn new(bridge: &dyn ReplicationBridge, now: Instant, settings: &SyncSettings) -> Self {
        let me = bridge.local_peer();
        let mut seen_changes = BTreeMap::new();
        let mut seen_requests = BTreeMap::new();

        for peer in bridge.peers().into_iter().filter(|p| Some(*p) != me) {
            if let Some(value) = bridge.peer_value(peer, LAST_LABEL_CHANGE) {
                seen_changes.insert(peer, value);
            }
            if let Some(value) = bridge.peer_value(peer, REQUEST_LABEL_SYNC) {
                seen_requests.insert(peer, value);
            }
        }

        Self {
            known: BTreeSet::new(),
            seen_changes,
            seen_requests,
            last_request_response: None,
            dirty: false,
            next_full_sync: Timer::after(now, settings.full_sync_interval),
        }
    }

    pub(crate) fn known_peers(&self) -> usize {
        self.known.len()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn tick(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        store: &RecordStore,
        settings: &SyncSettings,
    ) -> Vec<SyncEvent> {
        let me = bridge.local_peer();
        let others: Vec<PeerId> = bridge
            .peers()
            .into_iter()
            .filter(|p| Some(*p) != me)
            .collect();

        self.diff_membership(bridge, store, &others);
        let events = self.poll_changes(bridge, &others);
        self.poll_sync_requests(bridge, now, store, settings, &others);

        if self.next_full_sync.is_due(now) {
            self.dirty = true;
            self.next_full_sync = Timer::after(now, settings.full_sync_interval);
        }

        events
    }

    /// Publish the full state if anything changed since the last publish.
    pub(crate) fn flush(&mut self, bridge: &mut dyn ReplicationBridge, store: &RecordStore) {
        if self.dirty && publish_full_state(bridge, store) {
            self.dirty = false;
        }
    }

    fn diff_membership(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        store: &RecordStore,
        others: &[PeerId],
    ) {
        let mut joined = false;
        for peer in others {
            if self.known.insert(*peer) {
                tracing::info!("{} joined, sending label state", peer);
                joined = true;
            }
        }

        let current: BTreeSet<PeerId> = others.iter().copied().collect();
        let departed: Vec<PeerId> = self.known.difference(&current).copied().collect();
        for peer in departed {
            tracing::info!("{} left", peer);
            self.known.remove(&peer);
            self.seen_changes.remove(&peer);
            self.seen_requests.remove(&peer);
        }

        if joined && publish_full_state(bridge, store) {
            self.dirty = false;
        }
    }

    fn poll_changes(&mut self, bridge: &dyn ReplicationBridge, others: &[PeerId]) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        for peer in others {
            let Some(value) = bridge.peer_value(*peer, LAST_LABEL_CHANGE) else {
                continue;
            };
            if self.seen_changes.get(peer) == Some(&value) {
                continue;
            }

            match LabelPayload::decode(&value) {
                Ok(payload) => {
                    tracing::debug!("Label change {} from {}", payload.guid, peer);
                    events.push(SyncEvent::PeerChange {
                        peer: *peer,
                        payload,
                    });
                }
                Err(e) => tracing::warn!("Dropping label change from {}: {}", peer, e),
            }
            self.seen_changes.insert(*peer, value);
        }

        events
    }

    fn poll_sync_requests(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        store: &RecordStore,
        settings: &SyncSettings,
        others: &[PeerId],
    ) {
        for peer in others {
            let Some(token) = bridge.peer_value(*peer, REQUEST_LABEL_SYNC) else {
                continue;
            };
            if self.seen_requests.get(peer) == Some(&token) {
                continue;
            }

            let rate_limited = self
                .last_request_response
                .is_some_and(|at| now.duration_since(at) < settings.sync_request_min_interval);
            if rate_limited {
                // Left unseen so it is answered once the interval passes.
                tracing::debug!("Deferring label sync request from {}", peer);
                return;
            }

            tracing::info!("{} requested label sync", peer);
            if publish_full_state(bridge, store) {
                self.dirty = false;
            }
            self.seen_requests.insert(*peer, token);
            self.last_request_response = Some(now);
            return;
        }
    }
}
