use std::time::Instant;

use chrono::{SecondsFormat, Utc};

use super::{SyncEvent, SyncSettings};
use crate::models::{decode_label_map, LabelMap, LabelPayload};
use crate::net::{ReplicationBridge, LAST_LABEL_CHANGE, REQUEST_LABEL_SYNC, SYNCED_LABELS};
use crate::schedule::Timer;
use crate::store::RecordStore;

#[derive(Debug)]
struct RetryLoop {
    attempt: u32,
    timer: Timer,
}

/// Client side of the protocol.
///
/// A client never writes host values. It reads the host's full state on join,
/// then follows the host's last-change and full-state values as they change.
#[derive(Debug)]
pub(crate) struct ClientState {
    last_full_state: Option<String>,
    last_host_change: Option<String>,
    retry: Option<RetryLoop>,
    request_seq: u64,
}

impl ClientState {
    /// Enter the client role and read whatever the host has published.
    ///
    /// The host's current last-change value is already covered by the full
    /// state, so it is marked seen. If the host state is empty and nothing is
    /// tracked locally, the host may not have published yet, so a bounded
    /// retry loop is started.
    pub(crate) fn join(
        bridge: &dyn ReplicationBridge,
        now: Instant,
        store: &RecordStore,
        settings: &SyncSettings,
    ) -> (Self, SyncEvent) {
        let raw = bridge.host_value(SYNCED_LABELS);
        let labels = decode_full_state(raw.as_deref());
        tracing::info!("Joined as client, {} labels from host", labels.len());

        let mut state = Self {
            last_full_state: raw,
            last_host_change: bridge.host_value(LAST_LABEL_CHANGE),
            retry: None,
            request_seq: 0,
        };

        if labels.is_empty() && store.is_empty() && settings.retry_attempts > 0 {
            tracing::info!(
                "Host label state is empty, retrying up to {} times",
                settings.retry_attempts
            );
            state.retry = Some(RetryLoop {
                attempt: 0,
                timer: Timer::after(now, settings.retry_interval),
            });
        }

        (state, SyncEvent::FullState(labels))
    }

    pub(crate) fn retry_attempt(&self) -> Option<u32> {
        self.retry.as_ref().map(|r| r.attempt)
    }

    /// Stop any catch-up in progress. Called when the role changes.
    pub(crate) fn abandon(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.timer.cancel();
            tracing::info!(
                "Abandoning label catch-up after {} attempts, role changed",
                retry.attempt
            );
        }
    }

    pub(crate) fn tick(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        store: &RecordStore,
        settings: &SyncSettings,
    ) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        self.run_retry(bridge, now, store, settings, &mut events);
        self.poll_full_state(bridge, &mut events);
        self.poll_host_change(bridge, &mut events);

        events
    }

    fn run_retry(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        store: &RecordStore,
        settings: &SyncSettings,
        events: &mut Vec<SyncEvent>,
    ) {
        let Some(retry) = self.retry.as_mut() else {
            return;
        };
        if !retry.timer.is_due(now) {
            return;
        }
        if !store.is_empty() {
            tracing::info!("Labels arrived, catch-up complete");
            self.retry = None;
            return;
        }

        retry.attempt += 1;
        let attempt = retry.attempt;
        tracing::info!(
            "Requesting label sync, attempt {}/{}",
            attempt,
            settings.retry_attempts
        );

        self.request_seq += 1;
        let token = format!(
            "{}#{}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            self.request_seq
        );
        if let Err(e) = bridge.set_local_value(REQUEST_LABEL_SYNC, &token) {
            tracing::warn!("Could not request label sync: {}", e);
        }

        let raw = bridge.host_value(SYNCED_LABELS);
        let labels = decode_full_state(raw.as_deref());
        if !labels.is_empty() {
            tracing::info!("Caught up with {} labels after {} attempts", labels.len(), attempt);
            self.last_full_state = raw;
            self.retry = None;
            events.push(SyncEvent::FullState(labels));
            return;
        }

        if attempt >= settings.retry_attempts {
            tracing::error!(
                "Giving up on label catch-up after {} attempts, host state still empty",
                attempt
            );
            self.retry = None;
            return;
        }

        if let Some(retry) = self.retry.as_mut() {
            retry.timer = Timer::after(now, settings.retry_interval);
        }
    }

    fn poll_full_state(&mut self, bridge: &dyn ReplicationBridge, events: &mut Vec<SyncEvent>) {
        let raw = bridge.host_value(SYNCED_LABELS);
        if raw.is_none() || raw == self.last_full_state {
            return;
        }

        let labels = decode_full_state(raw.as_deref());
        self.last_full_state = raw;
        if labels.is_empty() {
            return;
        }

        tracing::debug!("Host republished {} labels", labels.len());
        if self.retry.take().is_some() {
            tracing::info!("Caught up with {} labels", labels.len());
        }
        events.push(SyncEvent::FullState(labels));
    }

    fn poll_host_change(&mut self, bridge: &dyn ReplicationBridge, events: &mut Vec<SyncEvent>) {
        let Some(value) = bridge.host_value(LAST_LABEL_CHANGE) else {
            return;
        };
        if self.last_host_change.as_ref() == Some(&value) {
            return;
        }

        match LabelPayload::decode(&value) {
            Ok(payload) => events.push(SyncEvent::HostChange(payload)),
            Err(e) => tracing::warn!("Dropping host label change: {}", e),
        }
        self.last_host_change = Some(value);
    }
}

fn decode_full_state(raw: Option<&str>) -> LabelMap {
    let Some(raw) = raw else {
        return LabelMap::new();
    };

    match decode_label_map(raw) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::warn!("Ignoring malformed host label state: {}", e);
            LabelMap::new()
        }
    }
}
