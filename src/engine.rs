//! The label engine: the one place label records are created and changed.
//!
//! Every mutation carries a [`ChangeOrigin`]. Local edits are pushed to the
//! network; changes that arrived from the network or from disk are not, which
//! is what stops host and clients from echoing each other forever.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::models::*;
use crate::net::Replication;
use crate::persist::{LabelPaths, LoadSource, PersistenceManager};
use crate::scene::{LabelRenderer, SceneQuery, SessionPathResolver};
use crate::store::RecordStore;
use crate::sync::{SyncEvent, SyncManager, SyncSettings, SyncStatus};

pub struct LabelEngine {
    store: RecordStore,
    defaults: LabelDefaults,
    replication_enabled: bool,
    sync_settings: SyncSettings,
    scene: Box<dyn SceneQuery>,
    renderer: Box<dyn LabelRenderer>,
    sessions: Box<dyn SessionPathResolver>,
    persistence: PersistenceManager,
    sync: SyncManager,
}

impl LabelEngine {
    /// Build a single-peer engine. See [`LabelEngine::with_replication`].
    pub fn new(
        config: &EngineConfig,
        scene: impl SceneQuery + 'static,
        renderer: impl LabelRenderer + 'static,
        sessions: impl SessionPathResolver + 'static,
    ) -> Self {
        Self {
            store: RecordStore::new(),
            defaults: config.defaults.clone(),
            replication_enabled: config.replication_enabled,
            sync_settings: SyncSettings::from(config),
            scene: Box::new(scene),
            renderer: Box::new(renderer),
            sessions: Box::new(sessions),
            persistence: PersistenceManager::new(
                LabelPaths::new(config.mod_data_root()),
                config.migration_delay(),
            ),
            sync: SyncManager::new(Replication::disabled(), SyncSettings::from(config)),
        }
    }

    /// Attach a replication transport, unless the config turns replication off.
    pub fn with_replication(mut self, replication: Replication) -> Self {
        if !self.replication_enabled {
            tracing::info!("Label replication turned off in config");
            return self;
        }
        self.sync = SyncManager::new(replication, self.sync_settings.clone());
        self
    }

    // ============================================================
    // Lifecycle
    // ============================================================

    /// Reset for a new session: clear records and leave any sync role.
    pub fn initialize(&mut self) {
        self.sync.terminate();
        self.persistence.initialize(&mut self.store);
    }

    /// Load the current session's labels from disk, then bind them to the scene.
    ///
    /// Returns where the labels came from, or `None` when no session path is
    /// available. Network catch-up follows on the next tick.
    pub fn load_for_session(&mut self, now: Instant) -> Option<LoadSource> {
        self.initialize();

        let Some(session) = self.sessions.session_path() else {
            tracing::warn!("No session path, labels will not be loaded");
            return None;
        };

        let outcome = self.persistence.load(&session, now);
        for payload in outcome.labels {
            self.create_with_origin(payload.into(), ChangeOrigin::Storage);
        }
        self.resolve_all_bindings();

        Some(outcome.source)
    }

    /// Write applied labels to the current session's file.
    pub fn save_for_session(&self) -> bool {
        let Some(session) = self.sessions.session_path() else {
            tracing::warn!("No session path, labels not saved");
            return false;
        };
        self.persistence.save(&session, &self.store)
    }

    /// End the session: drop all records and sync state.
    pub fn terminate(&mut self) {
        self.sync.terminate();
        self.persistence.terminate();
        self.store.clear();
        tracing::info!("Label session ended");
    }

    /// Advance timers and the replication protocol.
    pub fn tick(&mut self, now: Instant) {
        if let Some(report) = self.persistence.poll(now, &self.store) {
            tracing::debug!("Label migration finished: {:?}", report);
        }

        for event in self.sync.tick(now, &self.store) {
            self.apply_sync_event(event);
        }
        self.sync.flush(&self.store);
    }

    // ============================================================
    // Mutation
    // ============================================================

    /// Create a label from a local edit. Duplicate ids are ignored.
    pub fn create_label(&mut self, input: CreateLabelInput) -> bool {
        self.create_with_origin(input, ChangeOrigin::Local)
    }

    /// Update the supplied fields of a tracked label.
    pub fn update_label(&mut self, id: &str, input: UpdateLabelInput, origin: ChangeOrigin) -> bool {
        if id.is_empty() {
            tracing::warn!("Cannot update a label with an empty identifier");
            return false;
        }
        if !self.store.contains(id) {
            tracing::warn!("Cannot update untracked label {}", id);
            return false;
        }

        self.store.update(id, &input);
        self.refresh_visual(id);

        if origin.propagates() {
            self.sync.notify_local_change(&self.store, id);
        }
        true
    }

    /// Hide a label. The record stays tracked with empty text.
    pub fn remove_label(&mut self, id: &str) -> bool {
        self.update_label(id, UpdateLabelInput::text(""), ChangeOrigin::Local)
    }

    /// Attach a tracked label to a live scene object. Local only, never sent.
    pub fn bind_scene_object(&mut self, id: &str, handle: ObjectHandle) -> bool {
        if id.is_empty() {
            tracing::warn!("Cannot bind a label with an empty identifier");
            return false;
        }
        if !self.store.bind_object(id, Some(handle)) {
            return false;
        }

        if let Some(record) = self.store.get(id) {
            if !record.text.is_empty() {
                self.renderer.apply(record);
            }
        }
        true
    }

    /// Apply a batch received from the network, then redraw every bound label.
    pub fn apply_network_batch(&mut self, labels: LabelMap) {
        let count = labels.len();
        for payload in labels.into_values() {
            self.apply_network_payload(payload);
        }

        for record in self.store.iter() {
            if record.binding.is_some() && !record.text.is_empty() {
                self.renderer.force_refresh(record);
            }
        }
        tracing::debug!("Applied {} labels from the network", count);
    }

    /// Match records against the live scene.
    ///
    /// Stale bindings are cleared, unbound records whose object is live get
    /// bound, and bound visible records are redrawn.
    pub fn resolve_all_bindings(&mut self) {
        let live: HashMap<String, ObjectHandle> = self.scene.live_objects().into_iter().collect();
        let mut bound = 0;

        for id in self.store.ids() {
            let Some(record) = self.store.get(&id) else {
                continue;
            };
            let current = record.binding;
            let visible = !record.text.is_empty();

            match (current, live.get(&id).copied()) {
                (Some(handle), Some(live_handle)) if handle == live_handle => {
                    if visible {
                        self.renderer.apply(record);
                    }
                }
                (Some(_), None) => {
                    tracing::debug!("Object for label {} is gone, clearing binding", id);
                    self.store.bind_object(&id, None);
                }
                (_, Some(live_handle)) => {
                    self.bind_scene_object(&id, live_handle);
                    bound += 1;
                }
                (None, None) => {}
            }
        }

        if bound > 0 {
            tracing::debug!("Bound {} labels to scene objects", bound);
        }
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn get(&self, id: &str) -> Option<&LabelRecord> {
        self.store.get(id)
    }

    pub fn get_all(&self) -> std::collections::BTreeMap<String, LabelRecord> {
        self.store.get_all()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Note which label the editing surface is showing.
    pub fn focus(&mut self, id: impl Into<String>) {
        self.store.set_focused(id);
    }

    pub fn focused(&self) -> Option<&str> {
        self.store.focused()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn paths(&self) -> &LabelPaths {
        self.persistence.paths()
    }

    pub fn migration_pending(&self) -> bool {
        self.persistence.migration_pending()
    }

    // ============================================================
    // Internals
    // ============================================================

    fn create_with_origin(&mut self, input: CreateLabelInput, origin: ChangeOrigin) -> bool {
        if input.id.is_empty() {
            tracing::warn!("Cannot create a label with an empty identifier");
            return false;
        }

        let record = self.build_record(input);
        let id = record.id.clone();
        if !self.store.track(record) {
            return false;
        }

        if let Some(record) = self.store.get(&id) {
            if record.is_applied() {
                self.renderer.apply(record);
            }
        }

        if origin.propagates() {
            self.sync.notify_local_change(&self.store, &id);
        }
        true
    }

    fn build_record(&self, input: CreateLabelInput) -> LabelRecord {
        let label_color = pick_color(input.label_color, &self.defaults.label_color, &input.id);
        let font_color = pick_color(input.font_color, &self.defaults.font_color, &input.id);

        LabelRecord {
            label_color,
            font_color,
            label_size: clamp_label_size(input.label_size.unwrap_or(self.defaults.label_size)),
            font_size: input.font_size.unwrap_or(self.defaults.font_size),
            text: input.text,
            binding: input.binding,
            id: input.id,
        }
    }

    /// Create or update from a remote payload. Returns true if it was created.
    fn apply_network_payload(&mut self, payload: LabelPayload) -> bool {
        if self.store.contains(&payload.guid) {
            let id = payload.guid.clone();
            self.update_label(&id, payload.into(), ChangeOrigin::Network);
            false
        } else {
            self.create_with_origin(payload.into(), ChangeOrigin::Network)
        }
    }

    fn apply_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::PeerChange { peer, payload } => {
                let id = payload.guid.clone();
                tracing::debug!("Applying label {} from {}", id, peer);
                if self.apply_network_payload(payload) {
                    self.resolve_binding(&id);
                }
                self.sync.publish_host_change(&self.store, &id);
            }
            SyncEvent::HostChange(payload) => {
                let id = payload.guid.clone();
                if self.apply_network_payload(payload) {
                    self.resolve_binding(&id);
                }
            }
            SyncEvent::FullState(labels) => {
                self.apply_network_batch(labels);
                self.resolve_all_bindings();
            }
        }
    }

    fn resolve_binding(&mut self, id: &str) {
        let handle = self
            .scene
            .live_objects()
            .into_iter()
            .find_map(|(object_id, handle)| (object_id == id).then_some(handle));

        if let Some(handle) = handle {
            self.bind_scene_object(id, handle);
        }
    }

    fn refresh_visual(&mut self, id: &str) {
        let Some(record) = self.store.get(id) else {
            return;
        };
        if record.binding.is_none() {
            return;
        }

        if record.text.is_empty() {
            self.renderer.remove(id);
        } else {
            self.renderer.apply(record);
        }
    }
}

fn pick_color(color: Option<String>, default: &str, id: &str) -> String {
    match color {
        Some(raw) => normalize_color(&raw).unwrap_or_else(|| {
            tracing::warn!("Invalid color {:?} for label {}, using default", raw, id);
            default.to_string()
        }),
        None => default.to_string(),
    }
}
