use std::collections::BTreeMap;

use crate::models::*;

/// In-memory record of every label known to this peer.
///
/// The store is owned by the [`LabelEngine`](crate::engine::LabelEngine) and lent
/// to the persistence and sync managers for reading. Mutation goes through the
/// engine so origin tagging and network notification stay consistent.
///
/// Records are kept sorted by identifier, which keeps files and broadcasts
/// stable from one write to the next.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: BTreeMap<String, LabelRecord>,
    focused: Option<String>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // Mutation
    // ============================================================

    /// Start tracking a record. Returns `false` if the id is empty or taken.
    pub fn track(&mut self, record: LabelRecord) -> bool {
        if record.id.is_empty() {
            tracing::warn!("Refusing to track a label with an empty identifier");
            return false;
        }
        if self.records.contains_key(&record.id) {
            tracing::warn!("Label {} is already tracked, ignoring create", record.id);
            return false;
        }
        if uuid::Uuid::parse_str(&record.id).is_err() {
            tracing::debug!("Tracking label with non-GUID identifier {:?}", record.id);
        }

        self.records.insert(record.id.clone(), record);
        true
    }

    /// Apply the supplied fields of `input`. Returns `false` if the id is unknown.
    pub fn update(&mut self, id: &str, input: &UpdateLabelInput) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            tracing::warn!("Cannot update untracked label {}", id);
            return false;
        };

        if let Some(text) = &input.text {
            record.text = text.clone();
        }
        if let Some(color) = &input.label_color {
            match normalize_color(color) {
                Some(color) => record.label_color = color,
                None => tracing::warn!("Ignoring invalid label color {:?} for {}", color, id),
            }
        }
        if let Some(size) = input.label_size {
            record.label_size = clamp_label_size(size);
        }
        if let Some(size) = input.font_size {
            record.font_size = size;
        }
        if let Some(color) = &input.font_color {
            match normalize_color(color) {
                Some(color) => record.font_color = color,
                None => tracing::warn!("Ignoring invalid font color {:?} for {}", color, id),
            }
        }

        true
    }

    /// Replace only the binding. Returns `false` if the id is unknown.
    pub fn bind_object(&mut self, id: &str, binding: Option<ObjectHandle>) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            tracing::warn!("Cannot bind untracked label {}", id);
            return false;
        };
        record.binding = binding;
        true
    }

    /// Drop every record and the focused slot.
    pub fn clear(&mut self) {
        self.records.clear();
        self.focused = None;
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn get(&self, id: &str) -> Option<&LabelRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Owned copy of every record.
    pub fn get_all(&self) -> BTreeMap<String, LabelRecord> {
        self.records.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Payloads of the records that are bound and visible.
    pub fn applied(&self) -> LabelMap {
        self.records
            .values()
            .filter(|r| r.is_applied())
            .map(|r| (r.id.clone(), r.to_payload()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ============================================================
    // Focus
    // ============================================================

    /// Record which label the editing surface is showing. Advisory only.
    pub fn set_focused(&mut self, id: impl Into<String>) {
        self.focused = Some(id.into());
    }

    pub fn clear_focused(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }
}
