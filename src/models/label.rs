use serde::{Deserialize, Serialize};

use super::payload::LabelPayload;

/// Smallest label size a record may hold.
pub const MIN_LABEL_SIZE: i32 = 1;
/// Largest label size a record may hold.
pub const MAX_LABEL_SIZE: i32 = 30;

/// Opaque handle to a live object in the running scene.
///
/// Handles are issued by the scene collaborator and are only meaningful for the
/// current session. A handle can outlive its object, so the engine revalidates
/// it against the scene during binding resolution instead of trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Where a mutation originated.
///
/// - `Local`: An edit made on this peer. Propagates to the network.
/// - `Network`: Received from another peer. Never re-emitted.
/// - `Storage`: Read from disk during session load. Never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Network,
    Storage,
}

impl ChangeOrigin {
    pub fn propagates(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// The label attached to a single entity.
///
/// Records are never deleted while a session is loaded. Clearing `text` is how a
/// label is "removed"; the record stays tracked so a later edit can restore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub id: String,
    /// Label text. Empty means no visible label.
    pub text: String,
    /// Background color as 6 upper-case hex digits.
    pub label_color: String,
    /// Label size, always within [`MIN_LABEL_SIZE`]..=[`MAX_LABEL_SIZE`].
    pub label_size: i32,
    pub font_size: i32,
    /// Font color as 6 upper-case hex digits.
    pub font_color: String,
    /// Local-only association with a scene object. Never persisted or sent.
    pub binding: Option<ObjectHandle>,
}

impl LabelRecord {
    /// A record is applied when it is both bound and visible. Only applied
    /// records are written to the session file or included in full broadcasts.
    pub fn is_applied(&self) -> bool {
        self.binding.is_some() && !self.text.is_empty()
    }

    pub fn to_payload(&self) -> LabelPayload {
        LabelPayload {
            guid: self.id.clone(),
            label_text: Some(self.text.clone()),
            label_size: Some(self.label_size),
            label_color: Some(self.label_color.clone()),
            font_size: Some(self.font_size),
            font_color: Some(self.font_color.clone()),
        }
    }
}

/// Defaults used to fill fields a caller or payload leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelDefaults {
    pub label_color: String,
    pub label_size: i32,
    pub font_size: i32,
    pub font_color: String,
}

impl Default for LabelDefaults {
    fn default() -> Self {
        Self {
            label_color: "FFFFFF".to_string(),
            label_size: 8,
            font_size: 24,
            font_color: "000000".to_string(),
        }
    }
}

/// Normalize a color string to 6 upper-case hex digits.
///
/// Accepts an optional leading `#`. Returns `None` for anything else.
pub fn normalize_color(raw: &str) -> Option<String> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_ascii_uppercase())
    } else {
        None
    }
}

pub fn clamp_label_size(size: i32) -> i32 {
    size.clamp(MIN_LABEL_SIZE, MAX_LABEL_SIZE)
}
