//! Collaborators the engine consumes but does not implement.
//!
//! The running application supplies the real scene, renderer and session path.
//! The in-process implementations here ([`SceneRegistry`], [`RenderLog`],
//! [`FixedSessionPath`]) serve headless hosts and tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::models::{LabelRecord, ObjectHandle};

/// Enumerates live scene objects that can carry a label.
pub trait SceneQuery {
    /// Every live label-capable object with its entity identifier.
    fn live_objects(&self) -> Vec<(String, ObjectHandle)>;
}

/// Draws labels on bound scene objects.
pub trait LabelRenderer {
    /// Show or update the visual for a bound record.
    fn apply(&mut self, record: &LabelRecord);

    /// Hide the visual for `id`.
    fn remove(&mut self, id: &str);

    /// Redraw even if the renderer believes nothing changed.
    fn force_refresh(&mut self, record: &LabelRecord) {
        self.apply(record);
    }
}

/// Resolves where the current session stores its files.
pub trait SessionPathResolver {
    fn session_path(&self) -> Option<PathBuf>;
}

// ============================================================
// In-process implementations
// ============================================================

/// Shared, mutable scene map. Clones see the same objects.
#[derive(Debug, Clone, Default)]
pub struct SceneRegistry {
    objects: Arc<Mutex<BTreeMap<String, ObjectHandle>>>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, id: impl Into<String>, handle: ObjectHandle) {
        let mut objects = self.objects.lock().expect("scene lock poisoned");
        objects.insert(id.into(), handle);
    }

    pub fn despawn(&self, id: &str) {
        let mut objects = self.objects.lock().expect("scene lock poisoned");
        objects.remove(id);
    }

    pub fn clear(&self) {
        self.objects.lock().expect("scene lock poisoned").clear();
    }
}

impl SceneQuery for SceneRegistry {
    fn live_objects(&self) -> Vec<(String, ObjectHandle)> {
        let objects = self.objects.lock().expect("scene lock poisoned");
        objects.iter().map(|(id, h)| (id.clone(), *h)).collect()
    }
}

/// One call made to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Apply { id: String, text: String },
    Remove { id: String },
    Refresh { id: String },
}

/// Renderer that records what it was asked to draw. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    calls: Arc<Mutex<Vec<RenderCall>>>,
}

impl RenderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().expect("render log lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("render log lock poisoned").clear();
    }

    fn push(&self, call: RenderCall) {
        self.calls.lock().expect("render log lock poisoned").push(call);
    }
}

impl LabelRenderer for RenderLog {
    fn apply(&mut self, record: &LabelRecord) {
        self.push(RenderCall::Apply {
            id: record.id.clone(),
            text: record.text.clone(),
        });
    }

    fn remove(&mut self, id: &str) {
        self.push(RenderCall::Remove { id: id.to_string() });
    }

    fn force_refresh(&mut self, record: &LabelRecord) {
        self.push(RenderCall::Refresh {
            id: record.id.clone(),
        });
    }
}

/// Session resolver returning a fixed path, or none.
#[derive(Debug, Clone, Default)]
pub struct FixedSessionPath(Arc<Mutex<Option<PathBuf>>>);

impl FixedSessionPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(Mutex::new(Some(path.into()))))
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn set(&self, path: Option<PathBuf>) {
        *self.0.lock().expect("session path lock poisoned") = path;
    }
}

impl SessionPathResolver for FixedSessionPath {
    fn session_path(&self) -> Option<PathBuf> {
        self.0.lock().expect("session path lock poisoned").clone()
    }
}
