//! Session-scoped label files and the one-time legacy migration.
//!
//! # Load sequence
//!
//! 1. The session file (`{session}/SimpleLabels/Labels.json`) wins when present.
//! 2. Otherwise the legacy global file is loaded and a migration pass is
//!    scheduled for after the configured delay.
//! 3. Otherwise the session starts empty. This is not an error.
//!
//! The manager never creates records itself. [`PersistenceManager::load`] hands the
//! decoded payloads back so the engine can create them through its usual path.

mod files;
mod migration;
mod paths;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use migration::MigrationReport;
pub use paths::*;

use crate::error::PersistError;
use crate::models::LabelPayload;
use crate::schedule::Timer;
use crate::store::RecordStore;

/// Which file a session's labels came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Session,
    Legacy,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub source: LoadSource,
    pub labels: Vec<LabelPayload>,
}

impl LoadOutcome {
    fn empty() -> Self {
        Self {
            source: LoadSource::Empty,
            labels: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct PendingMigration {
    session: PathBuf,
    timer: Timer,
}

pub struct PersistenceManager {
    paths: LabelPaths,
    migration_delay: Duration,
    pending: Option<PendingMigration>,
}

impl PersistenceManager {
    pub fn new(paths: LabelPaths, migration_delay: Duration) -> Self {
        Self {
            paths,
            migration_delay,
            pending: None,
        }
    }

    pub fn paths(&self) -> &LabelPaths {
        &self.paths
    }

    /// Prepare for a new session: make sure the legacy folder exists, drop any
    /// migration scheduled for the previous session and empty the store.
    pub fn initialize(&mut self, store: &mut RecordStore) {
        self.drop_pending("New session loaded before the label migration ran");
        if let Err(e) = fs::create_dir_all(self.paths.legacy_dir()) {
            tracing::error!(
                "Could not create legacy label folder {}: {}",
                self.paths.legacy_dir().display(),
                e
            );
        }
        store.clear();
    }

    /// Read the labels for `session`, preferring the session file over the legacy one.
    ///
    /// A migration still pending from an earlier load is dropped; it would
    /// otherwise write this session's labels into the other session's file.
    /// An unreadable session file is moved aside to `Labels.json.bak` so a later
    /// save cannot overwrite it.
    pub fn load(&mut self, session: &Path, now: Instant) -> LoadOutcome {
        self.drop_pending("Label migration for a previous session dropped");

        let session_file = self.paths.session_file(session);
        if session_file.exists() {
            return match files::read_labels(&session_file) {
                Ok(labels) => {
                    tracing::info!(
                        "Loaded {} labels from {}",
                        labels.len(),
                        session_file.display()
                    );
                    LoadOutcome {
                        source: LoadSource::Session,
                        labels: labels.into_values().collect(),
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to load session labels: {}", e);
                    if matches!(e, PersistError::Decode { .. }) {
                        self.set_aside(session, &session_file);
                    }
                    LoadOutcome::empty()
                }
            };
        }

        let legacy_file = self.paths.legacy_file();
        if legacy_file.exists() {
            return match files::read_labels(&legacy_file) {
                Ok(labels) => {
                    tracing::info!(
                        "Loaded {} labels from legacy file, migration in {:?}",
                        labels.len(),
                        self.migration_delay
                    );
                    self.pending = Some(PendingMigration {
                        session: session.to_path_buf(),
                        timer: Timer::after(now, self.migration_delay),
                    });
                    LoadOutcome {
                        source: LoadSource::Legacy,
                        labels: labels.into_values().collect(),
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to load legacy labels: {}", e);
                    LoadOutcome::empty()
                }
            };
        }

        tracing::info!("No saved labels for this session, starting empty");
        LoadOutcome::empty()
    }

    /// Run the migration pass if its delay has elapsed.
    pub fn poll(&mut self, now: Instant, store: &RecordStore) -> Option<MigrationReport> {
        if !self.pending.as_ref().is_some_and(|p| p.timer.is_due(now)) {
            return None;
        }

        let pending = self.pending.take()?;
        Some(migration::migrate_legacy(&self.paths, &pending.session, store))
    }

    pub fn migration_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Write the applied records to the session file. Returns `false` on failure.
    pub fn save(&self, session: &Path, store: &RecordStore) -> bool {
        let session_file = self.paths.session_file(session);
        let applied = store.applied();

        match files::write_labels(&session_file, &applied) {
            Ok(()) => {
                tracing::info!(
                    "Saved {} labels to {}",
                    applied.len(),
                    session_file.display()
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to save labels: {}", e);
                false
            }
        }
    }

    /// Forget session state. A migration that has not run yet is dropped, since
    /// the store it would read is about to be cleared.
    pub fn terminate(&mut self) {
        self.drop_pending("Session ended before the label migration ran");
    }

    fn drop_pending(&mut self, reason: &str) {
        if self.pending.take().is_some() {
            tracing::debug!("{}", reason);
        }
    }

    fn set_aside(&self, session: &Path, session_file: &Path) {
        let backup = self.paths.session_backup(session);
        match fs::rename(session_file, &backup) {
            Ok(()) => tracing::warn!("Moved unreadable label file to {}", backup.display()),
            Err(e) => tracing::error!(
                "Could not move unreadable label file {} aside: {}",
                session_file.display(),
                e
            ),
        }
    }
}
