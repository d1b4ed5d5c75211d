use std::fs;
use std::path::Path;

use super::files::{read_labels, write_labels};
use super::paths::LabelPaths;
use crate::store::RecordStore;

/// What a migration pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Applied records written to the session file.
    pub migrated: usize,
    /// Entries left in the legacy file, if it was rewritten.
    pub legacy_remaining: Option<usize>,
    /// Whether the legacy file and its folder were removed.
    pub legacy_removed: bool,
}

/// Move the applied records of this session out of the legacy file.
///
/// The session file is always written, even with nothing to migrate, so the next
/// load of this session prefers it over the legacy file. A failure at any step is
/// logged and ends the pass; the store is only read.
pub(crate) fn migrate_legacy(
    paths: &LabelPaths,
    session: &Path,
    store: &RecordStore,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    let applied = store.applied();
    let session_file = paths.session_file(session);

    if let Err(e) = write_labels(&session_file, &applied) {
        tracing::error!("Label migration aborted, session file not written: {}", e);
        return report;
    }
    report.migrated = applied.len();

    if applied.is_empty() {
        tracing::info!(
            "No applied labels to migrate, wrote empty {}",
            session_file.display()
        );
    } else {
        tracing::info!(
            "Migrated {} labels from the global file to {}",
            applied.len(),
            session_file.display()
        );
    }

    let legacy_file = paths.legacy_file();
    if !legacy_file.exists() {
        return report;
    }

    let mut legacy = match read_labels(&legacy_file) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Could not re-read legacy labels for cleanup: {}", e);
            return report;
        }
    };
    legacy.retain(|id, _| !applied.contains_key(id));

    if !legacy.is_empty() {
        match write_labels(&legacy_file, &legacy) {
            Ok(()) => {
                tracing::info!("{} labels remain in the legacy file", legacy.len());
                report.legacy_remaining = Some(legacy.len());
            }
            Err(e) => tracing::error!("Could not rewrite legacy labels: {}", e),
        }
        return report;
    }

    if let Err(e) = fs::remove_file(&legacy_file) {
        tracing::error!(
            "Could not delete legacy label file {}: {}",
            legacy_file.display(),
            e
        );
        return report;
    }
    if let Err(e) = fs::remove_dir(paths.legacy_dir()) {
        tracing::debug!(
            "Legacy label folder {} not removed: {}",
            paths.legacy_dir().display(),
            e
        );
    }

    tracing::info!("Legacy label file fully migrated and removed");
    report.legacy_removed = true;
    report
}
