use std::path::{Path, PathBuf};

/// Folder holding label files, both globally and per session.
pub const LABELS_DIR: &str = "SimpleLabels";
/// Label file name inside [`LABELS_DIR`].
pub const LABELS_FILE: &str = "Labels.json";
/// Name an unreadable session file is moved to before the session starts empty.
pub const LABELS_BACKUP_FILE: &str = "Labels.json.bak";

/// Resolves where label files live.
///
/// - Legacy: `{mod data root}/SimpleLabels/Labels.json`, read only for migration.
/// - Session: `{session path}/SimpleLabels/Labels.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPaths {
    legacy_dir: PathBuf,
}

impl LabelPaths {
    pub fn new(mod_data_root: impl AsRef<Path>) -> Self {
        Self {
            legacy_dir: mod_data_root.as_ref().join(LABELS_DIR),
        }
    }

    pub fn legacy_dir(&self) -> &Path {
        &self.legacy_dir
    }

    pub fn legacy_file(&self) -> PathBuf {
        self.legacy_dir.join(LABELS_FILE)
    }

    pub fn session_dir(&self, session: &Path) -> PathBuf {
        session.join(LABELS_DIR)
    }

    pub fn session_file(&self, session: &Path) -> PathBuf {
        self.session_dir(session).join(LABELS_FILE)
    }

    pub fn session_backup(&self, session: &Path) -> PathBuf {
        self.session_dir(session).join(LABELS_BACKUP_FILE)
    }
}
