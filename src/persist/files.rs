use std::fs;
use std::path::Path;

use crate::error::PersistError;
use crate::models::{decode_label_map, encode_label_map, LabelMap};

/// Read a label file. A blank file is an empty map.
pub(crate) fn read_labels(path: &Path) -> Result<LabelMap, PersistError> {
    let content = fs::read_to_string(path).map_err(|e| PersistError::io(path, e))?;
    decode_label_map(&content).map_err(|e| PersistError::decode(path, e))
}

/// Write a label file, creating its directory if needed.
pub(crate) fn write_labels(path: &Path, labels: &LabelMap) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }

    let content = encode_label_map(labels).map_err(|e| PersistError::decode(path, e))?;
    fs::write(path, content).map_err(|e| PersistError::io(path, e))
}
