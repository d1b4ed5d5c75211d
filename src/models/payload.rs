use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Identifier → payload map, the shape of both label files and the host's
/// full-state broadcast.
pub type LabelMap = BTreeMap<String, LabelPayload>;

/// Wire and disk form of a label record.
///
/// Field names match the established file format (`Guid`, `LabelText`, ...).
/// Every field except the identifier is optional: on create, a missing field
/// takes its configured default; on update, it leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LabelPayload {
    #[serde(default)]
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
}

impl LabelPayload {
    /// Decode a single payload. Payloads without an identifier are rejected.
    pub fn decode(json: &str) -> Result<Self, DecodeError> {
        let payload: LabelPayload = serde_json::from_str(json)?;
        if payload.guid.is_empty() {
            return Err(DecodeError::MissingId);
        }
        Ok(payload)
    }

    pub fn encode(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode an identifier → payload document.
///
/// Blank input is an empty map. An entry whose `Guid` is missing takes its map
/// key as the identifier; entries with neither, or with a malformed body, are
/// skipped and logged rather than failing the whole document.
pub fn decode_label_map(json: &str) -> Result<LabelMap, DecodeError> {
    if json.trim().is_empty() {
        return Ok(LabelMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut labels = LabelMap::new();

    for (key, value) in raw {
        let mut payload: LabelPayload = match serde_json::from_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Skipping malformed label entry {:?}: {}", key, e);
                continue;
            }
        };

        if payload.guid.is_empty() {
            payload.guid = key;
        }
        if payload.guid.is_empty() {
            tracing::warn!("Skipping label entry without an identifier");
            continue;
        }

        labels.insert(payload.guid.clone(), payload);
    }

    Ok(labels)
}

pub fn encode_label_map(labels: &LabelMap) -> Result<String, DecodeError> {
    Ok(serde_json::to_string_pretty(labels)?)
}
