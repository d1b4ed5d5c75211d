use super::label::ObjectHandle;
use super::payload::LabelPayload;

/// Input for creating a label record.
///
/// Style fields left as `None` are filled from the configured
/// [`LabelDefaults`](super::LabelDefaults).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateLabelInput {
    pub id: String,
    pub binding: Option<ObjectHandle>,
    pub text: String,
    pub label_color: Option<String>,
    pub label_size: Option<i32>,
    pub font_size: Option<i32>,
    pub font_color: Option<String>,
}

impl CreateLabelInput {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_binding(mut self, binding: ObjectHandle) -> Self {
        self.binding = Some(binding);
        self
    }
}

impl From<LabelPayload> for CreateLabelInput {
    fn from(payload: LabelPayload) -> Self {
        Self {
            id: payload.guid,
            binding: None,
            text: payload.label_text.unwrap_or_default(),
            label_color: payload.label_color,
            label_size: payload.label_size,
            font_size: payload.font_size,
            font_color: payload.font_color,
        }
    }
}

/// Input for updating a label record. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateLabelInput {
    pub text: Option<String>,
    pub label_color: Option<String>,
    pub label_size: Option<i32>,
    pub font_size: Option<i32>,
    pub font_color: Option<String>,
}

impl UpdateLabelInput {
    /// Update only the text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.label_color.is_none()
            && self.label_size.is_none()
            && self.font_size.is_none()
            && self.font_color.is_none()
    }
}

impl From<LabelPayload> for UpdateLabelInput {
    fn from(payload: LabelPayload) -> Self {
        Self {
            text: payload.label_text,
            label_color: payload.label_color,
            label_size: payload.label_size,
            font_size: payload.font_size,
            font_color: payload.font_color,
        }
    }
}
