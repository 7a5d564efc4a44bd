/// Shared data structures for the application state
///
/// These structs represent the data model that flows between the
/// profile store, the mutators and the UI layer. Field names are
/// serialized in camelCase so stored records and exported JSON files
/// stay readable by older exports.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-authored record: part identifier, free-text body and images
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Opaque unique id
    #[serde(default = "new_note_id")]
    pub id: String,
    /// Display key, not guaranteed unique
    #[serde(default)]
    pub part_id: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// An image attached to a note
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default = "new_image_id")]
    pub id: String,
    /// Current raster encoding, replaced on every crop
    pub data_url: String,
    /// Encoding every crop re-samples from; written once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_data_url: Option<String>,
    #[serde(default)]
    pub caption: String,
    /// Region used by the last crop, for re-opening the cropper there
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_crop: Option<LastCrop>,
}

/// Crop rectangle normalized against the displayed image
///
/// `rel_x` and `rel_size` are fractions of the displayed width,
/// `rel_y` a fraction of the displayed height.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastCrop {
    pub rel_x: f32,
    pub rel_y: f32,
    pub rel_size: f32,
}

/// Partial update for `partId` / `body`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteEdit {
    pub part_id: Option<String>,
    pub body: Option<String>,
}

impl NoteEdit {
    pub fn part_id(value: impl Into<String>) -> Self {
        Self {
            part_id: Some(value.into()),
            body: None,
        }
    }

    pub fn body(value: impl Into<String>) -> Self {
        Self {
            part_id: None,
            body: Some(value.into()),
        }
    }
}

impl Note {
    /// Create an empty note stamped with `now`
    pub fn new(now: i64) -> Self {
        Self {
            id: new_note_id(),
            part_id: String::new(),
            created_at: now,
            updated_at: now,
            body: String::new(),
            images: Vec::new(),
        }
    }

    /// Name shown in lists and headings
    pub fn display_title(&self) -> &str {
        let trimmed = self.part_id.trim();
        if trimmed.is_empty() {
            "Untitled"
        } else {
            trimmed
        }
    }

    /// Deep copy with fresh ids and timestamps
    pub fn duplicate(&self, now: i64) -> Self {
        Self {
            id: new_note_id(),
            part_id: format!("{} (COPY)", self.part_id),
            created_at: now,
            updated_at: now,
            body: self.body.clone(),
            images: self.images.iter().map(Image::duplicate).collect(),
        }
    }

    pub fn image(&self, image_id: &str) -> Option<&Image> {
        self.images.iter().find(|img| img.id == image_id)
    }

    pub fn image_mut(&mut self, image_id: &str) -> Option<&mut Image> {
        self.images.iter_mut().find(|img| img.id == image_id)
    }
}

impl Image {
    /// A freshly ingested image: both encodings start out identical
    pub fn new(data_url: String) -> Self {
        Self {
            id: new_image_id(),
            original_data_url: Some(data_url.clone()),
            data_url,
            caption: String::new(),
            last_crop: None,
        }
    }

    pub fn duplicate(&self) -> Self {
        Self {
            id: new_image_id(),
            ..self.clone()
        }
    }

    /// Encoding crops are taken from
    pub fn crop_source(&self) -> &str {
        self.original_data_url.as_deref().unwrap_or(&self.data_url)
    }
}

pub fn new_note_id() -> String {
    format!("note_{}", Uuid::new_v4().simple())
}

pub fn new_image_id() -> String {
    format!("img_{}", Uuid::new_v4().simple())
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serialize a note list for storage
pub fn notes_to_json(notes: &[Note]) -> Result<String, serde_json::Error> {
    serde_json::to_string(notes)
}

/// Parse a note list from storage
pub fn notes_from_json(json: &str) -> Result<Vec<Note>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        let mut note = Note::new(1_000);
        note.part_id = "PX-7".to_string();
        note.body = "torque to 12Nm".to_string();
        let mut img = Image::new("data:image/jpeg;base64,AAAA".to_string());
        img.caption = "front".to_string();
        img.last_crop = Some(LastCrop {
            rel_x: 0.1,
            rel_y: 0.2,
            rel_size: 0.5,
        });
        note.images.push(img);
        note
    }

    #[test]
    fn test_new_note_is_empty() {
        let note = Note::new(42);
        assert!(note.id.starts_with("note_"));
        assert!(note.body.is_empty());
        assert!(note.images.is_empty());
        assert_eq!(note.created_at, 42);
        assert_eq!(note.updated_at, 42);
    }

    #[test]
    fn test_camel_case_field_names() {
        let json = notes_to_json(&[sample_note()]).unwrap();
        assert!(json.contains("\"partId\":\"PX-7\""));
        assert!(json.contains("\"dataUrl\""));
        assert!(json.contains("\"originalDataUrl\""));
        assert!(json.contains("\"relSize\":0.5"));
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let notes = notes_from_json(r#"[{"id":"n1","partId":"A","images":[{"dataUrl":"x"}]}]"#).unwrap();
        assert_eq!(notes[0].body, "");
        assert_eq!(notes[0].images[0].caption, "");
        assert!(notes[0].images[0].original_data_url.is_none());
        assert!(notes[0].images[0].id.starts_with("img_"));

        let notes = notes_from_json(r#"[{"partId":"B"}]"#).unwrap();
        assert!(notes[0].id.starts_with("note_"));
        assert!(notes[0].images.is_empty());
    }

    #[test]
    fn test_duplicate_is_deep_copy_with_new_ids() {
        let original = sample_note();
        let copy = original.duplicate(2_000);

        assert_ne!(copy.id, original.id);
        assert_eq!(copy.part_id, "PX-7 (COPY)");
        assert_eq!(copy.body, original.body);
        assert_eq!(copy.created_at, 2_000);
        assert_eq!(copy.images.len(), 1);
        assert_ne!(copy.images[0].id, original.images[0].id);
        assert_eq!(copy.images[0].data_url, original.images[0].data_url);
        assert_eq!(copy.images[0].caption, original.images[0].caption);
        assert_eq!(copy.images[0].last_crop, original.images[0].last_crop);
    }

    #[test]
    fn test_display_title_fallback() {
        let mut note = Note::new(0);
        assert_eq!(note.display_title(), "Untitled");
        note.part_id = "  ".to_string();
        assert_eq!(note.display_title(), "Untitled");
        note.part_id = " A1 ".to_string();
        assert_eq!(note.display_title(), "A1");
    }

    #[test]
    fn test_crop_source_prefers_original() {
        let mut img = Image::new("data:a".to_string());
        img.data_url = "data:b".to_string();
        assert_eq!(img.crop_source(), "data:a");
        img.original_data_url = None;
        assert_eq!(img.crop_source(), "data:b");
    }
}
