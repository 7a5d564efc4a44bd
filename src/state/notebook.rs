/// In-memory state of the active profile: the ordered note list plus
/// selection and list filter. All mutators here are synchronous and
/// never touch storage; `Workspace` decides when to persist.
use super::data::{Image, LastCrop, Note, NoteEdit};

#[derive(Debug, Default, Clone)]
pub struct Notebook {
    notes: Vec<Note>,
    selected_note: Option<String>,
    selected_image: Option<String>,
    filter: String,
}

impl Notebook {
    pub fn new(notes: Vec<Note>) -> Self {
        let mut notebook = Self {
            notes,
            ..Self::default()
        };
        notebook.ensure_selection();
        notebook
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn note_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    // ========== Selection & filter ==========

    pub fn selected_note_id(&self) -> Option<&str> {
        self.selected_note.as_deref()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.selected_note.as_deref().and_then(|id| self.note(id))
    }

    pub fn selected_image(&self) -> Option<&Image> {
        let image_id = self.selected_image.as_deref()?;
        self.selected_note()?.image(image_id)
    }

    pub fn select_note(&mut self, id: &str) {
        if self.note(id).is_some() {
            self.selected_note = Some(id.to_string());
            self.selected_image = None;
        }
    }

    pub fn select_image(&mut self, image_id: &str) {
        let exists = self
            .selected_note()
            .map(|note| note.image(image_id).is_some())
            .unwrap_or(false);
        if exists {
            self.selected_image = Some(image_id.to_string());
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.ensure_selection();
    }

    /// Notes whose part id contains the filter text, case-insensitive
    pub fn visible_notes(&self) -> impl Iterator<Item = &Note> {
        let needle = self.filter.trim().to_lowercase();
        self.notes
            .iter()
            .filter(move |note| needle.is_empty() || note.part_id.to_lowercase().contains(&needle))
    }

    /// Fall back to the first visible note when the selection is gone
    pub fn ensure_selection(&mut self) {
        if self.selected_note().is_some() {
            return;
        }
        let first = self.visible_notes().next().map(|n| n.id.clone());
        self.selected_note = first;
        self.selected_image = None;
    }

    // ========== Note mutators ==========

    /// Insert an empty note at the head of the list and select it
    pub fn create_note(&mut self, now: i64) -> String {
        let note = Note::new(now);
        let id = note.id.clone();
        self.notes.insert(0, note);
        self.selected_note = Some(id.clone());
        self.selected_image = None;
        id
    }

    /// Merge `partId`/`body` changes; false when the note is unknown
    pub fn edit_note(&mut self, id: &str, edit: NoteEdit, now: i64) -> bool {
        let Some(note) = self.note_mut(id) else {
            return false;
        };
        if let Some(part_id) = edit.part_id {
            note.part_id = part_id;
        }
        if let Some(body) = edit.body {
            note.body = body;
        }
        note.updated_at = now;
        true
    }

    /// Remove a note, returning it with its former position
    pub fn remove_note(&mut self, id: &str) -> Option<(usize, Note)> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        let note = self.notes.remove(index);
        if self.selected_note.as_deref() == Some(id) {
            self.selected_note = None;
            self.selected_image = None;
        }
        self.ensure_selection();
        Some((index, note))
    }

    /// Put a removed note back where it was
    pub fn restore_note(&mut self, index: usize, note: Note) {
        let index = index.min(self.notes.len());
        self.notes.insert(index, note);
        self.ensure_selection();
    }

    /// Deep-copy a note to the tail of the list and select the copy
    pub fn duplicate_note(&mut self, id: &str, now: i64) -> Option<String> {
        let copy = self.note(id)?.duplicate(now);
        let copy_id = copy.id.clone();
        self.notes.push(copy);
        self.selected_note = Some(copy_id.clone());
        self.selected_image = None;
        Some(copy_id)
    }

    /// Replace the whole list (import)
    pub fn replace_notes(&mut self, notes: Vec<Note>) -> Vec<Note> {
        let previous = std::mem::replace(&mut self.notes, notes);
        self.selected_note = None;
        self.selected_image = None;
        self.ensure_selection();
        previous
    }

    // ========== Image mutators ==========

    pub fn append_images(&mut self, note_id: &str, images: Vec<Image>, now: i64) -> bool {
        let Some(note) = self.note_mut(note_id) else {
            return false;
        };
        note.images.extend(images);
        note.updated_at = now;
        true
    }

    /// Drop the given images from a note; returns how many were removed
    pub fn drop_images(&mut self, note_id: &str, image_ids: &[String]) -> usize {
        let Some(note) = self.note_mut(note_id) else {
            return 0;
        };
        let before = note.images.len();
        note.images.retain(|img| !image_ids.contains(&img.id));
        let removed = before - note.images.len();
        if let Some(selected) = &self.selected_image {
            if image_ids.contains(selected) {
                self.selected_image = None;
            }
        }
        removed
    }

    /// Replace the encodings of the given images
    pub fn reencode_images(&mut self, note_id: &str, encodings: Vec<(String, String)>) {
        let Some(note) = self.note_mut(note_id) else {
            return;
        };
        for (image_id, data_url) in encodings {
            if let Some(img) = note.image_mut(&image_id) {
                img.original_data_url = Some(data_url.clone());
                img.data_url = data_url;
            }
        }
    }

    /// Remove an image, clearing the image selection if it pointed there
    pub fn remove_image(&mut self, note_id: &str, image_id: &str, now: i64) -> Option<(usize, Image)> {
        let note = self.note_mut(note_id)?;
        let index = note.images.iter().position(|img| img.id == image_id)?;
        let image = note.images.remove(index);
        note.updated_at = now;
        if self.selected_image.as_deref() == Some(image_id) {
            self.selected_image = None;
        }
        Some((index, image))
    }

    pub fn restore_image(&mut self, note_id: &str, index: usize, image: Image) {
        if let Some(note) = self.note_mut(note_id) {
            let index = index.min(note.images.len());
            note.images.insert(index, image);
        }
    }

    pub fn set_caption(&mut self, note_id: &str, image_id: &str, caption: String, now: i64) -> bool {
        let Some(note) = self.note_mut(note_id) else {
            return false;
        };
        let Some(img) = note.image_mut(image_id) else {
            return false;
        };
        img.caption = caption;
        note.updated_at = now;
        true
    }

    /// Fill in `originalDataUrl` for images stored before it existed.
    /// Returns true when something changed.
    pub fn backfill_original(&mut self, note_id: &str, image_id: &str) -> bool {
        let Some(img) = self.note_mut(note_id).and_then(|n| n.image_mut(image_id)) else {
            return false;
        };
        if img.original_data_url.is_some() {
            return false;
        }
        img.original_data_url = Some(img.data_url.clone());
        true
    }

    /// Store a crop result; returns the previous `(dataUrl, lastCrop)`
    pub fn apply_crop(
        &mut self,
        note_id: &str,
        image_id: &str,
        data_url: String,
        crop: LastCrop,
        now: i64,
    ) -> Option<(String, Option<LastCrop>)> {
        let note = self.note_mut(note_id)?;
        let img = note.image_mut(image_id)?;
        let previous_url = std::mem::replace(&mut img.data_url, data_url);
        let previous_crop = img.last_crop.replace(crop);
        note.updated_at = now;
        Some((previous_url, previous_crop))
    }

    pub fn revert_crop(
        &mut self,
        note_id: &str,
        image_id: &str,
        data_url: String,
        crop: Option<LastCrop>,
    ) {
        if let Some(img) = self.note_mut(note_id).and_then(|n| n.image_mut(image_id)) {
            img.data_url = data_url;
            img.last_crop = crop;
        }
    }
}
