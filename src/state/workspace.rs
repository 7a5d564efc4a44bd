/// The workspace ties the in-memory notebook of the active profile to
/// the profile store and the autosave queue.
///
/// Structural mutations (create, delete, duplicate, images, crops,
/// import) are persisted immediately and undone in memory when the
/// write fails. Text edits are persisted through the debounced autosave
/// and stay in memory even when their write fails.
use std::collections::BTreeSet;

use super::autosave::{Autosave, Ticket};
use super::data::{now_millis, Image, LastCrop, Note, NoteEdit};
use super::library::KeyValueStore;
use super::notebook::Notebook;
use super::profiles::ProfileStore;
use crate::config::AppConfig;
use crate::error::{NoteVaultError, Result, ResultExt};

/// Result of persisting a batch of added images
#[derive(Debug, Clone, PartialEq)]
pub enum AddImagesOutcome {
    /// Saved on the first attempt
    Saved { added: usize },
    /// First save failed; the batch stays in memory until it is
    /// re-encoded smaller and handed to `finish_recompressed`
    NeedsRecompress(UnsavedImages),
    /// First save failed; saved after re-encoding smaller
    SavedAfterRecompress { added: usize },
    /// Both saves failed; the batch was removed again
    RolledBack { removed: usize, reason: String },
}

/// A batch of images that is in memory but not yet stored
#[derive(Debug, Clone, PartialEq)]
pub struct UnsavedImages {
    pub note_id: String,
    /// `(image id, current encoding)`
    pub images: Vec<(String, String)>,
}

impl UnsavedImages {
    pub fn image_ids(&self) -> Vec<String> {
        self.images.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// What the cropper needs to open on an image
#[derive(Debug, Clone)]
pub struct CropSource {
    pub original_data_url: String,
    pub last_crop: Option<LastCrop>,
}

pub struct Workspace<S> {
    profiles: ProfileStore<S>,
    active_profile: String,
    notebook: Notebook,
    autosave: Autosave,
}

impl<S: KeyValueStore> Workspace<S> {
    /// Migrate legacy data, resolve the start-up profile and load it
    pub fn open(backend: S, config: &AppConfig) -> Result<Self> {
        let mut profiles = ProfileStore::new(backend);
        profiles.migrate_legacy()?;

        let active_profile = profiles.resolve_initial_profile()?;
        let notes = profiles.load_profile(&active_profile)?;
        profiles.remember_active(&active_profile)?;
        log::info!("Opened profile '{}' with {} notes", active_profile, notes.len());

        Ok(Self {
            profiles,
            active_profile,
            notebook: Notebook::new(notes),
            autosave: Autosave::new(config.autosave_delay()),
        })
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn notebook_mut(&mut self) -> &mut Notebook {
        &mut self.notebook
    }

    pub fn profiles(&self) -> &ProfileStore<S> {
        &self.profiles
    }

    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    pub fn autosave_delay(&self) -> std::time::Duration {
        self.autosave.delay()
    }

    pub fn profile_names(&self) -> Result<BTreeSet<String>> {
        self.profiles.list_profile_names()
    }

    fn save_active(&mut self) -> Result<()> {
        let result = self
            .profiles
            .save_profile(&self.active_profile, self.notebook.notes());
        if let Err(e) = &result {
            log::error!("Saving profile '{}' failed: {}", self.active_profile, e);
        }
        result
    }

    /// Persist now; on failure run `undo` against the notebook
    fn persist_or_undo(&mut self, undo: impl FnOnce(&mut Notebook)) -> Result<()> {
        if let Err(e) = self.save_active() {
            undo(&mut self.notebook);
            return Err(e);
        }
        // A full save also covers any edit still waiting on its timer
        self.autosave.take_all();
        Ok(())
    }

    // ========== Notes ==========

    pub fn create_note(&mut self) -> Result<String> {
        let id = self.notebook.create_note(now_millis());
        let created = id.clone();
        self.persist_or_undo(|nb| {
            nb.remove_note(&created);
        })?;
        Ok(id)
    }

    /// Apply an edit in memory and schedule its write
    pub fn edit_note(&mut self, id: &str, edit: NoteEdit) -> Option<Ticket> {
        if self.notebook.edit_note(id, edit, now_millis()) {
            Some(self.autosave.schedule(id))
        } else {
            None
        }
    }

    /// Timer for `ticket` elapsed; write if it is still current.
    /// Returns whether a write happened.
    pub fn autosave_due(&mut self, ticket: &Ticket) -> Result<bool> {
        if !self.autosave.fire(ticket) {
            return Ok(false);
        }
        if let Err(e) = self.save_active() {
            // Still unsaved: the next flush has to write it
            self.autosave.keep_pending(&ticket.note_id);
            return Err(e);
        }
        Ok(true)
    }

    /// Write any pending edits right away. They stay pending when
    /// the write fails.
    pub fn flush(&mut self) -> Result<()> {
        if self.autosave.is_pending() {
            self.save_active()?;
            self.autosave.take_all();
        }
        Ok(())
    }

    /// Delete a note; unknown ids are ignored
    pub fn delete_note(&mut self, id: &str) -> Result<()> {
        let Some((index, note)) = self.notebook.remove_note(id) else {
            return Ok(());
        };
        self.persist_or_undo(move |nb| nb.restore_note(index, note))
    }

    pub fn duplicate_note(&mut self, id: &str) -> Result<Option<String>> {
        let Some(copy) = self.notebook.duplicate_note(id, now_millis()) else {
            return Ok(None);
        };
        let created = copy.clone();
        let original = id.to_string();
        self.persist_or_undo(move |nb| {
            nb.remove_note(&created);
            nb.select_note(&original);
        })?;
        Ok(Some(copy))
    }

    // ========== Images ==========

    /// Append compressed images to a note and persist them.
    ///
    /// When the save fails (typically the storage quota) the images stay
    /// in memory and come back as `NeedsRecompress`; the caller re-encodes
    /// them smaller off the UI thread and calls `finish_recompressed`.
    pub fn add_images(&mut self, note_id: &str, data_urls: Vec<String>) -> Result<AddImagesOutcome> {
        if data_urls.is_empty() {
            return Ok(AddImagesOutcome::Saved { added: 0 });
        }

        let images: Vec<Image> = data_urls.into_iter().map(Image::new).collect();
        let unsaved = UnsavedImages {
            note_id: note_id.to_string(),
            images: images
                .iter()
                .map(|img| (img.id.clone(), img.data_url.clone()))
                .collect(),
        };
        let added = images.len();
        if !self.notebook.append_images(note_id, images, now_millis()) {
            return Err(NoteVaultError::NoteMissing(note_id.to_string()));
        }

        match self.save_active() {
            Ok(()) => {
                self.autosave.take_all();
                Ok(AddImagesOutcome::Saved { added })
            }
            Err(e) => {
                log::warn!("Saving {} new images failed ({}), retrying smaller", added, e);
                Ok(AddImagesOutcome::NeedsRecompress(unsaved))
            }
        }
    }

    /// Second and last save attempt for a batch from `add_images`.
    ///
    /// `smaller` holds the new encodings; images missing from it keep
    /// their first encoding. If this save fails too, the batch is removed.
    pub fn finish_recompressed(
        &mut self,
        note_id: &str,
        image_ids: &[String],
        smaller: Vec<(String, String)>,
    ) -> AddImagesOutcome {
        self.notebook.reencode_images(note_id, smaller);
        let added = self
            .notebook
            .note(note_id)
            .map(|note| note.images.iter().filter(|img| image_ids.contains(&img.id)).count())
            .unwrap_or(0);

        match self.save_active() {
            Ok(()) => {
                self.autosave.take_all();
                AddImagesOutcome::SavedAfterRecompress { added }
            }
            Err(e) => {
                let removed = self.notebook.drop_images(note_id, image_ids);
                log::error!("Save still failed after recompressing, removed {} images", removed);
                AddImagesOutcome::RolledBack {
                    removed,
                    reason: e.user_message(),
                }
            }
        }
    }

    pub fn remove_image(&mut self, note_id: &str, image_id: &str) -> Result<()> {
        let Some((index, image)) = self.notebook.remove_image(note_id, image_id, now_millis()) else {
            return Ok(());
        };
        let note_id_owned = note_id.to_string();
        self.persist_or_undo(move |nb| nb.restore_image(&note_id_owned, index, image))
    }

    pub fn update_caption(&mut self, note_id: &str, image_id: &str, caption: String) -> Option<Ticket> {
        if self
            .notebook
            .set_caption(note_id, image_id, caption, now_millis())
        {
            Some(self.autosave.schedule(note_id))
        } else {
            None
        }
    }

    // ========== Cropping ==========

    /// Look up the crop source, backfilling `originalDataUrl` on
    /// images stored before it existed (imported legacy data).
    pub fn prepare_crop(&mut self, note_id: &str, image_id: &str) -> Result<Option<CropSource>> {
        if self.notebook.backfill_original(note_id, image_id) {
            log::info!("Backfilled original encoding for image {}", image_id);
            // The backfill only copies an existing encoding, so it can
            // stay in memory even when this write fails
            if self.save_active().log_err().is_some() {
                self.autosave.take_all();
            }
        }

        let source = self
            .notebook
            .note(note_id)
            .and_then(|n| n.image(image_id))
            .map(|img| CropSource {
                original_data_url: img.crop_source().to_string(),
                last_crop: img.last_crop,
            });
        Ok(source)
    }

    /// Store a rendered crop and its normalized rectangle
    pub fn apply_crop(
        &mut self,
        note_id: &str,
        image_id: &str,
        data_url: String,
        crop: LastCrop,
    ) -> Result<()> {
        let Some((previous_url, previous_crop)) =
            self.notebook
                .apply_crop(note_id, image_id, data_url, crop, now_millis())
        else {
            return Ok(());
        };
        let (note, image) = (note_id.to_string(), image_id.to_string());
        self.persist_or_undo(move |nb| nb.revert_crop(&note, &image, previous_url, previous_crop))?;
        log::info!("Applied crop to image {}", image_id);
        Ok(())
    }

    // ========== Profiles & import ==========

    /// Save the outgoing profile, then load `name`
    pub fn switch_profile(&mut self, name: &str) -> Result<()> {
        if name == self.active_profile {
            return Ok(());
        }
        if !self.profiles.exists(name)? {
            return Err(NoteVaultError::ProfileMissing(name.to_string()));
        }

        self.save_active()?;
        self.autosave.take_all();

        let notes = self.profiles.load_profile(name)?;
        log::info!("Switched profile '{}' -> '{}'", self.active_profile, name);
        self.active_profile = name.to_string();
        self.notebook = Notebook::new(notes);
        self.profiles.remember_active(name)?;
        Ok(())
    }

    /// Create a profile and make it active
    pub fn create_profile(&mut self, name: &str) -> Result<String> {
        let created = self.profiles.create_profile(name)?;
        self.switch_profile(&created)?;
        Ok(created)
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        self.profiles.delete_profile(name, &self.active_profile)
    }

    /// Replace every note of the active profile (import)
    pub fn replace_notes(&mut self, notes: Vec<Note>) -> Result<()> {
        let count = notes.len();
        let previous = self.notebook.replace_notes(notes);
        self.persist_or_undo(move |nb| {
            nb.replace_notes(previous);
        })?;
        log::info!("Replaced profile '{}' with {} imported notes", self.active_profile, count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ingest_files, plan_intake, Intake};
    use crate::state::library::MemoryStore;
    use crate::state::profiles::DEFAULT_PROFILE;

    fn workspace() -> Workspace<MemoryStore> {
        Workspace::open(MemoryStore::new(), &AppConfig::default()).unwrap()
    }

    fn stored_notes(ws: &Workspace<MemoryStore>, profile: &str) -> Vec<Note> {
        ws.profiles().load_profile(profile).unwrap()
    }

    fn set_quota(ws: &mut Workspace<MemoryStore>, quota: Option<usize>) {
        ws.profiles.backend_mut().set_quota(quota);
    }

    #[test]
    fn test_open_creates_default_profile() {
        let ws = workspace();
        assert_eq!(ws.active_profile(), DEFAULT_PROFILE);
        assert!(ws.notebook().notes().is_empty());
        assert_eq!(
            ws.profiles().last_active().unwrap().as_deref(),
            Some(DEFAULT_PROFILE)
        );
    }

    #[test]
    fn test_edit_persists_after_debounce() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        let t1 = ws.edit_note(&id, NoteEdit::part_id("X1")).unwrap();
        let t2 = ws.edit_note(&id, NoteEdit::body("hello")).unwrap();

        // Nothing but the empty note is stored yet
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].part_id, "");
        // In memory is already current
        assert_eq!(ws.notebook().note(&id).unwrap().body, "hello");

        // The superseded timer does nothing, the latest one writes
        assert!(!ws.autosave_due(&t1).unwrap());
        assert!(ws.autosave_due(&t2).unwrap());

        let loaded = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(loaded[0].part_id, "X1");
        assert_eq!(loaded[0].body, "hello");
    }

    #[test]
    fn test_create_rolls_back_when_save_fails() {
        let mut ws = workspace();
        set_quota(&mut ws, Some(1));
        assert!(ws.create_note().is_err());
        assert!(ws.notebook().notes().is_empty());
        assert!(ws.notebook().selected_note_id().is_none());
    }

    #[test]
    fn test_delete_note_and_missing_id() {
        let mut ws = workspace();
        let a = ws.create_note().unwrap();
        let b = ws.create_note().unwrap();
        ws.delete_note(&a).unwrap();
        ws.delete_note("does-not-exist").unwrap();
        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, b);
    }

    #[test]
    fn test_delete_restores_position_on_failure() {
        let mut ws = workspace();
        let a = ws.create_note().unwrap();
        let b = ws.create_note().unwrap();
        set_quota(&mut ws, Some(1));
        assert!(ws.delete_note(&a).is_err());
        let ids: Vec<_> = ws.notebook().notes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_duplicate_does_not_touch_original() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.edit_note(&id, NoteEdit::part_id("P9"));
        ws.add_images(&id, vec!["data:a".into()]).unwrap();
        let before = ws.notebook().note(&id).unwrap().clone();

        let copy_id = ws.duplicate_note(&id).unwrap().unwrap();
        assert_ne!(copy_id, id);
        let copy = ws.notebook().note(&copy_id).unwrap();
        assert_eq!(copy.part_id, "P9 (COPY)");
        assert_eq!(copy.images[0].data_url, before.images[0].data_url);
        assert_ne!(copy.images[0].id, before.images[0].id);
        assert_eq!(ws.notebook().note(&id).unwrap(), &before);
        assert_eq!(ws.notebook().notes().last().unwrap().id, copy_id);
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE).len(), 2);
    }

    #[test]
    fn test_add_images_saved_first_try() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        let outcome = ws.add_images(&id, vec!["data:a".into(), "data:b".into()]).unwrap();
        assert_eq!(outcome, AddImagesOutcome::Saved { added: 2 });

        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(stored[0].images.len(), 2);
        assert_eq!(stored[0].images[0].original_data_url.as_deref(), Some("data:a"));
    }

    #[test]
    fn test_add_images_to_missing_note() {
        let mut ws = workspace();
        assert!(matches!(
            ws.add_images("gone", vec!["data:a".into()]),
            Err(NoteVaultError::NoteMissing(_))
        ));
    }

    fn failed_batch(ws: &mut Workspace<MemoryStore>, id: &str, urls: Vec<String>) -> UnsavedImages {
        match ws.add_images(id, urls).unwrap() {
            AddImagesOutcome::NeedsRecompress(unsaved) => unsaved,
            other => panic!("expected a failed first save, got {:?}", other),
        }
    }

    #[test]
    fn test_add_images_retries_smaller() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        set_quota(&mut ws, Some(1000));

        let big = format!("data:{}", "x".repeat(5000));
        let unsaved = failed_batch(&mut ws, &id, vec![big.clone()]);
        assert_eq!(unsaved.note_id, id);
        assert_eq!(unsaved.images[0].1, big);
        // Waiting for the smaller encoding: in memory, not stored
        assert_eq!(ws.notebook().note(&id).unwrap().images.len(), 1);
        assert!(stored_notes(&ws, DEFAULT_PROFILE)[0].images.is_empty());

        let ids = unsaved.image_ids();
        let smaller = vec![(ids[0].clone(), "data:small".to_string())];
        let outcome = ws.finish_recompressed(&id, &ids, smaller);
        assert_eq!(outcome, AddImagesOutcome::SavedAfterRecompress { added: 1 });

        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(stored[0].images[0].data_url, "data:small");
        assert_eq!(stored[0].images[0].original_data_url.as_deref(), Some("data:small"));
    }

    #[test]
    fn test_add_images_rolls_back_after_second_failure() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.add_images(&id, vec!["data:keep".into()]).unwrap();
        set_quota(&mut ws, Some(1000));

        let big = format!("data:{}", "x".repeat(5000));
        let unsaved = failed_batch(&mut ws, &id, vec![big.clone(), big]);
        // Re-encoding could not shrink anything
        let outcome = ws.finish_recompressed(&id, &unsaved.image_ids(), Vec::new());
        assert!(matches!(outcome, AddImagesOutcome::RolledBack { removed: 2, .. }));

        let note = ws.notebook().note(&id).unwrap();
        assert_eq!(note.images.len(), 1);
        assert_eq!(note.images[0].data_url, "data:keep");
    }

    #[test]
    fn test_declined_oversized_batch_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("scan.png");
        std::fs::write(&big, vec![0u8; 4096]).unwrap();

        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.add_images(&id, vec!["data:keep".into()]).unwrap();
        let images_before = ws.notebook().note(&id).unwrap().images.clone();
        let writes = ws.profiles().backend().write_count();

        // The batch waits for confirmation; declining drops the plan
        let plan = plan_intake(vec![big], 1024);
        assert!(matches!(plan, Intake::NeedsConfirmation { oversized: 1, .. }));
        drop(plan);

        assert_eq!(ws.notebook().note(&id).unwrap().images, images_before);
        assert_eq!(ws.profiles().backend().write_count(), writes);
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].images, images_before);
    }

    #[tokio::test]
    async fn test_accepted_oversized_batch_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("scan.png");
        image::RgbImage::new(64, 64).save(&big).unwrap();

        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        let writes = ws.profiles().backend().write_count();

        let paths = match plan_intake(vec![big], 16) {
            Intake::NeedsConfirmation { paths, oversized: 1 } => paths,
            other => panic!("expected confirmation, got {:?}", other),
        };
        let report = ingest_files(paths, AppConfig::default().ingest_options()).await;
        assert!(report.failures.is_empty());

        let outcome = ws.add_images(&id, report.images).unwrap();
        assert_eq!(outcome, AddImagesOutcome::Saved { added: 1 });
        assert_eq!(ws.profiles().backend().write_count(), writes + 1);
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].images.len(), 1);
    }

    #[test]
    fn test_remove_image_and_caption() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.add_images(&id, vec!["data:a".into(), "data:b".into()]).unwrap();
        let first = ws.notebook().note(&id).unwrap().images[0].id.clone();
        let second = ws.notebook().note(&id).unwrap().images[1].id.clone();

        let ticket = ws.update_caption(&id, &second, "rear view".into()).unwrap();
        ws.remove_image(&id, &first).unwrap();
        // The immediate save already carried the caption
        assert!(!ws.autosave_due(&ticket).unwrap());

        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(stored[0].images.len(), 1);
        assert_eq!(stored[0].images[0].caption, "rear view");
        assert!(ws.update_caption(&id, "nope", "x".into()).is_none());
    }

    #[test]
    fn test_prepare_crop_backfills_legacy_image() {
        let mut ws = workspace();
        let mut note = Note::new(0);
        let mut img = Image::new("data:legacy".into());
        img.original_data_url = None;
        let image_id = img.id.clone();
        note.images.push(img);
        let note_id = note.id.clone();
        ws.replace_notes(vec![note]).unwrap();

        let source = ws.prepare_crop(&note_id, &image_id).unwrap().unwrap();
        assert_eq!(source.original_data_url, "data:legacy");
        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        assert_eq!(
            stored[0].images[0].original_data_url.as_deref(),
            Some("data:legacy")
        );
        assert!(ws.prepare_crop(&note_id, "missing").unwrap().is_none());
    }

    #[test]
    fn test_apply_crop_keeps_original() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.add_images(&id, vec!["data:orig".into()]).unwrap();
        let image_id = ws.notebook().note(&id).unwrap().images[0].id.clone();
        let crop = LastCrop {
            rel_x: 0.2,
            rel_y: 0.3,
            rel_size: 0.4,
        };

        ws.apply_crop(&id, &image_id, "data:crop1".into(), crop).unwrap();
        ws.apply_crop(&id, &image_id, "data:crop2".into(), crop).unwrap();

        let stored = stored_notes(&ws, DEFAULT_PROFILE);
        let img = &stored[0].images[0];
        assert_eq!(img.data_url, "data:crop2");
        assert_eq!(img.original_data_url.as_deref(), Some("data:orig"));
        assert_eq!(img.last_crop, Some(crop));
        assert_eq!(
            ws.prepare_crop(&id, &image_id).unwrap().unwrap().original_data_url,
            "data:orig"
        );
    }

    #[test]
    fn test_switch_profile_saves_outgoing_first() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.edit_note(&id, NoteEdit::body("unsaved draft"));
        assert!(ws.autosave.is_pending());

        ws.create_profile("Garage").unwrap();
        assert_eq!(ws.active_profile(), "Garage");
        assert!(ws.notebook().notes().is_empty());
        assert!(!ws.autosave.is_pending());
        // The pending edit was flushed with the outgoing profile
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].body, "unsaved draft");

        let other = ws.create_note().unwrap();
        ws.switch_profile(DEFAULT_PROFILE).unwrap();
        assert_eq!(ws.notebook().notes()[0].body, "unsaved draft");
        assert_eq!(ws.notebook().selected_note_id(), Some(id.as_str()));

        ws.switch_profile("Garage").unwrap();
        assert_eq!(ws.notebook().notes()[0].id, other);
        assert_eq!(ws.profiles().last_active().unwrap().as_deref(), Some("Garage"));
    }

    #[test]
    fn test_switch_to_missing_profile_fails() {
        let mut ws = workspace();
        assert!(matches!(
            ws.switch_profile("Nowhere"),
            Err(NoteVaultError::ProfileMissing(_))
        ));
        assert_eq!(ws.active_profile(), DEFAULT_PROFILE);
    }

    #[test]
    fn test_delete_active_profile_is_refused() {
        let mut ws = workspace();
        ws.create_profile("Other").unwrap();
        assert!(ws.delete_profile("Other").is_err());
        ws.delete_profile(DEFAULT_PROFILE).unwrap();
        let names: Vec<_> = ws.profile_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["Other".to_string()]);
    }

    #[test]
    fn test_replace_notes_rolls_back_on_failure() {
        let mut ws = workspace();
        let kept = ws.create_note().unwrap();
        set_quota(&mut ws, Some(10));
        let incoming = vec![Note::new(1), Note::new(2)];
        assert!(ws.replace_notes(incoming).is_err());
        assert_eq!(ws.notebook().notes().len(), 1);
        assert_eq!(ws.notebook().notes()[0].id, kept);
    }

    #[test]
    fn test_flush_writes_pending_edits() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        ws.edit_note(&id, NoteEdit::part_id("Z"));
        let writes = ws.profiles().backend().write_count();
        ws.flush().unwrap();
        assert_eq!(ws.profiles().backend().write_count(), writes + 1);
        // Nothing pending: no write
        ws.flush().unwrap();
        assert_eq!(ws.profiles().backend().write_count(), writes + 1);
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].part_id, "Z");
    }

    #[test]
    fn test_failed_writes_stay_pending() {
        let mut ws = workspace();
        let id = ws.create_note().unwrap();
        set_quota(&mut ws, Some(200));
        let long = "y".repeat(500);

        let ticket = ws.edit_note(&id, NoteEdit::body(long.clone())).unwrap();
        assert!(ws.autosave_due(&ticket).is_err());
        assert!(ws.autosave.is_pending());
        assert!(ws.flush().is_err());
        assert!(ws.autosave.is_pending());

        set_quota(&mut ws, None);
        ws.flush().unwrap();
        assert!(!ws.autosave.is_pending());
        assert_eq!(stored_notes(&ws, DEFAULT_PROFILE)[0].body, long);
    }
}
