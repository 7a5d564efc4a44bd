/// Profile store: named, independent note collections on top of a
/// key-value backend.
///
/// Layout:
/// - `profile:<name>` → JSON array of notes
/// - `settings:lastProfile` → name of the profile to resume at start-up
use serde_json::Value;
use std::collections::BTreeSet;

use super::data::{notes_from_json, notes_to_json, Note};
use super::library::KeyValueStore;
use crate::error::{NoteVaultError, Result};

const PROFILE_PREFIX: &str = "profile:";
const LAST_PROFILE_KEY: &str = "settings:lastProfile";

/// Profile created when nothing else exists
pub const DEFAULT_PROFILE: &str = "Default";

/// Legacy single-array records, oldest first
const LEGACY_KEYS: [&str; 2] = ["notevault.v1.notes", "all_notes"];

pub struct ProfileStore<S> {
    backend: S,
}

impl<S: KeyValueStore> ProfileStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    fn profile_key(name: &str) -> String {
        format!("{}{}", PROFILE_PREFIX, name)
    }

    /// Names of every stored profile, sorted
    pub fn list_profile_names(&self) -> Result<BTreeSet<String>> {
        let names = self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(PROFILE_PREFIX).map(str::to_string))
            .collect();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.backend.get(&Self::profile_key(name))?.is_some())
    }

    /// Load a profile's notes; a missing profile is empty
    pub fn load_profile(&self, name: &str) -> Result<Vec<Note>> {
        let Some(raw) = self.backend.get(&Self::profile_key(name))? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(_)) => Ok(notes_from_json(&raw)?),
            Ok(_) => {
                log::warn!("Profile '{}' is not a note list, loading it empty", name);
                Ok(Vec::new())
            }
            Err(e) => {
                log::warn!("Profile '{}' is unreadable ({}), loading it empty", name, e);
                Ok(Vec::new())
            }
        }
    }

    pub fn save_profile(&mut self, name: &str, notes: &[Note]) -> Result<()> {
        let json = notes_to_json(notes)?;
        self.backend.set(&Self::profile_key(name), &json)?;
        log::debug!("Saved profile '{}' ({} notes, {} bytes)", name, notes.len(), json.len());
        Ok(())
    }

    /// Create an empty profile; fails when the name is taken
    pub fn create_profile(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NoteVaultError::InvalidProfileName);
        }
        if self.exists(name)? {
            return Err(NoteVaultError::ProfileExists(name.to_string()));
        }
        self.save_profile(name, &[])?;
        log::info!("Created profile '{}'", name);
        Ok(name.to_string())
    }

    /// Delete a profile; the active profile cannot be deleted
    pub fn delete_profile(&mut self, name: &str, active: &str) -> Result<()> {
        if name == active {
            return Err(NoteVaultError::ProfileActive(name.to_string()));
        }
        self.backend.delete(&Self::profile_key(name))?;
        log::info!("Deleted profile '{}'", name);
        Ok(())
    }

    pub fn last_active(&self) -> Result<Option<String>> {
        Ok(self.backend.get(LAST_PROFILE_KEY)?)
    }

    pub fn remember_active(&mut self, name: &str) -> Result<()> {
        self.backend.set(LAST_PROFILE_KEY, name)?;
        Ok(())
    }

    /// Pick the profile to open at start-up.
    ///
    /// Order: the remembered profile if it still exists, then the first
    /// stored profile, then a freshly created `Default`.
    pub fn resolve_initial_profile(&mut self) -> Result<String> {
        let names = self.list_profile_names()?;

        if let Some(last) = self.last_active()? {
            if names.contains(&last) {
                return Ok(last);
            }
        }

        if let Some(first) = names.into_iter().next() {
            return Ok(first);
        }

        self.save_profile(DEFAULT_PROFILE, &[])?;
        Ok(DEFAULT_PROFILE.to_string())
    }

    /// Move legacy single-array records into the `Default` profile.
    ///
    /// Returns how many notes were migrated. Migrated notes are appended
    /// after any notes the profile already holds; the legacy key is
    /// deleted once the profile has been written.
    pub fn migrate_legacy(&mut self) -> Result<usize> {
        let mut migrated = 0;

        for key in LEGACY_KEYS {
            let Some(raw) = self.backend.get(key)? else {
                continue;
            };

            log::info!("Legacy record '{}' found, migrating", key);
            let legacy = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => items,
                Ok(_) | Err(_) => {
                    log::warn!("Legacy record '{}' is not a note list, dropping it", key);
                    Vec::new()
                }
            };

            let mut notes = Vec::with_capacity(legacy.len());
            for item in legacy {
                match serde_json::from_value::<Note>(flatten_pages(item)) {
                    Ok(note) => notes.push(note),
                    Err(e) => log::warn!("Skipping unreadable legacy note: {}", e),
                }
            }

            let mut existing = self.load_profile(DEFAULT_PROFILE)?;
            migrated += notes.len();
            existing.extend(notes);
            self.save_profile(DEFAULT_PROFILE, &existing)?;
            self.backend.delete(key)?;
        }

        if migrated > 0 {
            log::info!("Migration complete: {} notes moved to '{}'", migrated, DEFAULT_PROFILE);
        }
        Ok(migrated)
    }
}

/// Collapse an old multi-page note into a single body and image list
fn flatten_pages(mut note: Value) -> Value {
    let Some(object) = note.as_object_mut() else {
        return note;
    };
    let Some(Value::Array(pages)) = object.remove("pages") else {
        return note;
    };

    let body = pages
        .iter()
        .map(|page| page.get("body").and_then(Value::as_str).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n\n");
    let images: Vec<Value> = pages
        .iter()
        .filter_map(|page| page.get("images").and_then(Value::as_array))
        .flatten()
        .cloned()
        .collect();

    object.insert("body".to_string(), Value::String(body));
    object.insert("images".to_string(), Value::Array(images));
    note
}
