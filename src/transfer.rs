/// JSON export and import of a profile's notes
///
/// The file format is the stored format: a pretty-printed JSON array of
/// notes with camelCase field names.
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{NoteVaultError, Result};
use crate::state::data::{new_image_id, new_note_id};
use crate::state::Note;

/// Write `notes` as a pretty-printed JSON array
pub fn export_notes(path: &Path, notes: &[Note]) -> Result<()> {
    let json = serde_json::to_string_pretty(notes)?;
    std::fs::write(path, json).map_err(|e| NoteVaultError::io(path, e))?;
    log::info!("Exported {} notes to {}", notes.len(), path.display());
    Ok(())
}

/// Read and validate an export file.
///
/// Nothing is replaced here; the caller asks for confirmation first.
pub fn import_notes(path: &Path) -> Result<Vec<Note>> {
    let raw = std::fs::read_to_string(path).map_err(|e| NoteVaultError::io(path, e))?;
    parse_notes(&raw)
}

/// Parse a note list, rejecting anything that is not a JSON array.
///
/// Note and image ids repeated within the file are replaced with fresh
/// ones, so every imported id is unique.
pub fn parse_notes(raw: &str) -> Result<Vec<Note>> {
    let mut notes: Vec<Note> = match serde_json::from_str::<Value>(raw)? {
        value @ Value::Array(_) => serde_json::from_value(value)?,
        _ => return Err(NoteVaultError::ImportNotList),
    };
    let renamed = reassign_duplicate_ids(&mut notes);
    if renamed > 0 {
        log::warn!("Import contained {} repeated ids, assigned new ones", renamed);
    }
    Ok(notes)
}

/// Give every repeated note or image id a new one; returns how many changed
fn reassign_duplicate_ids(notes: &mut [Note]) -> usize {
    let mut note_ids = HashSet::new();
    let mut image_ids = HashSet::new();
    let mut renamed = 0;
    for note in notes.iter_mut() {
        if !note_ids.insert(note.id.clone()) {
            note.id = new_note_id();
            note_ids.insert(note.id.clone());
            renamed += 1;
        }
        for image in note.images.iter_mut() {
            if !image_ids.insert(image.id.clone()) {
                image.id = new_image_id();
                image_ids.insert(image.id.clone());
                renamed += 1;
            }
        }
    }
    renamed
}

/// Default export file name for a profile
pub fn export_file_name(profile: &str) -> String {
    format!("{}.json", sanitize_file_stem(profile, "notes"))
}

/// Replace characters file systems reject; empty input becomes `fallback`
pub fn sanitize_file_stem(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}
