/// Image handles for thumbnails, keyed by image id
///
/// Decoding a data URL is not free, so handles are built once per
/// encoding and reused across frames. `sync` is called after every
/// mutation; entries whose encoding changed are rebuilt and entries for
/// images that no longer exist are dropped.
use iced::widget::image::Handle;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::media::codec::decode_data_url;
use crate::state::Note;

#[derive(Debug, Default)]
pub struct HandleCache {
    entries: HashMap<String, (u64, Handle)>,
}

fn fingerprint(data_url: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    data_url.hash(&mut hasher);
    hasher.finish()
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, image_id: &str) -> Option<&Handle> {
        self.entries.get(image_id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Bring the cache in line with the images of `notes`
    pub fn sync(&mut self, notes: &[Note]) {
        let mut live = HashMap::with_capacity(self.entries.len());
        for image in notes.iter().flat_map(|note| note.images.iter()) {
            let print = fingerprint(&image.data_url);
            let entry = match self.entries.remove(&image.id) {
                Some((old, handle)) if old == print => Some((old, handle)),
                _ => match decode_data_url(&image.data_url) {
                    Ok((_, bytes)) => Some((print, Handle::from_bytes(bytes))),
                    Err(e) => {
                        log::warn!("Image {} cannot be shown: {}", image.id, e);
                        None
                    }
                },
            };
            if let Some(entry) = entry {
                live.insert(image.id.clone(), entry);
            }
        }
        self.entries = live;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Image;

    fn note_with(urls: &[&str]) -> Note {
        let mut note = Note::new(0);
        note.images = urls.iter().map(|u| Image::new(u.to_string())).collect();
        note
    }

    #[test]
    fn test_sync_tracks_live_images() {
        let mut cache = HandleCache::new();
        let mut note = note_with(&["data:image/png;base64,AAAA", "data:image/png;base64,AQID"]);
        cache.sync(std::slice::from_ref(&note));
        assert_eq!(cache.len(), 2);

        let removed = note.images.remove(0);
        cache.sync(std::slice::from_ref(&note));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&removed.id).is_none());
        assert!(cache.get(&note.images[0].id).is_some());
    }

    #[test]
    fn test_unreadable_url_is_skipped() {
        let mut cache = HandleCache::new();
        cache.sync(&[note_with(&["not a data url"])]);
        assert_eq!(cache.len(), 0);
    }
}
