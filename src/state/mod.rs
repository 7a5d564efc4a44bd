/// State management module
///
/// This module handles all application state, including:
/// - Key-value persistence, SQLite and in-memory (library.rs)
/// - Shared data structures (data.rs)
/// - Profiles and legacy migration on top of the store (profiles.rs)
/// - The active profile's notes and selection (notebook.rs)
/// - Debounced text autosave (autosave.rs)
/// - Persist-or-rollback orchestration (workspace.rs)
pub mod autosave;
pub mod data;
pub mod library;
pub mod notebook;
pub mod profiles;
pub mod workspace;

pub use data::{Image, LastCrop, Note, NoteEdit};
pub use library::{KeyValueStore, Library};
pub use workspace::{AddImagesOutcome, CropSource, Workspace};
