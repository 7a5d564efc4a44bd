/// Error types for NoteVault
///
/// Nothing here is fatal to the process: every variant degrades to a
/// user-visible notice plus a rollback of the mutation that was attempted.
use std::path::PathBuf;
use thiserror::Error;

/// Severity used by the UI to decide how loudly to show an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Informational, shown in the status line
    Info,
    /// Recoverable, shown in the notice banner
    Warning,
    /// Operation failed, shown in a notice that must be dismissed
    Error,
}

/// Faults raised by the key-value persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("storage quota exceeded ({size} bytes, limit {limit} bytes)")]
    QuotaExceeded { size: usize, limit: usize },

    #[error("storage error: {0}")]
    Unavailable(String),
}

/// Crate-wide error
#[derive(Error, Debug)]
pub enum NoteVaultError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid data URL: {0}")]
    DataUrl(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile '{0}' already exists")]
    ProfileExists(String),

    #[error("profile '{0}' is the active profile")]
    ProfileActive(String),

    #[error("profile '{0}' does not exist")]
    ProfileMissing(String),

    #[error("note '{0}' does not exist")]
    NoteMissing(String),

    #[error("invalid profile name")]
    InvalidProfileName,

    #[error("import file does not contain a list of notes")]
    ImportNotList,

    #[error("PDF export failed: {0}")]
    Pdf(String),
}

impl NoteVaultError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Store(_) => ErrorSeverity::Error,
            Self::Json(_) | Self::ImportNotList => ErrorSeverity::Error,
            Self::Image(_) | Self::DataUrl(_) => ErrorSeverity::Warning,
            Self::Io { .. } | Self::Pdf(_) => ErrorSeverity::Error,
            Self::ProfileExists(_)
            | Self::ProfileActive(_)
            | Self::ProfileMissing(_)
            | Self::NoteMissing(_)
            | Self::InvalidProfileName => ErrorSeverity::Info,
        }
    }

    /// Text shown to the user in the notice banner
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(StoreError::QuotaExceeded { .. }) => {
                "Could not save notes: the storage limit was exceeded.".to_string()
            }
            Self::Store(e) => format!("Could not save notes to the database. {}", e),
            Self::Json(e) => format!("The file is not valid JSON ({}).", e),
            Self::ImportNotList => "Import failed: the file must contain a list of notes.".to_string(),
            Self::Image(e) => format!("Could not process image: {}", e),
            Self::DataUrl(msg) => format!("Stored image is unreadable: {}", msg),
            Self::Io { path, source } => format!("Could not access {}: {}", path.display(), source),
            Self::Pdf(msg) => format!("Could not write PDF: {}", msg),
            Self::ProfileExists(name) => format!("A profile named \"{}\" already exists.", name),
            Self::ProfileActive(name) => {
                format!("\"{}\" is the active profile. Switch to another profile first.", name)
            }
            Self::ProfileMissing(name) => format!("Profile \"{}\" no longer exists.", name),
            Self::NoteMissing(_) => "The note was deleted in the meantime.".to_string(),
            Self::InvalidProfileName => "Profile names cannot be empty.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NoteVaultError>;

/// Log-and-discard for errors the user does not need to see
pub trait ResultExt<T> {
    fn log_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                let caller = std::panic::Location::caller();
                log::error!("{} ({}:{})", e, caller.file(), caller.line());
                None
            }
        }
    }
}
