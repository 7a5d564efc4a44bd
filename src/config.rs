/// Application configuration
///
/// Read once at start-up from `<config_dir>/notevault/config.json`.
/// Every field has a default so a partial file is fine; a missing or
/// malformed file falls back to the defaults.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::media::CompressOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // ========== Persistence ==========
    /// Delay before a text edit is written to the database
    pub autosave_delay_ms: u64,

    /// Largest single record the store accepts (bytes)
    pub max_record_bytes: usize,

    /// Override for the database location
    pub database_path: Option<PathBuf>,

    // ========== Cropper ==========
    /// Size of the crop stage viewport in logical pixels
    pub stage_width: f32,
    pub stage_height: f32,

    /// Side of the square image produced by a crop
    pub crop_output_size: u32,

    /// JPEG quality of crop output (1-100)
    pub crop_quality: u8,

    // ========== Image ingestion ==========
    /// Images are scaled down to fit this square bounding box
    pub max_image_dimension: u32,

    /// JPEG quality used at ingestion (1-100)
    pub image_quality: u8,

    /// Bounding box used when the first save of a batch fails
    pub fallback_image_dimension: u32,

    /// JPEG quality used when the first save of a batch fails
    pub fallback_image_quality: u8,

    /// Files above this size need explicit confirmation
    pub oversize_warning_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 1000,
            max_record_bytes: 256 * 1024 * 1024,
            database_path: None,
            stage_width: 720.0,
            stage_height: 520.0,
            crop_output_size: 1024,
            crop_quality: 92,
            max_image_dimension: 3000,
            image_quality: 88,
            fallback_image_dimension: 1800,
            fallback_image_quality: 80,
            oversize_warning_bytes: 50 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load the configuration from the user's config directory
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("Could not determine config directory, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Error reading config {}, using defaults: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<AppConfig>(&raw) {
            Ok(config) => config.sanitized(),
            Err(e) => {
                log::warn!("Error parsing config {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notevault").join("config.json"))
    }

    /// Where the note database lives
    ///
    /// - Linux: ~/.local/share/notevault/notevault.db
    /// - macOS: ~/Library/Application Support/notevault/notevault.db
    /// - Windows: %APPDATA%\notevault\notevault.db
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("notevault");
        path.push("notevault.db");
        path
    }

    /// Compression used for freshly added images
    pub fn ingest_options(&self) -> CompressOptions {
        CompressOptions {
            max_width: self.max_image_dimension,
            max_height: self.max_image_dimension,
            quality: self.image_quality,
        }
    }

    /// Compression used for the one retry after a failed save
    pub fn fallback_options(&self) -> CompressOptions {
        CompressOptions {
            max_width: self.fallback_image_dimension,
            max_height: self.fallback_image_dimension,
            quality: self.fallback_image_quality,
        }
    }

    pub fn autosave_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autosave_delay_ms)
    }

    /// Clamp values a hand-edited file could get wrong
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.image_quality = self.image_quality.clamp(1, 100);
        self.fallback_image_quality = self.fallback_image_quality.clamp(1, 100);
        self.crop_quality = self.crop_quality.clamp(1, 100);
        if self.max_image_dimension == 0 {
            self.max_image_dimension = defaults.max_image_dimension;
        }
        if self.fallback_image_dimension == 0 {
            self.fallback_image_dimension = defaults.fallback_image_dimension;
        }
        if self.crop_output_size == 0 {
            self.crop_output_size = defaults.crop_output_size;
        }
        if !(self.stage_width > 0.0) || !(self.stage_height > 0.0) {
            self.stage_width = defaults.stage_width;
            self.stage_height = defaults.stage_height;
        }
        self
    }
}
