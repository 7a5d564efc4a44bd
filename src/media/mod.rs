/// Image handling
///
/// This module handles:
/// - Data URL encoding/decoding and JPEG re-encoding (codec.rs)
/// - Concurrent ingestion of picked files and smaller re-encodes (ingest.rs)
/// - Rendering crops onto the fixed output canvas (render.rs)

pub mod codec;
pub mod ingest;
pub mod render;

pub use codec::{natural_size, CompressOptions};
pub use ingest::{ingest_files, plan_intake, shrink_images, IngestReport, Intake};
pub use render::render_crop_async;
