/// Square image cropping
///
/// - `geometry.rs` - displayed-image rectangle, clamping, coordinate mapping
/// - `session.rs` - move/resize/zoom state machine for an open cropper

pub mod geometry;
pub mod session;

pub use geometry::{CropBox, Rect, Size, SourceRegion};
pub use session::{CropKey, CropPlan, CropSession, Corner};
