/// User interface
///
/// - Crop stage overlay and pointer handling (cropper.rs)
/// - Thumbnail handle cache (handles.rs)
/// - Layout of the main window and dialogs (panels.rs)
/// - Full-size image viewer (viewer.rs)
/// - Zoomed image patches shared by the cropper and viewer (viewport.rs)

pub mod cropper;
pub mod handles;
pub mod panels;
pub mod viewer;
pub mod viewport;
