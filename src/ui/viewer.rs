/// Full-size image viewer with wheel zoom
use image::DynamicImage;
use std::sync::Arc;

use super::viewport::{render_patch, Patch};
use crate::crop::Size;

pub const MIN_VIEWER_ZOOM: f32 = 0.5;
pub const MAX_VIEWER_ZOOM: f32 = 5.0;
pub const VIEWER_ZOOM_STEP: f32 = 0.1;

/// Size of the viewer's image area
pub const VIEWER_VIEWPORT: (f32, f32) = (960.0, 640.0);

#[derive(Debug, Clone)]
pub struct ImageViewer {
    pub image_id: String,
    pub caption: String,
    source: Arc<DynamicImage>,
    viewport: Size,
    zoom: f32,
    patch: Option<Patch>,
}

impl ImageViewer {
    /// Open at zoom 1 (fit to the viewport)
    pub fn new(image_id: String, caption: String, source: Arc<DynamicImage>, viewport: Size) -> Self {
        let mut viewer = Self {
            image_id,
            caption,
            source,
            viewport,
            zoom: 1.0,
            patch: None,
        };
        viewer.refresh();
        viewer
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn patch(&self) -> Option<&Patch> {
        self.patch.as_ref()
    }

    /// One wheel notch: up zooms in
    pub fn wheel(&mut self, scroll_y: f32) {
        if scroll_y > 0.0 {
            self.set_zoom(self.zoom + VIEWER_ZOOM_STEP);
        } else if scroll_y < 0.0 {
            self.set_zoom(self.zoom - VIEWER_ZOOM_STEP);
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        // Round to the step so repeated steps do not drift
        let zoom = (zoom / VIEWER_ZOOM_STEP).round() * VIEWER_ZOOM_STEP;
        let zoom = zoom.clamp(MIN_VIEWER_ZOOM, MAX_VIEWER_ZOOM);
        if (zoom - self.zoom).abs() > f32::EPSILON {
            self.zoom = zoom;
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        self.patch = render_patch(&self.source, self.viewport, self.zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn viewer() -> ImageViewer {
        let source = Arc::new(DynamicImage::ImageRgb8(RgbImage::new(64, 32)));
        ImageViewer::new("img".into(), String::new(), source, Size::new(64.0, 64.0))
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut v = viewer();
        for _ in 0..100 {
            v.wheel(1.0);
        }
        assert!((v.zoom() - MAX_VIEWER_ZOOM).abs() < 1e-4);
        for _ in 0..100 {
            v.wheel(-3.0);
        }
        assert!((v.zoom() - MIN_VIEWER_ZOOM).abs() < 1e-4);
    }

    #[test]
    fn test_steps_do_not_drift() {
        let mut v = viewer();
        for _ in 0..7 {
            v.wheel(1.0);
        }
        for _ in 0..7 {
            v.wheel(-1.0);
        }
        assert!((v.zoom() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_patch_follows_zoom() {
        let mut v = viewer();
        assert_eq!(v.patch().unwrap().width, 64.0);
        v.set_zoom(0.5);
        assert_eq!(v.patch().unwrap().width, 32.0);
        assert_eq!(v.patch().unwrap().left, 16.0);
    }
}
