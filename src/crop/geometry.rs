/// Crop geometry
///
/// All display coordinates are in stage space: (0, 0) is the top-left
/// of the crop stage viewport. The image is uniformly scaled to fit the
/// stage, multiplied by the zoom factor and centered, so at zoom > 1 the
/// displayed rectangle can extend past the stage edges.
use crate::state::data::LastCrop;

/// Smallest crop box side in display pixels
pub const MIN_CROP_SIZE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in display space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }

    /// Shorter side
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Square selection in display space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl CropBox {
    pub fn right(&self) -> f32 {
        self.x + self.size
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.size
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Square region of the source image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// On-screen rectangle of the image after fit-to-stage scaling and zoom.
///
/// Not cached anywhere: callers recompute it after every zoom change.
pub fn displayed_rect(stage: Size, natural: Size, zoom: f32) -> Rect {
    // An undecoded image (0x0) is treated as 1x1 so nothing divides by zero
    let natural_w = if natural.width > 0.0 { natural.width } else { 1.0 };
    let natural_h = if natural.height > 0.0 { natural.height } else { 1.0 };

    let fit = (stage.width / natural_w).min(stage.height / natural_h) * zoom;
    let width = natural_w * fit;
    let height = natural_h * fit;

    Rect {
        left: (stage.width - width) / 2.0,
        top: (stage.height - height) / 2.0,
        width,
        height,
    }
}

/// Clamp a requested box so it is square, at least `MIN_CROP_SIZE`
/// (unless the image itself is smaller) and fully inside `image`.
pub fn position_crop_box(image: Rect, x: f32, y: f32, size: f32) -> CropBox {
    let max_size = image.min_side().max(0.0);
    let min_size = MIN_CROP_SIZE.min(max_size);
    let size = if size.is_finite() { size } else { max_size };
    let size = size.min(max_size).max(min_size);

    let x = if x.is_finite() { x } else { image.left };
    let y = if y.is_finite() { y } else { image.top };

    CropBox {
        x: x.min(image.right() - size).max(image.left),
        y: y.min(image.bottom() - size).max(image.top),
        size,
    }
}

/// Box centered in the image covering `fraction` of its shorter side
pub fn centered_box(image: Rect, fraction: f32) -> CropBox {
    let size = image.min_side() * fraction;
    position_crop_box(
        image,
        image.left + (image.width - size) / 2.0,
        image.top + (image.height - size) / 2.0,
        size,
    )
}

/// Express a box relative to the displayed image.
///
/// `None` when the displayed rectangle has no area.
pub fn normalize(crop: CropBox, image: Rect) -> Option<LastCrop> {
    if !(image.width > 0.0) || !(image.height > 0.0) {
        return None;
    }
    Some(LastCrop {
        rel_x: (crop.x - image.left) / image.width,
        rel_y: (crop.y - image.top) / image.height,
        rel_size: crop.size / image.width,
    })
}

/// Map a normalized crop back into display space (clamped)
pub fn denormalize(crop: LastCrop, image: Rect) -> CropBox {
    position_crop_box(
        image,
        image.left + crop.rel_x * image.width,
        image.top + crop.rel_y * image.height,
        crop.rel_size * image.width,
    )
}

/// Source-pixel square for a normalized crop of a `natural`-sized image.
///
/// The origin is clamped to `[0, dim - 1]`; the side is limited to the
/// shorter natural dimension and to what remains past the origin.
pub fn source_region(crop: LastCrop, natural_width: u32, natural_height: u32) -> Option<SourceRegion> {
    if natural_width == 0 || natural_height == 0 {
        return None;
    }
    let nat_w = natural_width as f32;
    let nat_h = natural_height as f32;

    let sx = (crop.rel_x * nat_w).min(nat_w - 1.0).max(0.0);
    let sy = (crop.rel_y * nat_h).min(nat_h - 1.0).max(0.0);
    let side = (crop.rel_size * nat_w).min(nat_w).min(nat_h);

    let x = sx.round() as u32;
    let y = sy.round() as u32;
    let size = (side.round() as u32)
        .min(natural_width - x)
        .min(natural_height - y)
        .max(1);

    Some(SourceRegion { x, y, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    fn stage() -> Size {
        Size::new(800.0, 600.0)
    }

    #[test]
    fn test_displayed_rect_letterboxes_wide_image() {
        // 2000x1000 into 800x600: width-limited, fit = 0.4
        let rect = displayed_rect(stage(), Size::new(2000.0, 1000.0), 1.0);
        assert!(approx(rect.width, 800.0));
        assert!(approx(rect.height, 400.0));
        assert!(approx(rect.left, 0.0));
        assert!(approx(rect.top, 100.0));
    }

    #[test]
    fn test_displayed_rect_zoom_stays_centered() {
        let rect = displayed_rect(stage(), Size::new(1000.0, 1000.0), 2.0);
        assert!(approx(rect.width, 1200.0));
        assert!(approx(rect.left, -200.0));
        assert!(approx(rect.top, -300.0));
        assert!(approx(rect.left + rect.width / 2.0, 400.0));
    }

    #[test]
    fn test_displayed_rect_zero_natural_size() {
        let rect = displayed_rect(stage(), Size::new(0.0, 0.0), 1.0);
        assert!(rect.width.is_finite() && rect.height.is_finite());
    }

    #[test]
    fn test_position_clamps_inside_image() {
        let image = Rect {
            left: 100.0,
            top: 50.0,
            width: 400.0,
            height: 300.0,
        };
        let b = position_crop_box(image, -1000.0, 1000.0, 120.0);
        assert_eq!(b, CropBox { x: 100.0, y: 230.0, size: 120.0 });

        // Too big: limited to the shorter side
        let b = position_crop_box(image, 150.0, 60.0, 10_000.0);
        assert!(approx(b.size, 300.0));
        assert!(approx(b.y, 50.0));
        assert!(b.right() <= image.right() + EPS);

        // Too small: floor applies
        let b = position_crop_box(image, 150.0, 60.0, 3.0);
        assert!(approx(b.size, MIN_CROP_SIZE));
    }

    #[test]
    fn test_position_handles_image_smaller_than_floor() {
        let image = Rect {
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 8.0,
        };
        let b = position_crop_box(image, 5.0, 5.0, 50.0);
        assert!(approx(b.size, 8.0));
        assert!(approx(b.x, 2.0));
        assert!(approx(b.y, 0.0));
    }

    #[test]
    fn test_centered_box_is_sixty_percent() {
        let image = displayed_rect(stage(), Size::new(2000.0, 1000.0), 1.0);
        let b = centered_box(image, 0.6);
        assert!(approx(b.size, 240.0));
        assert!(approx(b.x, 280.0));
        assert!(approx(b.y, 180.0));
    }

    #[test]
    fn test_normalize_round_trip() {
        let image = displayed_rect(stage(), Size::new(1600.0, 1200.0), 1.0);
        let b = position_crop_box(image, 130.0, 77.0, 211.0);
        let rel = normalize(b, image).unwrap();
        let back = denormalize(rel, image);
        assert!(approx(back.x, b.x));
        assert!(approx(back.y, b.y));
        assert!(approx(back.size, b.size));
    }

    #[test]
    fn test_normalize_rejects_empty_rect() {
        let b = CropBox { x: 0.0, y: 0.0, size: 20.0 };
        let empty = Rect {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 100.0,
        };
        assert!(normalize(b, empty).is_none());
    }

    #[test]
    fn test_source_region_maps_and_clamps() {
        let crop = LastCrop {
            rel_x: 0.25,
            rel_y: 0.5,
            rel_size: 0.25,
        };
        let region = source_region(crop, 2000, 1000).unwrap();
        assert_eq!(region, SourceRegion { x: 500, y: 500, size: 500 });

        // Side never exceeds the shorter natural dimension
        let crop = LastCrop {
            rel_x: 0.0,
            rel_y: 0.0,
            rel_size: 1.0,
        };
        assert_eq!(source_region(crop, 2000, 1000).unwrap().size, 1000);

        // Origin past the edge is clamped and the side trimmed to fit
        let crop = LastCrop {
            rel_x: 1.5,
            rel_y: -0.2,
            rel_size: 0.1,
        };
        let region = source_region(crop, 100, 100).unwrap();
        assert_eq!(region.x, 99);
        assert_eq!(region.y, 0);
        assert_eq!(region.size, 1);

        assert!(source_region(crop, 0, 10).is_none());
    }
}
