/// Crop interaction state machine
///
/// Lives only while the crop modal is open. Tracks the zoom factor, the
/// crop box in display coordinates and the current pointer gesture.
/// Every update goes through `position_crop_box`, so the box is always
/// square, at least `MIN_CROP_SIZE` and inside the displayed image.
use super::geometry::{
    centered_box, denormalize, displayed_rect, normalize, position_crop_box, source_region, CropBox,
    Rect, Size, SourceRegion, MIN_CROP_SIZE,
};
use crate::state::data::LastCrop;

pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;

/// Share of the shorter displayed side covered by a fresh box
const INITIAL_FRACTION: f32 = 0.6;
/// Distance from a corner that still grabs its handle
pub const HANDLE_RADIUS: f32 = 10.0;
/// Growth per wheel notch or +/- key
const RESIZE_FACTOR: f32 = 0.08;
const NUDGE_STEP: f32 = 2.0;
const NUDGE_STEP_LARGE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::NorthWest,
        Corner::NorthEast,
        Corner::SouthWest,
        Corner::SouthEast,
    ];

    /// Position of this corner on a box
    pub fn point(self, crop: &CropBox) -> (f32, f32) {
        match self {
            Corner::NorthWest => (crop.x, crop.y),
            Corner::NorthEast => (crop.right(), crop.y),
            Corner::SouthWest => (crop.x, crop.bottom()),
            Corner::SouthEast => (crop.right(), crop.bottom()),
        }
    }

    pub fn opposite(self) -> Corner {
        match self {
            Corner::NorthWest => Corner::SouthEast,
            Corner::NorthEast => Corner::SouthWest,
            Corner::SouthWest => Corner::NorthEast,
            Corner::SouthEast => Corner::NorthWest,
        }
    }
}

/// Discrete keyboard adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropKey {
    Left,
    Right,
    Up,
    Down,
    Grow,
    Shrink,
}

/// Pointer gesture in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Idle,
    /// Moving the box; `grab` is the pointer offset from its top-left
    Dragging { grab_x: f32, grab_y: f32 },
    /// Resizing from `corner`; the opposite corner stays put
    Resizing { corner: Corner, anchor_x: f32, anchor_y: f32 },
}

/// What an apply should do: where to sample and what to remember
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
    pub crop: LastCrop,
    pub region: SourceRegion,
}

#[derive(Debug, Clone)]
pub struct CropSession {
    note_id: String,
    image_id: String,
    stage: Size,
    natural_width: u32,
    natural_height: u32,
    zoom: f32,
    crop: CropBox,
    interaction: Interaction,
}

impl CropSession {
    /// Open the cropper on an image.
    ///
    /// Returns `None` while the natural size is unknown. The box is
    /// restored from `last_crop` when present, otherwise centered.
    pub fn open(
        note_id: impl Into<String>,
        image_id: impl Into<String>,
        stage: Size,
        natural: (u32, u32),
        last_crop: Option<LastCrop>,
    ) -> Option<Self> {
        let (natural_width, natural_height) = natural;
        if natural_width == 0 || natural_height == 0 {
            return None;
        }

        let mut session = Self {
            note_id: note_id.into(),
            image_id: image_id.into(),
            stage,
            natural_width,
            natural_height,
            zoom: 1.0,
            crop: CropBox { x: 0.0, y: 0.0, size: 0.0 },
            interaction: Interaction::Idle,
        };

        let image = session.image_rect();
        session.crop = match last_crop {
            Some(last) => denormalize(last, image),
            None => centered_box(image, INITIAL_FRACTION),
        };
        Some(session)
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn stage(&self) -> Size {
        self.stage
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn crop_box(&self) -> CropBox {
        self.crop
    }

    pub fn is_interacting(&self) -> bool {
        self.interaction != Interaction::Idle
    }

    /// Displayed-image rectangle at the current zoom
    pub fn image_rect(&self) -> Rect {
        displayed_rect(
            self.stage,
            Size::new(self.natural_width as f32, self.natural_height as f32),
            self.zoom,
        )
    }

    /// Move/resize the box, clamped to the image
    pub fn position(&mut self, x: f32, y: f32, size: f32) {
        self.crop = position_crop_box(self.image_rect(), x, y, size);
    }

    // ========== Pointer ==========

    /// Which corner handle (if any) sits under a point
    ///
    /// On a box smaller than two handles, the handles shrink inside it so
    /// its middle still moves the box.
    pub fn handle_at(&self, x: f32, y: f32) -> Option<Corner> {
        let radius = if self.crop.size < 2.0 * HANDLE_RADIUS && self.crop.contains(x, y) {
            self.crop.size / 4.0
        } else {
            HANDLE_RADIUS
        };
        Corner::ALL.into_iter().find(|corner| {
            let (cx, cy) = corner.point(&self.crop);
            (cx - x).abs() <= radius && (cy - y).abs() <= radius
        })
    }

    /// Pointer pressed: corner handle starts a resize, box body starts a
    /// move, anywhere else on the image centers the box there.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if let Some(corner) = self.handle_at(x, y) {
            let (anchor_x, anchor_y) = corner.opposite().point(&self.crop);
            self.interaction = Interaction::Resizing {
                corner,
                anchor_x,
                anchor_y,
            };
        } else if self.crop.contains(x, y) {
            self.interaction = Interaction::Dragging {
                grab_x: x - self.crop.x,
                grab_y: y - self.crop.y,
            };
        } else if self.image_rect().contains(x, y) {
            let size = self.crop.size;
            self.position(x - size / 2.0, y - size / 2.0, size);
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        match self.interaction {
            Interaction::Idle => {}
            Interaction::Dragging { grab_x, grab_y } => {
                let size = self.crop.size;
                self.position(x - grab_x, y - grab_y, size);
            }
            Interaction::Resizing {
                corner,
                anchor_x,
                anchor_y,
            } => self.resize_from_anchor(corner, anchor_x, anchor_y, x, y),
        }
    }

    /// Release always ends the gesture
    pub fn pointer_up(&mut self) {
        self.interaction = Interaction::Idle;
    }

    fn resize_from_anchor(&mut self, corner: Corner, anchor_x: f32, anchor_y: f32, x: f32, y: f32) {
        let image = self.image_rect();
        let px = x.min(image.right()).max(image.left);
        let py = y.min(image.bottom()).max(image.top);
        let size = (px - anchor_x).abs().max((py - anchor_y).abs());
        let size = size.min(image.min_side()).max(MIN_CROP_SIZE);

        let (left, top) = match corner {
            Corner::NorthWest => (anchor_x - size, anchor_y - size),
            Corner::NorthEast => (anchor_x, anchor_y - size),
            Corner::SouthWest => (anchor_x - size, anchor_y),
            Corner::SouthEast => (anchor_x, anchor_y),
        };
        self.position(left, top, size);
    }

    // ========== Discrete controls ==========

    /// Wheel over the box: scrolling down (positive) shrinks it
    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let factor = 1.0 - RESIZE_FACTOR * delta_y.signum();
        let crop = self.crop;
        self.position(crop.x, crop.y, crop.size * factor);
    }

    pub fn key(&mut self, key: CropKey, large_step: bool) {
        let step = if large_step { NUDGE_STEP_LARGE } else { NUDGE_STEP };
        let CropBox { x, y, size } = self.crop;
        match key {
            CropKey::Left => self.position(x - step, y, size),
            CropKey::Right => self.position(x + step, y, size),
            CropKey::Up => self.position(x, y - step, size),
            CropKey::Down => self.position(x, y + step, size),
            CropKey::Grow => self.position(x, y, size * (1.0 + RESIZE_FACTOR)),
            CropKey::Shrink => self.position(x, y, size * (1.0 - RESIZE_FACTOR)),
        }
    }

    /// Center the box in the image, keeping its size
    pub fn center(&mut self) {
        let image = self.image_rect();
        let size = self.crop.size;
        self.position(
            image.left + (image.width - size) / 2.0,
            image.top + (image.height - size) / 2.0,
            size,
        );
    }

    /// Slider range for the box size at the current zoom
    pub fn size_range(&self) -> (f32, f32) {
        let max = self.image_rect().min_side();
        let min = (max * 0.08).min(80.0).max(40.0).min(max);
        (min.floor(), max.floor())
    }

    /// Set the box side, keeping its top-left where possible
    pub fn set_size(&mut self, size: f32) {
        let crop = self.crop;
        self.position(crop.x, crop.y, size);
    }

    /// Change zoom; the box keeps its place on the image
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = zoom.max(MIN_ZOOM).min(MAX_ZOOM);
        let relative = normalize(self.crop, self.image_rect());
        self.zoom = zoom;
        let image = self.image_rect();
        self.crop = match relative {
            Some(rel) => denormalize(rel, image),
            None => centered_box(image, INITIAL_FRACTION),
        };
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.set_zoom(self.zoom + delta);
    }

    // ========== Apply ==========

    /// Normalized crop and source region for the current box.
    ///
    /// `None` when the displayed rectangle is degenerate; apply is then
    /// a no-op.
    pub fn plan(&self) -> Option<CropPlan> {
        let crop = normalize(self.crop, self.image_rect())?;
        let region = source_region(crop, self.natural_width, self.natural_height)?;
        Some(CropPlan { crop, region })
    }
}
