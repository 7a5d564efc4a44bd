/// Zoomable image viewport
///
/// Shared by the crop stage and the full-size viewer. The image is fitted
/// to the viewport, multiplied by the zoom and centered; only the part
/// that lands inside the viewport is resampled and handed to the image
/// widget, so zooming past 1 never needs a widget larger than the
/// viewport.
use iced::widget::{container, image as image_widget, Space};
use iced::{Element, Length, Padding};
use image::{imageops::FilterType, DynamicImage};
use std::sync::Arc;

use crate::crop::geometry::{displayed_rect, Rect, Size};
use crate::media::codec::decode_data_url_image;

/// Resampled visible part of the image and where it goes in the viewport
#[derive(Debug, Clone)]
pub struct Patch {
    pub handle: image_widget::Handle,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Source-pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Visible part of `image` (displayed rect) inside a viewport of size
/// `viewport`, and the source pixels that map onto it.
///
/// `None` when nothing is visible.
pub fn visible_region(image: Rect, viewport: Size, natural: (u32, u32)) -> Option<(Rect, PixelRect)> {
    let (natural_w, natural_h) = natural;
    if natural_w == 0 || natural_h == 0 || !(image.width > 0.0) || !(image.height > 0.0) {
        return None;
    }

    let left = image.left.max(0.0);
    let top = image.top.max(0.0);
    let right = image.right().min(viewport.width);
    let bottom = image.bottom().min(viewport.height);
    if right - left < 1.0 || bottom - top < 1.0 {
        return None;
    }

    let to_source_x = |display: f32| (display - image.left) * natural_w as f32 / image.width;
    let to_source_y = |display: f32| (display - image.top) * natural_h as f32 / image.height;
    let x = (to_source_x(left).floor() as u32).min(natural_w - 1);
    let y = (to_source_y(top).floor() as u32).min(natural_h - 1);
    let width = (to_source_x(right).ceil() as u32).min(natural_w).saturating_sub(x);
    let height = (to_source_y(bottom).ceil() as u32).min(natural_h).saturating_sub(y);

    let on_screen = Rect {
        left,
        top,
        width: right - left,
        height: bottom - top,
    };
    Some((
        on_screen,
        PixelRect {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        },
    ))
}

/// Resample the visible part of `source` for display
pub fn render_patch(source: &DynamicImage, viewport: Size, zoom: f32) -> Option<Patch> {
    let natural = (source.width(), source.height());
    let image = displayed_rect(
        viewport,
        Size::new(natural.0 as f32, natural.1 as f32),
        zoom,
    );
    let (on_screen, pixels) = visible_region(image, viewport, natural)?;

    let out_w = (on_screen.width.round() as u32).max(1);
    let out_h = (on_screen.height.round() as u32).max(1);
    let rgba = source
        .crop_imm(pixels.x, pixels.y, pixels.width, pixels.height)
        .resize_exact(out_w, out_h, FilterType::Triangle)
        .to_rgba8();

    Some(Patch {
        handle: image_widget::Handle::from_rgba(out_w, out_h, rgba.into_raw()),
        left: on_screen.left,
        top: on_screen.top,
        width: on_screen.width,
        height: on_screen.height,
    })
}

/// Decode a stored image off the UI thread
pub async fn decode_for_display(data_url: String) -> Result<Arc<DynamicImage>, String> {
    tokio::task::spawn_blocking(move || decode_data_url_image(&data_url).map(Arc::new).map_err(|e| e.user_message()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Place `patch` inside a viewport-sized, clipped container
pub fn patch_view<'a, Message: 'a>(patch: Option<&Patch>, viewport: Size) -> Element<'a, Message> {
    let content: Element<'a, Message> = match patch {
        Some(patch) => container(
            image_widget(patch.handle.clone())
                .width(Length::Fixed(patch.width))
                .height(Length::Fixed(patch.height))
                .content_fit(iced::ContentFit::Fill),
        )
        .padding(Padding {
            top: patch.top,
            left: patch.left,
            right: 0.0,
            bottom: 0.0,
        })
        .into(),
        None => Space::new(Length::Fill, Length::Fill).into(),
    };

    container(content)
        .width(Length::Fixed(viewport.width))
        .height(Length::Fixed(viewport.height))
        .clip(true)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_visible_region_at_fit() {
        let viewport = Size::new(800.0, 600.0);
        let image = displayed_rect(viewport, Size::new(2000.0, 1000.0), 1.0);
        let (on_screen, pixels) = visible_region(image, viewport, (2000, 1000)).unwrap();
        assert_eq!(on_screen, image);
        assert_eq!(
            pixels,
            PixelRect {
                x: 0,
                y: 0,
                width: 2000,
                height: 1000
            }
        );
    }

    #[test]
    fn test_visible_region_when_zoomed_in() {
        let viewport = Size::new(800.0, 600.0);
        // 1000x1000 at zoom 2: 1200x1200 shown, centered
        let image = displayed_rect(viewport, Size::new(1000.0, 1000.0), 2.0);
        let (on_screen, pixels) = visible_region(image, viewport, (1000, 1000)).unwrap();
        assert_eq!(on_screen.left, 0.0);
        assert_eq!(on_screen.width, 800.0);
        assert_eq!(on_screen.height, 600.0);
        // 200 display px cut on the left = 166.67 source px
        assert_eq!(pixels.x, 166);
        assert_eq!(pixels.y, 250);
        assert_eq!(pixels.width, 834 - 166);
        assert_eq!(pixels.height, 500);
    }

    #[test]
    fn test_visible_region_off_screen() {
        let image = Rect {
            left: 900.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };
        assert!(visible_region(image, Size::new(800.0, 600.0), (10, 10)).is_none());
        assert!(visible_region(image, Size::new(1200.0, 600.0), (0, 10)).is_none());
    }

    #[test]
    fn test_render_patch_matches_screen_size() {
        let source = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let patch = render_patch(&source, Size::new(200.0, 200.0), 1.0).unwrap();
        assert_eq!(patch.width, 200.0);
        assert_eq!(patch.height, 100.0);
        assert_eq!(patch.top, 50.0);
    }
}
