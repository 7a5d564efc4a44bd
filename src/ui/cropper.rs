use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size as IcedSize, Theme};

use crate::crop::{CropSession, Corner};
use crate::Message;

/// Pointer input on the crop stage, in stage coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropEvent {
    Pressed(Point),
    Moved(Point),
    Released,
    /// Positive `y` means scrolling down
    Wheel(f32),
}

/// Overlay drawn over the image patch: dimmed surroundings, the crop box
/// with thirds guides, and the four corner handles.
pub struct CropStage<'a> {
    pub session: &'a CropSession,
}

impl<'a> Program<Message> for CropStage<'a> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let crop = self.session.crop_box();
        let (w, h) = (bounds.width, bounds.height);
        let shade = Color::from_rgba(0.0, 0.0, 0.0, 0.55);

        // Four strips around the box
        frame.fill_rectangle(Point::ORIGIN, IcedSize::new(w, crop.y.max(0.0)), shade);
        frame.fill_rectangle(
            Point::new(0.0, crop.bottom()),
            IcedSize::new(w, (h - crop.bottom()).max(0.0)),
            shade,
        );
        frame.fill_rectangle(
            Point::new(0.0, crop.y),
            IcedSize::new(crop.x.max(0.0), crop.size),
            shade,
        );
        frame.fill_rectangle(
            Point::new(crop.right(), crop.y),
            IcedSize::new((w - crop.right()).max(0.0), crop.size),
            shade,
        );

        let outline = Path::rectangle(Point::new(crop.x, crop.y), IcedSize::new(crop.size, crop.size));
        frame.stroke(
            &outline,
            Stroke::default().with_color(Color::WHITE).with_width(2.0),
        );

        let guides = Path::new(|builder| {
            for third in [1.0 / 3.0, 2.0 / 3.0] {
                let offset = crop.size * third;
                builder.move_to(Point::new(crop.x + offset, crop.y));
                builder.line_to(Point::new(crop.x + offset, crop.bottom()));
                builder.move_to(Point::new(crop.x, crop.y + offset));
                builder.line_to(Point::new(crop.right(), crop.y + offset));
            }
        });
        frame.stroke(
            &guides,
            Stroke::default()
                .with_color(Color::from_rgba(1.0, 1.0, 1.0, 0.4))
                .with_width(1.0),
        );

        for corner in Corner::ALL {
            let (cx, cy) = corner.point(&crop);
            let handle = Path::rectangle(Point::new(cx - 5.0, cy - 5.0), IcedSize::new(10.0, 10.0));
            frame.fill(&handle, Color::WHITE);
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        _state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        // Positions are taken relative to the stage even outside it, so a
        // drag keeps tracking when the pointer leaves the canvas
        let local = cursor
            .position()
            .map(|p| Point::new(p.x - bounds.x, p.y - bounds.y));

        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::Crop(CropEvent::Pressed(pos))),
                    );
                }
            }
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if self.session.is_interacting() {
                    if let Some(pos) = local {
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::Crop(CropEvent::Moved(pos))),
                        );
                    }
                }
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
            | canvas::Event::Mouse(mouse::Event::CursorLeft) => {
                if self.session.is_interacting() {
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::Crop(CropEvent::Released)),
                    );
                }
            }
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                let wheel = cursor
                    .position_in(bounds)
                    .and_then(|pos| wheel_event(self.session, pos, delta));
                if let Some(event) = wheel {
                    return (canvas::event::Status::Captured, Some(Message::Crop(event)));
                }
            }
            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if self.session.is_interacting() {
            return mouse::Interaction::Grabbing;
        }
        let Some(pos) = cursor.position_in(bounds) else {
            return mouse::Interaction::Idle;
        };
        if self.session.handle_at(pos.x, pos.y).is_some() {
            mouse::Interaction::Crosshair
        } else if self.session.crop_box().contains(pos.x, pos.y) {
            mouse::Interaction::Grab
        } else if self.session.image_rect().contains(pos.x, pos.y) {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::Idle
        }
    }
}

/// Wheel input resizes the box only while the pointer is over it
pub fn wheel_event(session: &CropSession, pos: Point, delta: mouse::ScrollDelta) -> Option<CropEvent> {
    if !session.crop_box().contains(pos.x, pos.y) {
        return None;
    }
    let y = match delta {
        mouse::ScrollDelta::Lines { y, .. } => y,
        mouse::ScrollDelta::Pixels { y, .. } => y,
    };
    // iced reports scrolling up as positive
    Some(CropEvent::Wheel(-y))
}

/// Apply a pointer event to the session
pub fn apply_event(session: &mut CropSession, event: CropEvent) {
    match event {
        CropEvent::Pressed(pos) => session.pointer_down(pos.x, pos.y),
        CropEvent::Moved(pos) => session.pointer_moved(pos.x, pos.y),
        CropEvent::Released => session.pointer_up(),
        CropEvent::Wheel(y) => session.wheel(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::Size;

    fn session() -> CropSession {
        CropSession::open("n", "i", Size::new(800.0, 600.0), (1000, 1000), None).unwrap()
    }

    #[test]
    fn test_drag_through_events() {
        let mut s = session();
        let start = s.crop_box();
        let grab = Point::new(start.x + 40.0, start.y + 40.0);

        apply_event(&mut s, CropEvent::Pressed(grab));
        assert!(s.is_interacting());
        apply_event(&mut s, CropEvent::Moved(Point::new(grab.x + 30.0, grab.y - 20.0)));
        apply_event(&mut s, CropEvent::Released);

        let moved = s.crop_box();
        assert!(!s.is_interacting());
        assert!((moved.x - (start.x + 30.0)).abs() < 1e-3);
        assert!((moved.y - (start.y - 20.0)).abs() < 1e-3);
        assert!((moved.size - start.size).abs() < 1e-3);
    }

    #[test]
    fn test_wheel_down_shrinks() {
        let mut s = session();
        let before = s.crop_box().size;
        apply_event(&mut s, CropEvent::Wheel(1.0));
        assert!(s.crop_box().size < before);
        apply_event(&mut s, CropEvent::Wheel(-1.0));
        apply_event(&mut s, CropEvent::Wheel(-1.0));
        assert!(s.crop_box().size > before);
    }

    #[test]
    fn test_wheel_outside_box_is_ignored() {
        let mut s = session();
        let crop = s.crop_box();
        let down = mouse::ScrollDelta::Lines { x: 0.0, y: -1.0 };

        let outside = Point::new(crop.x - 5.0, crop.y - 5.0);
        assert_eq!(wheel_event(&s, outside, down), None);
        assert!((s.crop_box().size - crop.size).abs() < 1e-3);

        let inside = Point::new(crop.x + crop.size / 2.0, crop.y + crop.size / 2.0);
        let event = wheel_event(&s, inside, down).unwrap();
        assert_eq!(event, CropEvent::Wheel(1.0));
        apply_event(&mut s, event);
        assert!(s.crop_box().size < crop.size);
    }
}
