//! Click-and-drag rectangle selection, one independent state machine per lane.

use shared::domain::{Lane, LanePair, NormalizedRect, PixelPoint, PixelRect};

use crate::{
    geometry::{clamp_to_canvas, normalize, to_pixel, CanvasBounds, PointerButton, PointerEvent},
    lane::LaneState,
};

/// An active drag. Exists only between press and release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionSession {
    pub lane: Lane,
    pub anchor: PixelPoint,
    pub current: PixelPoint,
}

impl SelectionSession {
    /// Raw anchor-to-current rectangle; not ordered.
    pub fn pixel_rect(&self) -> PixelRect {
        PixelRect::from_corners(self.anchor, self.current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerRelease {
    Up(PointerEvent),
    /// The pointer left the canvas mid-drag.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionUpdate {
    Ignored,
    /// Drag in progress; draw this rectangle instead of the committed one.
    Live(PixelRect),
    Committed(NormalizedRect),
}

#[derive(Debug, Default)]
pub struct SelectionController {
    sessions: LanePair<Option<SelectionSession>>,
}

fn image_size(state: &LaneState) -> Option<(f64, f64)> {
    state
        .current_image()
        .map(|image| (f64::from(image.width()), f64::from(image.height())))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
}

impl SelectionController {
    pub fn is_dragging(&self, lane: Lane) -> bool {
        self.sessions.get(lane).is_some()
    }


    /// Primary press: anchor the drag and commit a zero-size rect right away.
    pub fn begin(
        &mut self,
        lane: Lane,
        event: PointerEvent,
        bounds: CanvasBounds,
        state: &mut LaneState,
    ) -> SelectionUpdate {
        if event.button != PointerButton::Primary {
            return SelectionUpdate::Ignored;
        }
        let Some((w, h)) = image_size(state) else {
            tracing::debug!(%lane, "ignoring selection on a lane without an image");
            return SelectionUpdate::Ignored;
        };

        let anchor = clamp_to_canvas(to_pixel(event, bounds), w, h);
        let session = SelectionSession {
            lane,
            anchor,
            current: anchor,
        };
        *self.sessions.get_mut(lane) = Some(session);

        state.set_detections(Vec::new());
        state.set_selection(Some(normalize(session.pixel_rect(), w, h)));
        SelectionUpdate::Live(session.pixel_rect())
    }

    pub fn update(
        &mut self,
        lane: Lane,
        event: PointerEvent,
        bounds: CanvasBounds,
        state: &LaneState,
    ) -> SelectionUpdate {
        let Some(session) = self.sessions.get_mut(lane).as_mut() else {
            return SelectionUpdate::Ignored;
        };
        let Some((w, h)) = image_size(state) else {
            return SelectionUpdate::Ignored;
        };
        session.current = clamp_to_canvas(to_pixel(event, bounds), w, h);
        SelectionUpdate::Live(session.pixel_rect())
    }

    /// Ends the drag and stores the ordered, normalized rectangle on the lane.
    pub fn end(
        &mut self,
        lane: Lane,
        release: PointerRelease,
        bounds: CanvasBounds,
        state: &mut LaneState,
    ) -> SelectionUpdate {
        if let PointerRelease::Up(event) = release {
            if event.button != PointerButton::Primary {
                return SelectionUpdate::Ignored;
            }
        }
        let Some(mut session) = self.sessions.get_mut(lane).take() else {
            return SelectionUpdate::Ignored;
        };
        let Some((w, h)) = image_size(state) else {
            return SelectionUpdate::Ignored;
        };

        if let PointerRelease::Up(event) = release {
            session.current = to_pixel(event, bounds);
        }
        session.current = clamp_to_canvas(session.current, w, h);
        session.anchor = clamp_to_canvas(session.anchor, w, h);

        let rect = normalize(session.pixel_rect().ordered(), w, h);
        state.set_selection(Some(rect));
        tracing::debug!(%lane, ?rect, "committed selection");
        SelectionUpdate::Committed(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob::BlobRegistry,
        geometry::denormalize,
        lane::{test_support::png_bytes, SourceImage},
    };

    const W: u32 = 200;
    const H: u32 = 100;

    fn bounds() -> CanvasBounds {
        CanvasBounds::unscaled(50.0, 20.0, f64::from(W), f64::from(H))
    }

    fn loaded_lane(registry: &BlobRegistry) -> LaneState {
        let mut lane = LaneState::default();
        lane.set_source(
            SourceImage::decode("sig.png", png_bytes(W, H, [255; 4]), registry).expect("decode"),
        );
        lane
    }

    fn drag(
        controller: &mut SelectionController,
        lane: &mut LaneState,
        from: (f64, f64),
        to: (f64, f64),
    ) -> SelectionUpdate {
        let b = bounds();
        controller.begin(Lane::Original, PointerEvent::primary(from.0, from.1), b, lane);
        controller.update(Lane::Original, PointerEvent::primary(to.0, to.1), b, lane);
        controller.end(
            Lane::Original,
            PointerRelease::Up(PointerEvent::primary(to.0, to.1)),
            b,
            lane,
        )
    }

    #[test]
    fn press_commits_zero_size_rect_immediately() {
        let registry = BlobRegistry::new();
        let mut lane = loaded_lane(&registry);
        let mut controller = SelectionController::default();

        let update = controller.begin(
            Lane::Original,
            PointerEvent::primary(150.0, 70.0),
            bounds(),
            &mut lane,
        );

        assert!(matches!(update, SelectionUpdate::Live(_)));
        assert!(controller.is_dragging(Lane::Original));
        assert_eq!(lane.selection(), Some(NormalizedRect::new(0.5, 0.5, 0.5, 0.5)));
    }

    #[test]
    fn drag_in_every_direction_commits_ordered_rect() {
        let registry = BlobRegistry::new();
        let cases = [
            ((60.0, 30.0), (160.0, 90.0)),
            ((160.0, 90.0), (60.0, 30.0)),
            ((160.0, 30.0), (60.0, 90.0)),
            ((60.0, 90.0), (160.0, 30.0)),
        ];
        for (from, to) in cases {
            let mut lane = loaded_lane(&registry);
            let mut controller = SelectionController::default();
            let SelectionUpdate::Committed(rect) = drag(&mut controller, &mut lane, from, to)
            else {
                panic!("drag from {from:?} to {to:?} did not commit");
            };
            assert!(rect.is_ordered());
            let pixels = denormalize(rect, f64::from(W), f64::from(H));
            assert!((pixels.width() - (to.0 - from.0).abs()).abs() < 1e-9);
            assert!((pixels.height() - (to.1 - from.1).abs()).abs() < 1e-9);
            assert!((pixels.x1 - 10.0).abs() < 1e-9);
            assert!((pixels.y1 - 10.0).abs() < 1e-9);
            assert!(!controller.is_dragging(Lane::Original));
        }
    }

    #[test]
    fn pointer_leave_forces_commit_of_last_rect() {
        let registry = BlobRegistry::new();
        let mut lane = loaded_lane(&registry);
        let mut controller = SelectionController::default();
        let b = bounds();
        controller.begin(Lane::Original, PointerEvent::primary(150.0, 70.0), b, &mut lane);
        controller.update(Lane::Original, PointerEvent::primary(70.0, 30.0), b, &lane);

        let update = controller.end(Lane::Original, PointerRelease::Leave, b, &mut lane);

        assert_eq!(
            update,
            SelectionUpdate::Committed(NormalizedRect::new(0.1, 0.1, 0.5, 0.5))
        );
        assert!(!controller.is_dragging(Lane::Original));
    }

    #[test]
    fn drag_outside_canvas_is_clamped() {
        let registry = BlobRegistry::new();
        let mut lane = loaded_lane(&registry);
        let mut controller = SelectionController::default();
        let SelectionUpdate::Committed(rect) =
            drag(&mut controller, &mut lane, (150.0, 70.0), (900.0, -40.0))
        else {
            panic!("expected commit");
        };
        assert_eq!(rect, NormalizedRect::new(0.0, 0.5, 0.5, 1.0));
    }

    #[test]
    fn secondary_button_and_moves_without_press_are_ignored() {
        let registry = BlobRegistry::new();
        let mut lane = loaded_lane(&registry);
        let mut controller = SelectionController::default();
        let b = bounds();
        let secondary = PointerEvent {
            x: 100.0,
            y: 50.0,
            button: PointerButton::Secondary,
        };

        assert_eq!(
            controller.begin(Lane::Original, secondary, b, &mut lane),
            SelectionUpdate::Ignored
        );
        assert_eq!(
            controller.update(Lane::Original, PointerEvent::primary(90.0, 40.0), b, &lane),
            SelectionUpdate::Ignored
        );
        assert_eq!(
            controller.end(Lane::Original, PointerRelease::Leave, b, &mut lane),
            SelectionUpdate::Ignored
        );
        assert!(lane.selection().is_none());
    }

    #[test]
    fn selection_requires_a_loaded_image() {
        let mut lane = LaneState::default();
        let mut controller = SelectionController::default();
        let update = controller.begin(
            Lane::Test,
            PointerEvent::primary(60.0, 30.0),
            bounds(),
            &mut lane,
        );
        assert_eq!(update, SelectionUpdate::Ignored);
        assert!(!controller.is_dragging(Lane::Test));
    }

    #[test]
    fn lanes_drag_independently() {
        let registry = BlobRegistry::new();
        let mut original = loaded_lane(&registry);
        let mut test = loaded_lane(&registry);
        let mut controller = SelectionController::default();
        let b = bounds();

        controller.begin(Lane::Original, PointerEvent::primary(60.0, 30.0), b, &mut original);
        controller.begin(Lane::Test, PointerEvent::primary(100.0, 40.0), b, &mut test);
        controller.end(
            Lane::Test,
            PointerRelease::Up(PointerEvent::primary(150.0, 70.0)),
            b,
            &mut test,
        );

        assert!(controller.is_dragging(Lane::Original));
        assert!(!controller.is_dragging(Lane::Test));
        assert_eq!(
            original.selection(),
            Some(NormalizedRect::new(0.1, 0.05, 0.1, 0.05))
        );
        assert_eq!(
            test.selection(),
            Some(NormalizedRect::new(0.2, 0.25, 0.5, 0.5))
        );
    }
}
