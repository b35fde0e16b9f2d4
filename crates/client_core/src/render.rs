//! Raster canvas for one lane: the current image plus outlined overlays.

use image::{Rgba, RgbaImage};
use shared::domain::PixelRect;

use crate::{geometry::denormalize, lane::LaneState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    pub width: u32,
}

pub const SELECTION_STROKE: StrokeStyle = StrokeStyle {
    color: Rgba([255, 0, 0, 255]),
    width: 2,
};

pub const DETECTION_STROKE: StrokeStyle = StrokeStyle {
    color: Rgba([255, 0, 0, 255]),
    width: 5,
};

#[derive(Debug, Clone)]
pub struct LaneCanvas {
    pixels: RgbaImage,
    revision: u64,
}

impl Default for LaneCanvas {
    fn default() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            revision: 0,
        }
    }
}

impl LaneCanvas {
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Bumped on every render so shells know when to re-upload.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Redraws from scratch. The canvas always takes the natural size of the
    /// lane's current image so normalized coordinates map one-to-one.
    pub fn render(&mut self, state: &LaneState, live: Option<PixelRect>) {
        self.revision += 1;
        let Some(image) = state.current_image() else {
            self.pixels = RgbaImage::new(0, 0);
            return;
        };
        self.pixels = image.pixels().clone();

        let (w, h) = (f64::from(image.width()), f64::from(image.height()));
        for rect in state.detections() {
            stroke_rect(&mut self.pixels, denormalize(*rect, w, h), DETECTION_STROKE);
        }
        let outline = live.or_else(|| state.selection().map(|rect| denormalize(rect, w, h)));
        if let Some(rect) = outline {
            stroke_rect(&mut self.pixels, rect, SELECTION_STROKE);
        }
    }
}

/// Strokes the outline of `rect`, the line centred on the rectangle's edges.
pub fn stroke_rect(canvas: &mut RgbaImage, rect: PixelRect, style: StrokeStyle) {
    let rect = rect.ordered();
    let t = i64::from(style.width.max(1));
    let a = t / 2;
    // Coordinates past the canvas edge are pinned just outside it so the
    // integer math below stays in range. NaN lands on 0.
    let pad = f64::from(style.width.max(1));
    let (w, h) = (f64::from(canvas.width()), f64::from(canvas.height()));
    let px = |v: f64, limit: f64| v.round().clamp(-pad, limit + pad) as i64;
    let (x1, y1) = (px(rect.x1, w) - a, px(rect.y1, h) - a);
    let (x2, y2) = (px(rect.x2, w) - a, px(rect.y2, h) - a);

    fill(canvas, x1, y1, x2 + t, y1 + t, style.color);
    fill(canvas, x1, y2, x2 + t, y2 + t, style.color);
    fill(canvas, x1, y1, x1 + t, y2 + t, style.color);
    fill(canvas, x2, y1, x2 + t, y2 + t, style.color);
}

fn fill(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let (w, h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::NormalizedRect;

    use super::*;
    use crate::{
        blob::BlobRegistry,
        lane::{test_support::png_bytes, SourceImage},
    };

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn lane_with_image(registry: &BlobRegistry, w: u32, h: u32) -> LaneState {
        let mut lane = LaneState::default();
        lane.set_source(
            SourceImage::decode("sig.png", png_bytes(w, h, [255; 4]), registry).expect("decode"),
        );
        lane
    }

    #[test]
    fn canvas_tracks_image_dimensions() {
        let registry = BlobRegistry::new();
        let mut lane = lane_with_image(&registry, 64, 24);
        let mut canvas = LaneCanvas::default();
        canvas.render(&lane, None);
        assert_eq!((canvas.width(), canvas.height()), (64, 24));

        lane.set_processed(
            SourceImage::decode("aligned.png", png_bytes(32, 48, [0; 4]), &registry)
                .expect("decode"),
        );
        canvas.render(&lane, None);
        assert_eq!((canvas.width(), canvas.height()), (32, 48));
    }

    #[test]
    fn committed_selection_is_outlined_at_denormalized_position() {
        let registry = BlobRegistry::new();
        let mut lane = lane_with_image(&registry, 20, 20);
        lane.set_selection(Some(NormalizedRect::new(0.25, 0.25, 0.75, 0.75)));
        let mut canvas = LaneCanvas::default();
        canvas.render(&lane, None);

        let pixels = canvas.pixels();
        assert_eq!(*pixels.get_pixel(5, 5), RED);
        assert_eq!(*pixels.get_pixel(5, 10), RED);
        assert_eq!(*pixels.get_pixel(15, 10), RED);
        assert_eq!(*pixels.get_pixel(10, 10), WHITE);
        assert_eq!(*pixels.get_pixel(1, 1), WHITE);
    }

    #[test]
    fn live_rect_replaces_committed_selection() {
        let registry = BlobRegistry::new();
        let mut lane = lane_with_image(&registry, 20, 20);
        lane.set_selection(Some(NormalizedRect::new(0.0, 0.0, 0.1, 0.1)));
        let mut canvas = LaneCanvas::default();
        let live = PixelRect {
            y1: 18.0,
            x1: 18.0,
            y2: 10.0,
            x2: 10.0,
        };
        canvas.render(&lane, Some(live));

        let pixels = canvas.pixels();
        assert_eq!(*pixels.get_pixel(10, 14), RED);
        assert_eq!(*pixels.get_pixel(18, 14), RED);
        assert_eq!(*pixels.get_pixel(1, 1), WHITE);
    }

    #[test]
    fn oversized_detection_is_drawn_up_to_the_canvas_edge() {
        let registry = BlobRegistry::new();
        let mut lane = lane_with_image(&registry, 20, 20);
        lane.set_detections(vec![NormalizedRect::new(0.1, 0.1, 1e300, 0.5)]);
        let mut canvas = LaneCanvas::default();
        canvas.render(&lane, None);

        let pixels = canvas.pixels();
        assert_eq!(*pixels.get_pixel(1, 15), RED);
        assert_eq!(*pixels.get_pixel(10, 19), RED);
        assert_eq!(*pixels.get_pixel(15, 15), WHITE);
    }

    #[test]
    fn non_finite_pixel_rect_does_not_panic() {
        let mut canvas = RgbaImage::from_pixel(8, 8, WHITE);
        let rect = PixelRect {
            y1: f64::NEG_INFINITY,
            x1: f64::NAN,
            y2: f64::INFINITY,
            x2: f64::MAX,
        };
        stroke_rect(&mut canvas, rect, DETECTION_STROKE);
        assert_eq!(*canvas.get_pixel(0, 4), RED);
    }

    #[test]
    fn render_is_idempotent() {
        let registry = BlobRegistry::new();
        let mut lane = lane_with_image(&registry, 16, 16);
        lane.set_detections(vec![NormalizedRect::new(0.2, 0.2, 0.6, 0.6)]);
        let mut canvas = LaneCanvas::default();
        canvas.render(&lane, None);
        let first = canvas.pixels().clone();
        canvas.render(&lane, None);
        assert_eq!(first.as_raw(), canvas.pixels().as_raw());
        assert_eq!(canvas.revision(), 2);
    }

    #[test]
    fn empty_lane_renders_empty_canvas() {
        let mut canvas = LaneCanvas::default();
        canvas.render(&LaneState::default(), None);
        assert_eq!((canvas.width(), canvas.height()), (0, 0));
    }
}
