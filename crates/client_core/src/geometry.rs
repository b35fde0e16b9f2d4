//! Conversions between viewport pointer coordinates, canvas pixels and
//! image-relative normalized coordinates.

use shared::domain::{NormalizedRect, PixelPoint, PixelRect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// A pointer sample in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
    pub button: PointerButton,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            button: PointerButton::Primary,
        }
    }
}

/// Where a canvas sits in the viewport and how large it is drawn.
///
/// `display_*` is the on-screen size, `pixel_*` the canvas buffer size. They are
/// equal unless the shell scales the canvas down to fit its panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBounds {
    pub left: f64,
    pub top: f64,
    pub display_width: f64,
    pub display_height: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl CanvasBounds {
    pub fn unscaled(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            display_width: width,
            display_height: height,
            pixel_width: width,
            pixel_height: height,
        }
    }

    fn scale(&self) -> (f64, f64) {
        let sx = if self.display_width > 0.0 {
            self.pixel_width / self.display_width
        } else {
            1.0
        };
        let sy = if self.display_height > 0.0 {
            self.pixel_height / self.display_height
        } else {
            1.0
        };
        (sx, sy)
    }
}

pub fn to_pixel(pointer: PointerEvent, bounds: CanvasBounds) -> PixelPoint {
    let (sx, sy) = bounds.scale();
    PixelPoint::new((pointer.x - bounds.left) * sx, (pointer.y - bounds.top) * sy)
}

/// Divides each coordinate by the matching image dimension. A zero dimension
/// yields non-finite output; callers must only normalize against a loaded image.
pub fn normalize(rect: PixelRect, width: f64, height: f64) -> NormalizedRect {
    NormalizedRect {
        y1: rect.y1 / height,
        x1: rect.x1 / width,
        y2: rect.y2 / height,
        x2: rect.x2 / width,
    }
}

pub fn denormalize(rect: NormalizedRect, width: f64, height: f64) -> PixelRect {
    PixelRect {
        y1: rect.y1 * height,
        x1: rect.x1 * width,
        y2: rect.y2 * height,
        x2: rect.x2 * width,
    }
}

pub fn clamp_to_canvas(point: PixelPoint, width: f64, height: f64) -> PixelPoint {
    PixelPoint::new(point.x.clamp(0.0, width), point.y.clamp(0.0, height))
}
