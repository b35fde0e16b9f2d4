use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(SignatureId);

impl fmt::Display for SignatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two image slots of the workbench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Original,
    Test,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::Original, Lane::Test];

    /// Multipart field name used by the stage service.
    pub fn field_name(self) -> &'static str {
        match self {
            Lane::Original => "fileOriginal",
            Lane::Test => "fileTest",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Lane::Original => "Original signature",
            Lane::Test => "Test signature",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Original => f.write_str("original"),
            Lane::Test => f.write_str("test"),
        }
    }
}

/// A value held once per lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanePair<T> {
    pub original: T,
    pub test: T,
}

impl<T> LanePair<T> {
    pub fn new(original: T, test: T) -> Self {
        Self { original, test }
    }

    pub fn from_fn(mut f: impl FnMut(Lane) -> T) -> Self {
        Self {
            original: f(Lane::Original),
            test: f(Lane::Test),
        }
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(Lane) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            original: f(Lane::Original)?,
            test: f(Lane::Test)?,
        })
    }

    pub fn get(&self, lane: Lane) -> &T {
        match lane {
            Lane::Original => &self.original,
            Lane::Test => &self.test,
        }
    }

    pub fn get_mut(&mut self, lane: Lane) -> &mut T {
        match lane {
            Lane::Original => &mut self.original,
            Lane::Test => &mut self.test,
        }
    }

    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(Lane, T) -> Result<U, E>,
    ) -> Result<LanePair<U>, E> {
        Ok(LanePair {
            original: f(Lane::Original, self.original)?,
            test: f(Lane::Test, self.test)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> {
        [(Lane::Original, &self.original), (Lane::Test, &self.test)].into_iter()
    }
}

/// A point in canvas pixel space, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in canvas pixel space. Corner order is whatever the producer
/// supplied; call [`PixelRect::ordered`] before measuring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub y1: f64,
    pub x1: f64,
    pub y2: f64,
    pub x2: f64,
}

impl PixelRect {
    pub fn from_corners(a: PixelPoint, b: PixelPoint) -> Self {
        Self {
            y1: a.y,
            x1: a.x,
            y2: b.y,
            x2: b.x,
        }
    }

    pub fn ordered(self) -> Self {
        Self {
            y1: self.y1.min(self.y2),
            x1: self.x1.min(self.x2),
            y2: self.y1.max(self.y2),
            x2: self.x1.max(self.x2),
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }
}

/// Rectangle expressed as fractions of the image height (`y*`) and width (`x*`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub y1: f64,
    pub x1: f64,
    pub y2: f64,
    pub x2: f64,
}

impl NormalizedRect {
    pub const FULL: NormalizedRect = NormalizedRect {
        y1: 0.0,
        x1: 0.0,
        y2: 1.0,
        x2: 1.0,
    };

    pub fn new(y1: f64, x1: f64, y2: f64, x2: f64) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Builds a rect from the detector's `[y1, x1, y2, x2]` layout.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [y1, x1, y2, x2] => Some(Self::new(*y1, *x1, *y2, *x2)),
            _ => None,
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }

    pub fn ordered(self) -> Self {
        Self {
            y1: self.y1.min(self.y2),
            x1: self.x1.min(self.x2),
            y2: self.y1.max(self.y2),
            x2: self.x1.max(self.x2),
        }
    }

    /// Pulls every coordinate into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            y1: self.y1.clamp(0.0, 1.0),
            x1: self.x1.clamp(0.0, 1.0),
            y2: self.y2.clamp(0.0, 1.0),
            x2: self.x2.clamp(0.0, 1.0),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.y1 <= self.y2 && self.x1 <= self.x2
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub id: SignatureId,
    pub name: String,
}
