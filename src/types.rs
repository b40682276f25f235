use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// A face bounding box in image pixels, as reported by an upstream face detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a point from normalized coordinates [0,1] to image coordinates
    /// within this bounding box.
    pub fn denormalize_point(&self, p: Point) -> Point {
        Point::new(self.x + p.x * self.width, self.y + p.y * self.height)
    }
}

/// Axis-aligned integer rectangle. Used for eye search regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Round a floating-point box to whole pixels. Negative extents become zero.
    pub fn from_bounding_box(b: &BoundingBox) -> Self {
        Self {
            x: b.x.round() as i32,
            y: b.y.round() as i32,
            width: b.width.max(0.0).round() as u32,
            height: b.height.max(0.0).round() as u32,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersection of two rectangles; an empty rectangle when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = (self.x as i64).max(other.x as i64);
        let y0 = (self.y as i64).max(other.y as i64);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return Rect::default();
        }
        Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    /// Clip to the bounds of a `width` × `height` image.
    pub fn clip_to(&self, width: u32, height: u32) -> Rect {
        self.intersect(&Rect::new(0, 0, width, height))
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x as f32, self.y as f32)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x as f32
            && p.y >= self.y as f32
            && p.x < self.right() as f32
            && p.y < self.bottom() as f32
    }
}

/// Which eye, as seen in the image: `Left` is the eye on the left half of the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    pub const BOTH: [EyeSide; 2] = [EyeSide::Left, EyeSide::Right];
}

/// Which corner of an eye: the one nearer the nose, or the one nearer the temple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerSide {
    Inner,
    Outer,
}

/// Sub-pixel eye corners in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeCorners {
    pub inner: Point,
    pub outer: Point,
}

/// Result for one eye. `center` is only meaningful when `valid` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmark {
    pub center: Point,
    pub valid: bool,
    /// Search region that produced the estimate, in image coordinates.
    pub search_region: Option<Rect>,
    /// Present only when corner refinement is enabled and succeeded.
    pub corners: Option<EyeCorners>,
}

impl EyeLandmark {
    pub const fn invalid() -> Self {
        Self {
            center: Point::zero(),
            valid: false,
            search_region: None,
            corners: None,
        }
    }
}

impl Default for EyeLandmark {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Pupil positions for both eyes; each side is flagged independently.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandMarks {
    pub left: EyeLandmark,
    pub right: EyeLandmark,
}

impl LandMarks {
    pub fn get(&self, side: EyeSide) -> &EyeLandmark {
        match side {
            EyeSide::Left => &self.left,
            EyeSide::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: EyeSide) -> &mut EyeLandmark {
        match side {
            EyeSide::Left => &mut self.left,
            EyeSide::Right => &mut self.right,
        }
    }

    pub fn valid_count(&self) -> usize {
        [self.left.valid, self.right.valid]
            .iter()
            .filter(|v| **v)
            .count()
    }

    /// Distance between the pupils, when both were found.
    pub fn interpupillary_distance(&self) -> Option<f32> {
        (self.left.valid && self.right.valid).then(|| self.left.center.distance(&self.right.center))
    }
}

/// Outcome of one detection call.
///
/// `success` follows the detector's minimum-eyes policy; callers that care
/// about a single eye should inspect the per-side flags in `landmarks`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub success: bool,
    pub landmarks: LandMarks,
}
