//! Eye-corner localization by template correlation.
//!
//! Two 4×6 templates (one the mirror of the other) are correlated with the
//! central half of a search region; the integer maximum is refined with a
//! separable parabola fit over its 3×3 neighbourhood.

use std::sync::OnceLock;

use log::debug;

use crate::raster::{FloatMap, GrayImage, ImageAccess};
use crate::types::{CornerSide, EyeCorners, EyeSide, Point, Rect};

/// Template for a corner on the right-hand side of an eye opening.
const EYE_CORNER_KERNEL: [[f32; 6]; 4] = [
    [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0, -1.0, 0.0, 3.0],
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
];

/// Template anchor (column, row), the cell aligned with the output pixel.
const KERNEL_ANCHOR: (usize, usize) = (3, 2);

/// The pair of corner templates.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerKernels {
    /// Responds to corners left of the pupil.
    pub left: FloatMap,
    /// Responds to corners right of the pupil.
    pub right: FloatMap,
}

impl CornerKernels {
    pub fn new() -> Self {
        let mut right = FloatMap::new(6, 4);
        for (y, row) in EYE_CORNER_KERNEL.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                right.set(x, y, v);
            }
        }
        let mut left = FloatMap::new(6, 4);
        for y in 0..4 {
            for x in 0..6 {
                left.set(5 - x, y, right.get(x, y));
            }
        }
        Self { left, right }
    }
}

impl Default for CornerKernels {
    fn default() -> Self {
        Self::new()
    }
}

fn reflect_101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        i = if i < 0 { -i } else { 2 * n - 2 - i };
    }
    i as usize
}

/// Correlation response over the central half of `region`.
///
/// Returns the map and the region coordinates of its top-left cell, or `None`
/// when the region is too small to have a central half.
pub fn corner_map(region: &GrayImage, kernel: &FloatMap) -> Option<(FloatMap, (usize, usize))> {
    let (w, h) = (region.width() as usize, region.height() as usize);
    let (x0, x1) = (w / 4, w * 3 / 4);
    let (y0, y1) = (h / 4, h * 3 / 4);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let (ax, ay) = KERNEL_ANCHOR;
    let mut map = FloatMap::new(x1 - x0, y1 - y0);
    for y in 0..map.height {
        for x in 0..map.width {
            let mut sum = 0.0;
            for ky in 0..kernel.height {
                let sy = reflect_101((y0 + y + ky) as i64 - ay as i64, h);
                for kx in 0..kernel.width {
                    let sx = reflect_101((x0 + x + kx) as i64 - ax as i64, w);
                    sum += kernel.get(kx, ky) * region.at(sx as u32, sy as u32) as f32;
                }
            }
            map.set(x, y, sum);
        }
    }
    Some((map, (x0, y0)))
}

/// Vertex offset of the parabola through three equally spaced samples.
fn parabola_offset(prev: f32, cur: f32, next: f32) -> f32 {
    let denom = prev - 2.0 * cur + next;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
}

/// Sub-pixel position of the maximum at (`x`, `y`). Border maxima are not refined.
pub fn subpixel_peak(map: &FloatMap, x: usize, y: usize) -> (f32, f32) {
    let mut px = x as f32;
    let mut py = y as f32;
    if x > 0 && x + 1 < map.width {
        px += parabola_offset(map.get(x - 1, y), map.get(x, y), map.get(x + 1, y));
    }
    if y > 0 && y + 1 < map.height {
        py += parabola_offset(map.get(x, y - 1), map.get(x, y), map.get(x, y + 1));
    }
    (px, py)
}

/// Owns the corner templates, built on first use and shared by every call.
#[derive(Debug, Default)]
pub struct CornerRefiner {
    kernels: OnceLock<CornerKernels>,
}

impl CornerRefiner {
    pub fn new() -> Self {
        Self {
            kernels: OnceLock::new(),
        }
    }

    pub fn kernels(&self) -> &CornerKernels {
        self.kernels.get_or_init(|| {
            debug!("building eye corner kernels");
            CornerKernels::new()
        })
    }

    pub fn is_built(&self) -> bool {
        self.kernels.get().is_some()
    }

    /// Sub-pixel corner location in `region` coordinates.
    pub fn find_corner(&self, region: &GrayImage, side: EyeSide, corner: CornerSide) -> Option<Point> {
        let kernels = self.kernels();
        let kernel = if corner_is_right_of_pupil(side, corner) {
            &kernels.right
        } else {
            &kernels.left
        };
        let (map, (ox, oy)) = corner_map(region, kernel)?;
        let (x, y, _) = map.max_loc()?;
        let (sx, sy) = subpixel_peak(&map, x, y);
        Some(Point::new(sx + ox as f32, sy + oy as f32))
    }

    /// Both corners of an eye in image coordinates.
    ///
    /// Each corner is searched in the vertical middle half of `roi`, between
    /// the pupil and the matching side of the region.
    pub fn refine_eye(
        &self,
        image: &GrayImage,
        roi: &Rect,
        pupil: Point,
        side: EyeSide,
    ) -> Option<EyeCorners> {
        let band_y = roi.y + (roi.height / 4) as i32;
        let band_h = roi.height / 2;
        let pupil_x = (pupil.x.round() as i32).clamp(roi.x, roi.x + roi.width as i32);
        let right_band = Rect::new(
            pupil_x,
            band_y,
            (roi.x + roi.width as i32 - pupil_x) as u32,
            band_h,
        );
        let left_band = Rect::new(roi.x, band_y, (pupil_x - roi.x) as u32, band_h);

        let locate = |corner: CornerSide| {
            let band = if corner_is_right_of_pupil(side, corner) {
                right_band
            } else {
                left_band
            };
            let band = band.clip_to(image.width(), image.height());
            if band.is_empty() {
                return None;
            }
            self.find_corner(&image.crop(&band), side, corner)
                .map(|p| p + band.top_left())
        };

        let inner = locate(CornerSide::Inner)?;
        let outer = locate(CornerSide::Outer)?;
        Some(EyeCorners { inner, outer })
    }
}

/// The inner corner of the left eye faces the nose, which is to its right in the image.
fn corner_is_right_of_pupil(side: EyeSide, corner: CornerSide) -> bool {
    matches!(
        (side, corner),
        (EyeSide::Left, CornerSide::Inner) | (EyeSide::Right, CornerSide::Outer)
    )
}
