//! Gradient voting for the pupil center.
//!
//! Every voting pixel `p` with unit gradient `g` adds `max(0, d·g)²` to every
//! candidate `c`, where `d` is the unit vector from `c` to `p`. Edge gradients
//! point from the dark iris to the bright sclera, so the true center collects
//! the most mass. The pass is quadratic in the number of pixels; the region
//! is shrunk to the fast width beforehand to keep that affordable.

use image::imageops;
use log::debug;

use crate::config::EyeDetectorConfig;
use crate::gradient::GradientField;
use crate::raster::{FloatMap, GrayImage};

/// OpenCV's sigma for a Gaussian of odd size `ksize` when none is given.
fn sigma_for_kernel_size(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Per-pixel vote weight that favours dark sources: `(255 − blur(I)) / divisor`, clamped to [0, 1].
pub fn inverse_intensity_weights(image: &GrayImage, blur_size: u32, divisor: f32) -> FloatMap {
    let blurred = if blur_size > 1 {
        GrayImage::from(imageops::blur(&image.to_luma(), sigma_for_kernel_size(blur_size)))
    } else {
        image.clone()
    };
    let mut weights = FloatMap::from_gray(&blurred);
    for v in weights.data.iter_mut() {
        *v = ((255.0 - *v) / divisor).clamp(0.0, 1.0);
    }
    weights
}

/// Sum the votes of all voting pixels into a fresh accumulator, normalized by the pixel count.
pub fn accumulate(field: &GradientField, weights: Option<&FloatMap>) -> FloatMap {
    let (w, h) = (field.width(), field.height());
    let mut acc = FloatMap::new(w, h);

    for py in 0..h {
        for px in 0..w {
            let i = field.gx.idx(px, py);
            if !field.votes[i] {
                continue;
            }
            let weight = weights.map_or(1.0, |m| m.data[i]);
            if weight <= 0.0 {
                continue;
            }
            let (gx, gy) = (field.gx.data[i], field.gy.data[i]);

            for cy in 0..h {
                let dy = py as f32 - cy as f32;
                let row = &mut acc.data[cy * w..(cy + 1) * w];
                for (cx, cell) in row.iter_mut().enumerate() {
                    if cx == px && cy == py {
                        continue;
                    }
                    let dx = px as f32 - cx as f32;
                    let dot = (dx * gx + dy * gy) / (dx * dx + dy * dy).sqrt();
                    if dot > 0.0 {
                        *cell += dot * dot * weight;
                    }
                }
            }
        }
    }

    let n = (w * h).max(1) as f32;
    for v in acc.data.iter_mut() {
        *v /= n;
    }
    acc
}

/// Mean over a `(2r+1)²` window, averaging only in-bounds cells.
pub fn box_blur(map: &FloatMap, radius: usize) -> FloatMap {
    if radius == 0 {
        return map.clone();
    }
    let mut out = FloatMap::new(map.width, map.height);
    for y in 0..map.height {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(map.height - 1);
        for x in 0..map.width {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(map.width - 1);
            let mut sum = 0.0;
            for yy in y0..=y1 {
                sum += map.row(yy)[x0..=x1].iter().sum::<f32>();
            }
            out.set(x, y, sum / ((y1 - y0 + 1) * (x1 - x0 + 1)) as f32);
        }
    }
    out
}

/// Accumulator and its argmax for one region.
#[derive(Debug, Clone)]
pub struct Votes {
    pub accumulator: FloatMap,
    pub best: (usize, usize),
}

/// Runs the voting pass with the configured weighting and smoothing.
#[derive(Debug, Clone, Copy)]
pub struct CenterVoter {
    pub enable_weight: bool,
    pub weight_divisor: f32,
    pub weight_blur_size: u32,
    pub blur_radius: u32,
}

impl CenterVoter {
    pub fn from_config(cfg: &EyeDetectorConfig) -> Self {
        Self {
            enable_weight: cfg.enable_weight,
            weight_divisor: cfg.weight_divisor,
            weight_blur_size: cfg.weight_blur_size,
            blur_radius: cfg.accumulator_blur_radius,
        }
    }

    /// Raw center estimate in scaled-region coordinates, `None` when no pixel votes.
    pub fn vote(&self, field: &GradientField, scaled: &GrayImage) -> Option<Votes> {
        let voters = field.voter_count();
        if voters == 0 {
            debug!("no gradient above threshold {:.3}", field.threshold);
            return None;
        }
        let weights = self
            .enable_weight
            .then(|| inverse_intensity_weights(scaled, self.weight_blur_size, self.weight_divisor));

        let accumulator = box_blur(
            &accumulate(field, weights.as_ref()),
            self.blur_radius as usize,
        );
        let (x, y, value) = accumulator.max_loc()?;
        debug!("{voters} voters, raw center ({x}, {y}) score {value:.4}");
        Some(Votes {
            accumulator,
            best: (x, y),
        })
    }
}

impl Default for CenterVoter {
    fn default() -> Self {
        Self::from_config(&EyeDetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ImageAccess;

    fn dark_disk(w: u32, h: u32, cx: f32, cy: f32, r: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r * r {
                30
            } else {
                220
            }
        })
    }

    #[test]
    fn votes_peak_at_disk_center() {
        let img = dark_disk(30, 30, 15.0, 15.0, 6.0);
        let field = GradientField::compute(&img, 50.0);
        let votes = CenterVoter::default().vote(&field, &img).unwrap();
        assert_eq!(votes.best, (15, 15));
        assert!(votes.accumulator.data.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn weighted_and_blurred_votes_still_find_center() {
        let img = dark_disk(30, 24, 12.0, 11.0, 5.0);
        let field = GradientField::compute(&img, 50.0);
        let voter = CenterVoter {
            enable_weight: true,
            blur_radius: 1,
            ..CenterVoter::default()
        };
        let votes = voter.vote(&field, &img).unwrap();
        let (x, y) = votes.best;
        assert!((x as i32 - 12).abs() <= 1 && (y as i32 - 11).abs() <= 1);
    }

    #[test]
    fn uniform_region_has_no_estimate() {
        let img = GrayImage::from_fn(20, 20, |_, _| 200);
        let field = GradientField::compute(&img, 50.0);
        assert!(CenterVoter::default().vote(&field, &img).is_none());
    }

    #[test]
    fn inverse_intensity_weight_is_clamped() {
        let img = GrayImage::from_fn(4, 1, |x, _| [0u8, 105, 180, 255][x as usize]);
        let w = inverse_intensity_weights(&img, 1, 150.0);
        assert_eq!(w.data[0], 1.0);
        assert!((w.data[1] - 1.0).abs() < 1e-6);
        assert!((w.data[2] - 0.5).abs() < 1e-6);
        assert_eq!(w.data[3], 0.0);
        assert_eq!(img.width(), w.width as u32);
    }

    #[test]
    fn box_blur_spreads_a_spike() {
        let mut map = FloatMap::new(5, 5);
        map.set(2, 2, 9.0);
        let blurred = box_blur(&map, 1);
        assert!((blurred.get(2, 2) - 1.0).abs() < 1e-6);
        assert!((blurred.get(1, 3) - 1.0).abs() < 1e-6);
        assert_eq!(blurred.get(0, 0), 0.0);
        // Corner window holds 4 cells
        let mut corner = FloatMap::new(3, 3);
        corner.set(0, 0, 4.0);
        assert!((box_blur(&corner, 1).get(0, 0) - 1.0).abs() < 1e-6);
        assert_eq!(box_blur(&map, 0), map);
    }

    #[test]
    fn single_voter_only_feeds_candidates_behind_its_gradient() {
        let mut field = GradientField::compute(&GrayImage::from_fn(5, 1, |_, _| 0), 50.0);
        // Voter at x = 4 with gradient pointing +x
        let i = field.gx.idx(4, 0);
        field.votes[i] = true;
        field.gx.data[i] = 1.0;
        let acc = accumulate(&field, None);
        // Candidates at x < 4 get dot = 1, normalized by 5 pixels
        for x in 0..4 {
            assert!((acc.get(x, 0) - 0.2).abs() < 1e-6);
        }
        assert_eq!(acc.get(4, 0), 0.0);
    }
}
