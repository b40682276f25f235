//! Specular halo removal.
//!
//! A bright reflection on the cornea is surrounded by strong gradients and can
//! attract the vote maximum. When the raw estimate sits on such a highlight,
//! the connected bright blob around it is flood-filled on the full-resolution
//! region, the accumulator cells under it are zeroed, and the best remaining
//! cell is taken instead.

use log::debug;

use crate::config::EyeDetectorConfig;
use crate::raster::{GrayImage, ImageAccess};
use crate::voting::Votes;

const NEIGH_OFFSETS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Mask of pixels 4-connected to `seed` through pixels accepted by `include`.
/// The seed itself is always part of the mask.
pub fn flood_fill<F>(image: &GrayImage, seed: (u32, u32), include: F) -> Vec<bool>
where
    F: Fn(u8) -> bool,
{
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut mask = vec![false; w * h];
    if seed.0 as usize >= w || seed.1 as usize >= h {
        return mask;
    }

    let mut stack = Vec::with_capacity(64);
    let seed_idx = seed.1 as usize * w + seed.0 as usize;
    mask[seed_idx] = true;
    stack.push(seed_idx);

    while let Some(idx) = stack.pop() {
        let x = (idx % w) as i64;
        let y = (idx / w) as i64;
        for (dx, dy) in NEIGH_OFFSETS {
            let (xn, yn) = (x + dx, y + dy);
            if xn < 0 || yn < 0 || xn >= w as i64 || yn >= h as i64 {
                continue;
            }
            let n = yn as usize * w + xn as usize;
            if mask[n] || !include(image.at(xn as u32, yn as u32)) {
                continue;
            }
            mask[n] = true;
            stack.push(n);
        }
    }
    mask
}

#[derive(Debug, Clone, Copy)]
pub struct HaloFilter {
    pub enabled: bool,
    /// Fraction of the brightest pixel above which a seed counts as a highlight;
    /// also the fraction of the seed intensity that bounds the fill.
    pub threshold: f32,
}

impl HaloFilter {
    pub fn from_config(cfg: &EyeDetectorConfig) -> Self {
        Self {
            enabled: cfg.enable_post_process,
            threshold: cfg.post_process_threshold,
        }
    }

    /// Final estimate in scaled-region coordinates.
    ///
    /// `region` is the unsmoothed full-resolution region and `scale` the factor
    /// that maps it onto the accumulator grid.
    pub fn apply(&self, votes: &mut Votes, region: &GrayImage, scale: f32) -> (usize, usize) {
        if !self.enabled || region.is_empty() {
            return votes.best;
        }
        let to_region = |x: usize, y: usize| {
            let rx = ((x as f32 / scale).round() as u32).min(region.width() - 1);
            let ry = ((y as f32 / scale).round() as u32).min(region.height() - 1);
            (rx, ry)
        };

        let seed = to_region(votes.best.0, votes.best.1);
        let seed_value = region.at(seed.0, seed.1) as f32;
        let peak = region.max_intensity() as f32;
        if peak == 0.0 || seed_value < self.threshold * peak {
            return votes.best;
        }

        let limit = self.threshold * seed_value;
        let mask = flood_fill(region, seed, |v| v as f32 >= limit);
        let width = region.width() as usize;

        let mut killed = 0usize;
        {
            let acc = &mut votes.accumulator;
            for y in 0..acc.height {
                for x in 0..acc.width {
                    let (rx, ry) = to_region(x, y);
                    if mask[ry as usize * width + rx as usize] {
                        acc.set(x, y, 0.0);
                        killed += 1;
                    }
                }
            }
        }

        let acc = &votes.accumulator;
        match acc.max_loc_where(|x, y| acc.get(x, y) > 0.0) {
            Some((x, y, _)) => {
                debug!(
                    "estimate {:?} was on a highlight, {killed} cells removed, moved to ({x}, {y})",
                    votes.best
                );
                votes.best = (x, y);
            }
            None => debug!("highlight covers every candidate, keeping {:?}", votes.best),
        }
        votes.best
    }
}

impl Default for HaloFilter {
    fn default() -> Self {
        Self::from_config(&EyeDetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::FloatMap;

    /// 20x20 region: bright 255 blob on the left, gray elsewhere, a dark spot at (15, 10).
    fn region_with_blob() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, y| {
            if x < 8 && (4..16).contains(&y) {
                255
            } else if (14..17).contains(&x) && (9..12).contains(&y) {
                20
            } else {
                120
            }
        })
    }

    fn votes_with_peaks(peaks: &[(usize, usize, f32)]) -> Votes {
        let mut accumulator = FloatMap::new(20, 20);
        accumulator.data.iter_mut().for_each(|v| *v = 0.01);
        for &(x, y, v) in peaks {
            accumulator.set(x, y, v);
        }
        let best = accumulator.max_loc().map(|(x, y, _)| (x, y)).unwrap();
        Votes { accumulator, best }
    }

    #[test]
    fn flood_fill_stays_in_connected_bright_pixels() {
        let region = region_with_blob();
        let mask = flood_fill(&region, (3, 8), |v| v >= 250);
        let count = mask.iter().filter(|m| **m).count();
        assert_eq!(count, 8 * 12);
        assert!(!mask[10 * 20 + 15]);
    }

    #[test]
    fn estimate_on_highlight_moves_to_best_survivor() {
        let region = region_with_blob();
        let mut votes = votes_with_peaks(&[(3, 8, 5.0), (15, 10, 3.0)]);
        let best = HaloFilter::default().apply(&mut votes, &region, 1.0);
        assert_eq!(best, (15, 10));
        assert_eq!(votes.accumulator.get(3, 8), 0.0);
        assert_eq!(votes.accumulator.get(0, 4), 0.0);
        assert!(votes.accumulator.get(10, 0) > 0.0);
    }

    #[test]
    fn dark_estimate_passes_through() {
        let region = region_with_blob();
        let mut votes = votes_with_peaks(&[(15, 10, 5.0), (3, 8, 3.0)]);
        let before = votes.accumulator.clone();
        assert_eq!(HaloFilter::default().apply(&mut votes, &region, 1.0), (15, 10));
        assert_eq!(votes.accumulator, before);
    }

    #[test]
    fn disabled_filter_keeps_raw_estimate() {
        let region = region_with_blob();
        let mut votes = votes_with_peaks(&[(3, 8, 5.0), (15, 10, 3.0)]);
        let filter = HaloFilter {
            enabled: false,
            ..HaloFilter::default()
        };
        assert_eq!(filter.apply(&mut votes, &region, 1.0), (3, 8));
    }

    #[test]
    fn accumulator_grid_is_mapped_through_scale() {
        let region = region_with_blob();
        // Accumulator at half resolution
        let mut accumulator = FloatMap::new(10, 10);
        accumulator.set(1, 4, 5.0);
        accumulator.set(7, 5, 2.0);
        let mut votes = Votes {
            accumulator,
            best: (1, 4),
        };
        let best = HaloFilter::default().apply(&mut votes, &region, 0.5);
        assert_eq!(best, (7, 5));
    }
}
