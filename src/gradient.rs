//! Normalized intensity gradients over a downscaled eye region.
//!
//! The region is (optionally) smoothed and resized to a fixed width so the
//! quadratic voting pass has a bounded cost. Gradients are central
//! differences; the vertical one reuses the horizontal routine on the
//! transposed image. Only pixels whose magnitude is strictly above a dynamic
//! threshold keep a (unit) gradient and vote.

use image::imageops::{self, FilterType};

use crate::raster::{FloatMap, GrayImage, ImageAccess};

/// Region resized to the fast-processing width.
#[derive(Debug, Clone)]
pub struct ScaledRegion {
    pub image: GrayImage,
    /// Multiply region coordinates by this to get scaled coordinates.
    pub scale: f32,
}

impl ScaledRegion {
    /// Map a scaled-space position back to full-resolution region coordinates.
    pub fn unscale(&self, x: usize, y: usize) -> (f32, f32) {
        ((x as f32 / self.scale).round(), (y as f32 / self.scale).round())
    }
}

/// Gaussian smoothing with sigma proportional to the region width.
pub fn smooth(region: &GrayImage, factor: f32) -> GrayImage {
    let sigma = factor * region.width() as f32;
    if sigma <= 0.0 || region.is_empty() {
        return region.clone();
    }
    GrayImage::from(imageops::blur(&region.to_luma(), sigma))
}

/// Shrink to at most `fast_width` columns, keeping the aspect ratio.
///
/// Regions are never enlarged, and the result holds at most
/// `2 · fast_width²` pixels so tall slivers stay cheap to vote on.
pub fn scale_to_fast_width(region: &GrayImage, fast_width: u32) -> ScaledRegion {
    let (w, h) = (region.width().max(1) as f32, region.height().max(1) as f32);
    let max_pixels = 2.0 * (fast_width as f32).powi(2);
    let scale = (fast_width as f32 / w)
        .min(1.0)
        .min((max_pixels / (w * h)).sqrt());
    let width = ((w * scale).round() as u32).max(1);
    let height = ((h * scale).round() as u32).max(1);
    if (width, height) == (region.width(), region.height()) {
        return ScaledRegion {
            image: region.clone(),
            scale: 1.0,
        };
    }
    let resized = imageops::resize(&region.to_luma(), width, height, FilterType::Triangle);
    ScaledRegion {
        image: resized.into(),
        scale,
    }
}

/// Horizontal derivative: central differences inside, one-sided at both ends.
pub fn x_gradient(map: &FloatMap) -> FloatMap {
    let mut out = FloatMap::new(map.width, map.height);
    if map.width < 2 {
        return out;
    }
    let last = map.width - 1;
    for y in 0..map.height {
        let row = map.row(y);
        out.set(0, y, row[1] - row[0]);
        for x in 1..last {
            out.set(x, y, (row[x + 1] - row[x - 1]) / 2.0);
        }
        out.set(last, y, row[last] - row[last - 1]);
    }
    out
}

/// `mean + factor · stddev / sqrt(N)` over the magnitude map.
pub fn dynamic_threshold(magnitude: &FloatMap, std_dev_factor: f32) -> f32 {
    let (mean, std_dev) = magnitude.mean_std();
    let n = magnitude.data.len().max(1) as f32;
    std_dev_factor * std_dev / n.sqrt() + mean
}

/// Unit gradient vectors with a per-pixel voting mask.
#[derive(Debug, Clone)]
pub struct GradientField {
    pub gx: FloatMap,
    pub gy: FloatMap,
    pub magnitude: FloatMap,
    pub votes: Vec<bool>,
    pub threshold: f32,
}

impl GradientField {
    pub fn compute(image: &GrayImage, std_dev_factor: f32) -> Self {
        let intensity = FloatMap::from_gray(image);
        let mut gx = x_gradient(&intensity);
        let mut gy = x_gradient(&intensity.transpose()).transpose();

        let mut magnitude = FloatMap::new(gx.width, gx.height);
        for ((m, &x), &y) in magnitude.data.iter_mut().zip(&gx.data).zip(&gy.data) {
            *m = (x * x + y * y).sqrt();
        }
        let threshold = dynamic_threshold(&magnitude, std_dev_factor);

        let mut votes = vec![false; magnitude.data.len()];
        for (i, &m) in magnitude.data.iter().enumerate() {
            if m > threshold {
                gx.data[i] /= m;
                gy.data[i] /= m;
                votes[i] = true;
            } else {
                gx.data[i] = 0.0;
                gy.data[i] = 0.0;
            }
        }

        Self {
            gx,
            gy,
            magnitude,
            votes,
            threshold,
        }
    }

    pub fn width(&self) -> usize {
        self.gx.width
    }

    pub fn height(&self) -> usize {
        self.gx.height
    }

    pub fn voter_count(&self) -> usize {
        self.votes.iter().filter(|v| **v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_gradient_uses_central_and_one_sided_differences() {
        let mut map = FloatMap::new(4, 1);
        map.data.copy_from_slice(&[0.0, 2.0, 6.0, 12.0]);
        let g = x_gradient(&map);
        assert_eq!(g.data, vec![2.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn x_gradient_of_single_column_is_zero() {
        let map = FloatMap::new(1, 3);
        assert_eq!(x_gradient(&map).data, vec![0.0; 3]);
    }

    #[test]
    fn uniform_region_has_no_voters() {
        let img = GrayImage::from_fn(20, 10, |_, _| 90);
        let field = GradientField::compute(&img, 50.0);
        assert_eq!(field.voter_count(), 0);
        assert_eq!(field.threshold, 0.0);
    }

    #[test]
    fn vertical_edge_gives_unit_horizontal_gradients() {
        // Dark left half, bright right half
        let img = GrayImage::from_fn(50, 40, |x, _| if x < 25 { 20 } else { 220 });
        let field = GradientField::compute(&img, 50.0);

        assert_eq!(field.voter_count(), 80);
        for y in 0..field.height() {
            for x in 0..field.width() {
                let i = field.gx.idx(x, y);
                if field.votes[i] {
                    assert!(x == 24 || x == 25, "unexpected voter at x={x}");
                    assert!((field.gx.data[i] - 1.0).abs() < 1e-6);
                    assert!(field.gy.data[i].abs() < 1e-6);
                } else {
                    assert_eq!(field.gx.data[i], 0.0);
                    assert_eq!(field.gy.data[i], 0.0);
                }
            }
        }
    }

    #[test]
    fn dynamic_threshold_normalizes_std_dev_by_pixel_count() {
        let mut map = FloatMap::new(2, 2);
        map.data.copy_from_slice(&[0.0, 0.0, 4.0, 4.0]);
        // mean 2, std 2, N 4 => 2 + 3 * 2 / 2
        assert!((dynamic_threshold(&map, 3.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn scaling_preserves_aspect_ratio() {
        let img = GrayImage::from_fn(100, 60, |_, _| 100);
        let scaled = scale_to_fast_width(&img, 50);
        assert_eq!(scaled.image.width(), 50);
        assert_eq!(scaled.image.height(), 30);
        assert!((scaled.scale - 0.5).abs() < 1e-6);
        assert_eq!(scaled.unscale(10, 7), (20.0, 14.0));
    }

    #[test]
    fn narrow_regions_are_never_enlarged() {
        let sliver = GrayImage::from_fn(4, 150, |x, y| ((x * 40 + y * 3) % 256) as u8);
        let scaled = scale_to_fast_width(&sliver, 50);
        assert_eq!(scaled.scale, 1.0);
        assert_eq!((scaled.image.width(), scaled.image.height()), (4, 150));
        assert_eq!(scaled.image, sliver);
    }

    #[test]
    fn tall_regions_are_capped_in_pixel_count() {
        let column = GrayImage::from_fn(2, 10_000, |_, y| (y % 256) as u8);
        let scaled = scale_to_fast_width(&column, 50);
        let pixels = scaled.image.width() * scaled.image.height();
        assert!(pixels <= 2 * 50 * 50 + 50, "{pixels} pixels");
        assert!(scaled.scale < 1.0);
        assert!(scaled.image.width() >= 1);
    }

    #[test]
    fn smoothing_with_zero_factor_is_identity() {
        let img = GrayImage::from_fn(8, 8, |x, y| ((x * 31 + y * 17) % 256) as u8);
        assert_eq!(smooth(&img, 0.0), img);
        let blurred = smooth(&img, 0.25);
        assert_eq!((blurred.width(), blurred.height()), (8, 8));
    }
}
