//! Per-face orchestration of the eye pipeline.
//!
//! For each side the search region is located and cropped, the pupil is
//! found by gradient voting, and corners are added when enabled.

use log::{debug, warn};

use crate::config::EyeDetectorConfig;
use crate::corner::CornerRefiner;
use crate::error::Result;
use crate::gradient::{scale_to_fast_width, smooth, GradientField};
use crate::halo::HaloFilter;
use crate::raster::{GrayImage, ImageAccess, RasterImage};
use crate::region::{
    CascadeLoader, CascadeRegions, EyeRegionRefiner, RatioRegions, RegionLocator, RegionRatios,
};
use crate::types::{BoundingBox, Detection, EyeLandmark, EyeSide, LandMarks, Point};
use crate::voting::CenterVoter;

/// Locates pupil centers inside a known face rectangle.
///
/// The detector is immutable after construction and can be shared between
/// threads. The eye-corner templates are the only lazily created state; they
/// are built at most once and dropped together with the detector.
///
/// # Usage
///
/// ```ignore
/// let detector = EyeDetector::new(EyeDetectorConfig::default())?;
/// let raster = RasterImage::new(&rgb_bytes, width, height, 3);
/// let detection = detector.detect_landmarks(&raster, &face)?;
/// if detection.landmarks.left.valid { /* ... */ }
/// ```
pub struct EyeDetector {
    config: EyeDetectorConfig,
    locator: RegionLocator,
    voter: CenterVoter,
    halo: HaloFilter,
    corners: CornerRefiner,
}

impl EyeDetector {
    /// Create a detector using ratio-based search regions only.
    ///
    /// Cascade refinement needs a [`CascadeLoader`]; without one a request for
    /// it is logged and ignored.
    pub fn new(config: EyeDetectorConfig) -> Result<Self> {
        if config.use_haar_cascades {
            warn!("cascade refinement requested without a classifier loader, using ratio regions");
        }
        EyeDetectorBuilder::new()
            .config(config)
            .region_refiner(Box::new(RatioRegions))
            .build()
    }

    /// Create a detector whose region strategy follows `config.use_haar_cascades`,
    /// loading the configured classifiers through `loader`.
    pub fn with_cascade_loader(config: EyeDetectorConfig, loader: &dyn CascadeLoader) -> Result<Self> {
        let refiner: Box<dyn EyeRegionRefiner> = if config.use_haar_cascades {
            Box::new(CascadeRegions::load(
                config.left_eye_cascade_path.as_deref(),
                config.right_eye_cascade_path.as_deref(),
                loader,
            ))
        } else {
            Box::new(RatioRegions)
        };
        EyeDetectorBuilder::new()
            .config(config)
            .region_refiner(refiner)
            .build()
    }

    pub fn config(&self) -> &EyeDetectorConfig {
        &self.config
    }

    pub fn corner_refiner(&self) -> &CornerRefiner {
        &self.corners
    }

    /// Detect both pupils in an interleaved raster.
    ///
    /// Fails only when the raster cannot be read as grayscale; every other
    /// negative outcome is reported through the per-eye flags.
    pub fn detect_landmarks(&self, image: &RasterImage<'_>, face: &BoundingBox) -> Result<Detection> {
        let gray = image.to_gray()?;
        Ok(self.detect_landmarks_gray(&gray, face))
    }

    /// Detect both pupils in a grayscale image.
    pub fn detect_landmarks_gray(&self, image: &GrayImage, face: &BoundingBox) -> Detection {
        let mut landmarks = LandMarks::default();
        for side in EyeSide::BOTH {
            *landmarks.get_mut(side) = self.detect_eye(image, face, side);
        }

        let found = landmarks.valid_count();
        let success = found >= self.config.min_eyes as usize;
        debug!(
            "found {found} eye(s) in face {face:?}, required {}",
            self.config.min_eyes
        );
        Detection { success, landmarks }
    }

    fn detect_eye(&self, image: &GrayImage, face: &BoundingBox, side: EyeSide) -> EyeLandmark {
        let Some(roi) = self.locator.locate(image, face, side) else {
            return EyeLandmark::invalid();
        };

        let region = image.crop(&roi);
        let Some(local) = self.find_eye_center(&region) else {
            debug!("no pupil found for {side:?} eye in {roi:?}");
            return EyeLandmark {
                search_region: Some(roi),
                ..EyeLandmark::invalid()
            };
        };

        let center = local + roi.top_left();
        let corners = if self.config.enable_eye_corner {
            self.corners.refine_eye(image, &roi, center, side)
        } else {
            None
        };

        EyeLandmark {
            center,
            valid: true,
            search_region: Some(roi),
            corners,
        }
    }

    /// Pupil center in the coordinates of `region`, or `None` when nothing in
    /// the region is strong enough to vote.
    ///
    /// Stages: smoothing (optional) → resize to the fast width → gradient
    /// voting → halo removal → mapping back to region resolution.
    pub fn find_eye_center(&self, region: &GrayImage) -> Option<Point> {
        if region.is_empty() {
            return None;
        }
        let smoothed;
        let source = if self.config.smooth_face_image {
            smoothed = smooth(region, self.config.smooth_face_factor);
            &smoothed
        } else {
            region
        };

        let scaled = scale_to_fast_width(source, self.config.fast_eye_width);
        let field = GradientField::compute(&scaled.image, self.config.gradient_threshold);
        let mut votes = self.voter.vote(&field, &scaled.image)?;
        let (x, y) = self.halo.apply(&mut votes, region, scaled.scale);

        let (ux, uy) = scaled.unscale(x, y);
        let max_x = (region.width() - 1) as f32;
        let max_y = (region.height() - 1) as f32;
        Some(Point::new(ux.min(max_x), uy.min(max_y)))
    }
}

/// Builder for an [`EyeDetector`] with a custom region strategy.
pub struct EyeDetectorBuilder {
    config: Option<EyeDetectorConfig>,
    refiner: Option<Box<dyn EyeRegionRefiner>>,
}

impl EyeDetectorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            refiner: None,
        }
    }

    /// Set the configuration (defaults when omitted).
    pub fn config(mut self, config: EyeDetectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the search-region strategy (ratio-only when omitted).
    pub fn region_refiner(mut self, refiner: Box<dyn EyeRegionRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Validate the configuration and build the detector.
    pub fn build(self) -> Result<EyeDetector> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let refiner = self.refiner.unwrap_or_else(|| Box::new(RatioRegions));

        Ok(EyeDetector {
            locator: RegionLocator::new(RegionRatios::from_config(&config), refiner),
            voter: CenterVoter::from_config(&config),
            halo: HaloFilter::from_config(&config),
            corners: CornerRefiner::new(),
            config,
        })
    }
}

impl Default for EyeDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn face_image() -> (GrayImage, BoundingBox) {
        // 200x200 face at the origin; eye regions are (26, 56, 70, 50) and (104, 56, 70, 50)
        let pupils = [(61.0f32, 81.0f32), (139.0, 81.0)];
        let image = GrayImage::from_fn(200, 200, |x, y| {
            let inside = pupils.iter().any(|(cx, cy)| {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                dx * dx + dy * dy <= 64.0
            });
            if inside {
                25
            } else {
                210
            }
        });
        (image, BoundingBox::new(0.0, 0.0, 200.0, 200.0))
    }

    #[test]
    fn detects_both_pupils() {
        let detector = EyeDetector::new(EyeDetectorConfig::default()).unwrap();
        let (image, face) = face_image();
        let detection = detector.detect_landmarks_gray(&image, &face);

        assert!(detection.success);
        let lm = detection.landmarks;
        assert!(lm.left.center.distance(&Point::new(61.0, 81.0)) <= 2.0, "{:?}", lm.left);
        assert!(lm.right.center.distance(&Point::new(139.0, 81.0)) <= 2.0, "{:?}", lm.right);
        assert!(lm.left.corners.is_none());
    }

    #[test]
    fn uniform_face_has_no_valid_eye() {
        let detector = EyeDetector::new(EyeDetectorConfig::default()).unwrap();
        let image = GrayImage::from_fn(100, 100, |_, _| 128);
        let detection = detector.detect_landmarks_gray(&image, &BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        assert!(!detection.success);
        assert!(!detection.landmarks.left.valid);
        assert!(detection.landmarks.left.search_region.is_some());
    }

    #[test]
    fn raster_channel_mismatch_fails_the_call() {
        let detector = EyeDetector::new(EyeDetectorConfig::default()).unwrap();
        let data = vec![0u8; 10 * 10 * 6];
        let raster = RasterImage::new(&data, 10, 10, 6);
        let err = detector
            .detect_landmarks(&raster, &BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedRaster { channels: 6 }));
    }

    #[test]
    fn min_eyes_policy_controls_success() {
        let config = EyeDetectorConfig {
            min_eyes: 1,
            ..EyeDetectorConfig::default()
        };
        let detector = EyeDetector::new(config).unwrap();
        let (image, _) = face_image();
        // Face shifted so that only the right eye region stays inside the image
        let face = BoundingBox::new(-100.0, 0.0, 200.0, 200.0);
        let detection = detector.detect_landmarks_gray(&image, &face);
        assert!(!detection.landmarks.left.valid);
        assert!(detection.landmarks.right.valid);
        assert!(detection.success);
    }

    #[test]
    fn corner_refinement_annotates_valid_eyes() {
        let config = EyeDetectorConfig {
            enable_eye_corner: true,
            ..EyeDetectorConfig::default()
        };
        let detector = EyeDetector::new(config).unwrap();
        assert!(!detector.corner_refiner().is_built());

        let (image, face) = face_image();
        let detection = detector.detect_landmarks_gray(&image, &face);
        assert!(detector.corner_refiner().is_built());

        for side in EyeSide::BOTH {
            let eye = detection.landmarks.get(side);
            let roi = eye.search_region.unwrap();
            let corners = eye.corners.expect("corners requested");
            assert!(roi.contains(corners.inner));
            assert!(roi.contains(corners.outer));
        }
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = EyeDetectorConfig {
            fast_eye_width: 0,
            ..EyeDetectorConfig::default()
        };
        assert!(EyeDetectorBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn detector_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EyeDetector>();
    }
}
