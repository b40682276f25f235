//! Eye search regions.
//!
//! A region is first derived from the face rectangle with four fixed ratios,
//! then optionally handed to an [`EyeRegionRefiner`]. The refiner is a strategy
//! object so other detectors can be plugged in without touching the geometry.

use std::path::Path;

use log::{debug, warn};

use crate::config::EyeDetectorConfig;
use crate::error::Result;
use crate::raster::{GrayImage, ImageAccess};
use crate::types::{BoundingBox, EyeSide, Point, Rect};

/// A box reported by a classifier, in coordinates of the image it was run on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub rect: Rect,
    pub score: f32,
}

/// Pretrained object detector (e.g. a Haar cascade) run over an eye search region.
///
/// Implementations live outside this crate; only the handle is used here.
pub trait CascadeClassifier: Send + Sync {
    /// Detect eye candidates in a row-major grayscale region.
    fn detect(&self, region: &GrayImage) -> Vec<Candidate>;
}

/// Turns a classifier model file into a classifier handle.
pub trait CascadeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn CascadeClassifier>>;
}

/// Strategy that may replace a ratio-based search region with a better one.
pub trait EyeRegionRefiner: Send + Sync {
    /// Returns a rectangle local to `region`, or `None` to keep the ratio region.
    fn refine(&self, region: &GrayImage, side: EyeSide) -> Option<Rect>;
}

/// Ratio-only strategy: never refines.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioRegions;

impl EyeRegionRefiner for RatioRegions {
    fn refine(&self, _region: &GrayImage, _side: EyeSide) -> Option<Rect> {
        None
    }
}

/// Classifier-assisted strategy with an optional classifier per side.
#[derive(Default)]
pub struct CascadeRegions {
    left: Option<Box<dyn CascadeClassifier>>,
    right: Option<Box<dyn CascadeClassifier>>,
}

impl CascadeRegions {
    pub fn new(
        left: Option<Box<dyn CascadeClassifier>>,
        right: Option<Box<dyn CascadeClassifier>>,
    ) -> Self {
        Self { left, right }
    }

    /// Load both classifiers through `loader`. A side whose path is missing or
    /// fails to load keeps working with its ratio region.
    pub fn load(
        left_path: Option<&Path>,
        right_path: Option<&Path>,
        loader: &dyn CascadeLoader,
    ) -> Self {
        let load_side = |side: EyeSide, path: Option<&Path>| {
            let Some(path) = path else {
                warn!("no cascade configured for {side:?} eye, using ratio region");
                return None;
            };
            match loader.load(path) {
                Ok(classifier) => {
                    debug!("loaded {side:?} eye cascade from {}", path.display());
                    Some(classifier)
                }
                Err(e) => {
                    warn!(
                        "failed to load {side:?} eye cascade from {}: {e}; using ratio region",
                        path.display()
                    );
                    None
                }
            }
        };
        Self {
            left: load_side(EyeSide::Left, left_path),
            right: load_side(EyeSide::Right, right_path),
        }
    }

    pub fn has_classifier(&self, side: EyeSide) -> bool {
        self.classifier(side).is_some()
    }

    fn classifier(&self, side: EyeSide) -> Option<&dyn CascadeClassifier> {
        match side {
            EyeSide::Left => self.left.as_deref(),
            EyeSide::Right => self.right.as_deref(),
        }
    }
}

impl EyeRegionRefiner for CascadeRegions {
    fn refine(&self, region: &GrayImage, side: EyeSide) -> Option<Rect> {
        let classifier = self.classifier(side)?;
        let candidates = classifier.detect(region);
        debug!("{side:?} eye cascade reported {} candidate(s)", candidates.len());
        best_candidate(&candidates, region.width(), region.height())
    }
}

/// Highest-scoring candidate clipped to the region; ties keep the first one.
fn best_candidate(candidates: &[Candidate], width: u32, height: u32) -> Option<Rect> {
    let mut best: Option<(Rect, f32)> = None;
    for c in candidates {
        if c.score.is_nan() {
            continue;
        }
        let rect = c.rect.clip_to(width, height);
        if rect.is_empty() {
            continue;
        }
        if best.map_or(true, |(_, score)| c.score > score) {
            best = Some((rect, c.score));
        }
    }
    best.map(|(rect, _)| rect)
}

/// Face-relative placement of the eye search regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRatios {
    pub top: f32,
    pub side: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionRatios {
    pub fn from_config(cfg: &EyeDetectorConfig) -> Self {
        Self {
            top: cfg.top_face_ratio,
            side: cfg.side_face_ratio,
            width: cfg.width_ratio,
            height: cfg.height_ratio,
        }
    }
}

impl Default for RegionRatios {
    fn default() -> Self {
        Self::from_config(&EyeDetectorConfig::default())
    }
}

/// Computes the per-eye search region for a face.
pub struct RegionLocator {
    ratios: RegionRatios,
    refiner: Box<dyn EyeRegionRefiner>,
}

impl RegionLocator {
    pub fn new(ratios: RegionRatios, refiner: Box<dyn EyeRegionRefiner>) -> Self {
        Self { ratios, refiner }
    }

    /// Ratio-derived region, not yet clipped to the image.
    /// The right region mirrors the left one across the face's vertical axis.
    pub fn ratio_region(&self, face: &BoundingBox, side: EyeSide) -> Rect {
        let r = &self.ratios;
        let left_offset = match side {
            EyeSide::Left => r.side,
            EyeSide::Right => 1.0 - r.side - r.width,
        };
        let origin = face.denormalize_point(Point::new(left_offset, r.top));
        Rect::from_bounding_box(&BoundingBox::new(
            origin.x,
            origin.y,
            r.width * face.width,
            r.height * face.height,
        ))
    }

    /// Search region for one eye in image coordinates, or `None` when nothing
    /// of it lies inside the image.
    pub fn locate(&self, image: &GrayImage, face: &BoundingBox, side: EyeSide) -> Option<Rect> {
        let (w, h) = (image.width(), image.height());
        let roi = self.ratio_region(face, side).clip_to(w, h);
        if roi.is_empty() {
            debug!("{side:?} eye region is empty after clipping to {w}x{h}");
            return None;
        }

        let refined = self
            .refiner
            .refine(&image.crop(&roi), side)
            .map(|local| local.translate(roi.x, roi.y).clip_to(w, h))
            .filter(|r| !r.is_empty());

        match refined {
            Some(r) => {
                debug!("{side:?} eye region refined from {roi:?} to {r:?}");
                Some(r)
            }
            None => Some(roi),
        }
    }
}
