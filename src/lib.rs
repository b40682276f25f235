//! # pupil-locator
//!
//! Pure Rust pupil-center localization inside a detected face.
//!
//! This crate provides:
//! - **Eye search regions**: fixed face ratios, optionally refined by a
//!   pluggable cascade classifier
//! - **Pupil centers**: gradient voting over each region, with removal of
//!   specular highlights
//! - **Eye corners**: optional template-based inner/outer corner refinement
//!
//! Implements the method from "Accurate Eye Centre Localisation by Means of
//! Gradients" (Timm & Barth, 2011).
//!
//! ## Algorithm Overview
//!
//! 1. Place a search region for each eye using fractions of the face box
//! 2. Resize the region to a fixed width and compute normalized gradients
//! 3. Keep gradients above a dynamic threshold; each one votes for every
//!    candidate center it points away from
//! 4. Take the strongest candidate, discarding it if it sits on a bright
//!    reflection
//! 5. Map the result back to image coordinates
//!
//! ## Quick Start
//!
//! ```rust
//! use pupil_locator::{BoundingBox, EyeDetector, EyeDetectorConfig, RasterImage};
//!
//! let detector = EyeDetector::new(EyeDetectorConfig::default()).unwrap();
//!
//! // Interleaved RGB pixels from any source
//! let (width, height) = (320u32, 240u32);
//! let pixels = vec![200u8; (width * height * 3) as usize];
//! let raster = RasterImage::new(&pixels, width, height, 3);
//!
//! // Face rectangle from a face detector
//! let face = BoundingBox::new(60.0, 20.0, 200.0, 200.0);
//!
//! let detection = detector.detect_landmarks(&raster, &face).unwrap();
//! if !detection.success {
//!     println!("found {} eye(s)", detection.landmarks.valid_count());
//! }
//! ```
//!
//! ## Cascade Classifiers
//!
//! Region refinement is an external collaborator. Implement
//! [`CascadeClassifier`] and [`CascadeLoader`] to plug one in:
//!
//! ```rust
//! use std::path::Path;
//! use pupil_locator::{
//!     CascadeClassifier, CascadeLoader, Candidate, EyeDetector, EyeDetectorConfig, GrayImage,
//!     Result,
//! };
//!
//! struct NoEyes;
//!
//! impl CascadeClassifier for NoEyes {
//!     fn detect(&self, _region: &GrayImage) -> Vec<Candidate> {
//!         Vec::new()
//!     }
//! }
//!
//! struct Loader;
//!
//! impl CascadeLoader for Loader {
//!     fn load(&self, _path: &Path) -> Result<Box<dyn CascadeClassifier>> {
//!         Ok(Box::new(NoEyes))
//!     }
//! }
//!
//! let config = EyeDetectorConfig {
//!     use_haar_cascades: true,
//!     left_eye_cascade_path: Some("left_eye.xml".into()),
//!     right_eye_cascade_path: Some("right_eye.xml".into()),
//!     ..EyeDetectorConfig::default()
//! };
//! let detector = EyeDetector::with_cascade_loader(config, &Loader).unwrap();
//! # let _ = detector;
//! ```

mod config;
mod corner;
mod detector;
mod error;
pub mod gradient;
pub mod halo;
mod raster;
mod region;
mod types;
pub mod voting;

pub use config::EyeDetectorConfig;
pub use corner::{CornerKernels, CornerRefiner};
pub use detector::{EyeDetector, EyeDetectorBuilder};
pub use error::{Error, Result};
pub use raster::{FloatMap, GrayImage, ImageAccess, RasterImage};
pub use region::{
    Candidate, CascadeClassifier, CascadeLoader, CascadeRegions, EyeRegionRefiner, RatioRegions,
    RegionLocator, RegionRatios,
};
pub use types::{
    BoundingBox, CornerSide, Detection, EyeCorners, EyeLandmark, EyeSide, LandMarks, Point, Rect,
};
