//! Detector configuration.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! overrides:
//!
//! ```
//! use pupil_locator::EyeDetectorConfig;
//!
//! let cfg = EyeDetectorConfig::from_json_str(r#"{ "useHaarCascades": false, "widthRatio": 0.3 }"#).unwrap();
//! assert_eq!(cfg.width_ratio, 0.3);
//! assert_eq!(cfg.top_face_ratio, 0.28);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunable parameters of the eye detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EyeDetectorConfig {
    /// Refine the ratio-based search regions with a cascade classifier.
    pub use_haar_cascades: bool,
    /// Model file for the left-eye classifier, handed to a [`crate::CascadeLoader`].
    pub left_eye_cascade_path: Option<PathBuf>,
    /// Model file for the right-eye classifier.
    pub right_eye_cascade_path: Option<PathBuf>,

    /// Distance of the search region from the top of the face, as a fraction of face height.
    pub top_face_ratio: f32,
    /// Distance of the search region from the face side, as a fraction of face width.
    pub side_face_ratio: f32,
    /// Search region width as a fraction of face width.
    pub width_ratio: f32,
    /// Search region height as a fraction of face height.
    pub height_ratio: f32,

    pub smooth_face_image: bool,
    /// Gaussian sigma as a fraction of the region width.
    pub smooth_face_factor: f32,

    /// Width the region is resized to before voting.
    pub fast_eye_width: u32,
    /// Kernel size of the blur feeding the inverse-intensity weight.
    pub weight_blur_size: u32,
    pub enable_weight: bool,
    pub weight_divisor: f32,
    /// Standard-deviation factor of the dynamic gradient threshold.
    pub gradient_threshold: f32,
    /// Box-blur radius applied to the accumulator; 0 disables it.
    pub accumulator_blur_radius: u32,

    pub enable_post_process: bool,
    /// Relative brightness that marks a pixel as part of a specular halo.
    pub post_process_threshold: f32,

    pub enable_eye_corner: bool,

    /// Number of eyes that must be found for a detection to succeed.
    pub min_eyes: u8,
}

impl Default for EyeDetectorConfig {
    fn default() -> Self {
        Self {
            use_haar_cascades: false,
            left_eye_cascade_path: None,
            right_eye_cascade_path: None,
            top_face_ratio: 0.28,
            side_face_ratio: 0.13,
            width_ratio: 0.35,
            height_ratio: 0.25,
            smooth_face_image: false,
            smooth_face_factor: 0.005,
            fast_eye_width: 50,
            weight_blur_size: 5,
            enable_weight: false,
            weight_divisor: 150.0,
            gradient_threshold: 50.0,
            accumulator_blur_radius: 0,
            enable_post_process: true,
            post_process_threshold: 0.97,
            enable_eye_corner: false,
            min_eyes: 2,
        }
    }
}

impl EyeDetectorConfig {
    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("topFaceRatio", self.top_face_ratio),
            ("sideFaceRatio", self.side_face_ratio),
            ("widthRatio", self.width_ratio),
            ("heightRatio", self.height_ratio),
        ];
        for (name, value) in ratios {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.width_ratio == 0.0 || self.height_ratio == 0.0 {
            return Err(Error::InvalidConfig(
                "search region ratios must be non-zero".into(),
            ));
        }
        if self.fast_eye_width < 3 {
            return Err(Error::InvalidConfig(format!(
                "fastEyeWidth must be at least 3, got {}",
                self.fast_eye_width
            )));
        }
        if !self.smooth_face_factor.is_finite() || self.smooth_face_factor < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "smoothFaceFactor must be non-negative, got {}",
                self.smooth_face_factor
            )));
        }
        if !self.weight_divisor.is_finite() || self.weight_divisor <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "weightDivisor must be positive, got {}",
                self.weight_divisor
            )));
        }
        if !self.gradient_threshold.is_finite() {
            return Err(Error::InvalidConfig("gradientThreshold must be finite".into()));
        }
        if !self.post_process_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.post_process_threshold)
        {
            return Err(Error::InvalidConfig(format!(
                "postProcessThreshold must be within [0, 1], got {}",
                self.post_process_threshold
            )));
        }
        if self.min_eyes > 2 {
            return Err(Error::InvalidConfig(format!(
                "minEyes must be 0, 1 or 2, got {}",
                self.min_eyes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EyeDetectorConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.use_haar_cascades);
        assert!(cfg.enable_post_process);
        assert!(!cfg.enable_eye_corner);
        assert_eq!(cfg.fast_eye_width, 50);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EyeDetectorConfig::from_json_str(
            r#"{
                "useHaarCascades": true,
                "leftEyeCascadePath": "models/left.xml",
                "postProcessThreshold": 0.9
            }"#,
        )
        .unwrap();
        assert!(cfg.use_haar_cascades);
        assert_eq!(cfg.left_eye_cascade_path, Some(PathBuf::from("models/left.xml")));
        assert_eq!(cfg.right_eye_cascade_path, None);
        assert_eq!(cfg.post_process_threshold, 0.9);
        assert_eq!(cfg.weight_divisor, 150.0);
        assert_eq!(cfg.side_face_ratio, 0.13);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EyeDetectorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for json in [
            r#"{ "widthRatio": 1.5 }"#,
            r#"{ "heightRatio": 0.0 }"#,
            r#"{ "fastEyeWidth": 1 }"#,
            r#"{ "weightDivisor": 0.0 }"#,
            r#"{ "postProcessThreshold": 2.0 }"#,
            r#"{ "minEyes": 3 }"#,
        ] {
            let err = EyeDetectorConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{json} accepted");
        }
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = EyeDetectorConfig::load("/nonexistent/pupil-locator.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
