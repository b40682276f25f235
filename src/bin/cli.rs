//! CLI application for pupil and eye-corner localization.
//!
//! Usage:
//!   pupil-locator <image>                     # Human-readable output
//!   pupil-locator <image> --json              # JSON output
//!   pupil-locator <image> -o eyes.json        # Save to file
//!   pupil-locator <image> --config eyes.json  # Override detector parameters

use clap::Parser;
use image::GenericImageView;
use log::{debug, info, LevelFilter};
use pupil_locator::{BoundingBox, EyeDetector, EyeDetectorConfig, EyeLandmark, RasterImage};
use rustface::ImageData;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pupil-locator")]
#[command(author, version, about = "Pupil center localization", long_about = None)]
struct Args {
    /// Input image file
    #[arg(required = true)]
    image: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Face detector model path
    #[arg(long, default_value = "seeta_fd_frontal_v1.0.bin")]
    detector: PathBuf,

    /// Eye detector configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also locate the eye corners
    #[arg(long)]
    corners: bool,

    /// Minimum face size for detection
    #[arg(long, default_value = "20")]
    min_face_size: u32,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    faces_detected: usize,
    faces: Vec<FaceOutput>,
}

#[derive(Serialize)]
struct FaceOutput {
    /// Face index (1-based)
    index: usize,
    /// Bounding box from detector
    bounding_box: BoundingBoxOutput,
    /// Minimum-eyes policy outcome
    success: bool,
    left_eye: EyeOutput,
    right_eye: EyeOutput,
    interpupillary_distance: Option<f32>,
}

#[derive(Serialize)]
struct BoundingBoxOutput {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct EyeOutput {
    valid: bool,
    x: f32,
    y: f32,
    inner_corner: Option<[f32; 2]>,
    outer_corner: Option<[f32; 2]>,
}

impl From<&EyeLandmark> for EyeOutput {
    fn from(eye: &EyeLandmark) -> Self {
        Self {
            valid: eye.valid,
            x: eye.center.x,
            y: eye.center.y,
            inner_corner: eye.corners.map(|c| [c.inner.x, c.inner.y]),
            outer_corner: eye.corners.map(|c| [c.outer.x, c.outer.y]),
        }
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("loading eye detector config from {:?}", path);
            EyeDetectorConfig::load(path)?
        }
        None => EyeDetectorConfig::default(),
    };
    if args.corners {
        config.enable_eye_corner = true;
    }
    let eye_detector = EyeDetector::new(config)?;

    info!("loading face detector from {:?}", args.detector);
    let detector_path = args.detector.to_str().ok_or("Invalid detector path")?;
    let mut detector = rustface::create_detector(detector_path)
        .map_err(|e| format!("Failed to load face detector: {}", e))?;
    detector.set_min_face_size(args.min_face_size);
    detector.set_score_thresh(2.0);
    detector.set_pyramid_scale_factor(0.8);
    detector.set_slide_window_step(4, 4);

    info!("loading image {:?}", args.image);
    let img = image::open(&args.image)?;
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();
    let raster = RasterImage::new(rgb.as_raw(), width, height, 3);

    let gray_img = img.to_luma8();
    let image_data = ImageData::new(gray_img.as_raw(), width, height);
    let faces = detector.detect(&image_data);
    info!("found {} face(s)", faces.len());

    let mut face_outputs = Vec::with_capacity(faces.len());
    for (i, face) in faces.iter().enumerate() {
        let bbox = face.bbox();
        let face_box = BoundingBox::new(
            bbox.x() as f32,
            bbox.y() as f32,
            bbox.width() as f32,
            bbox.height() as f32,
        );

        let detection = eye_detector.detect_landmarks(&raster, &face_box)?;
        debug!("face {}: {:?}", i + 1, detection);

        face_outputs.push(FaceOutput {
            index: i + 1,
            bounding_box: BoundingBoxOutput {
                x: bbox.x(),
                y: bbox.y(),
                width: bbox.width(),
                height: bbox.height(),
            },
            success: detection.success,
            left_eye: EyeOutput::from(&detection.landmarks.left),
            right_eye: EyeOutput::from(&detection.landmarks.right),
            interpupillary_distance: detection.landmarks.interpupillary_distance(),
        });
    }

    let output = Output {
        image: args.image.display().to_string(),
        width,
        height,
        faces_detected: faces.len(),
        faces: face_outputs,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_eye(label: &str, eye: &EyeOutput) -> String {
    if !eye.valid {
        return format!("  {}: not found\n", label);
    }
    let mut s = format!("  {}: ({:.1}, {:.1})\n", label, eye.x, eye.y);
    if let (Some(inner), Some(outer)) = (eye.inner_corner, eye.outer_corner) {
        s.push_str(&format!(
            "    corners: inner ({:.1}, {:.1}), outer ({:.1}, {:.1})\n",
            inner[0], inner[1], outer[0], outer[1]
        ));
    }
    s
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} ({}x{})\n", output.image, output.width, output.height));
    s.push_str(&format!("Faces detected: {}\n", output.faces_detected));

    if output.faces.is_empty() {
        s.push_str("\nNo faces found.\n");
        return s;
    }

    for face in &output.faces {
        s.push_str(&format!("\n--- Face {} ---\n", face.index));
        s.push_str(&format!(
            "Bounding box: {}x{} at ({}, {})\n",
            face.bounding_box.width, face.bounding_box.height, face.bounding_box.x, face.bounding_box.y
        ));
        s.push_str(&format!("Detection: {}\n", if face.success { "ok" } else { "incomplete" }));

        s.push_str("\nPupils:\n");
        s.push_str(&format_eye("Left ", &face.left_eye));
        s.push_str(&format_eye("Right", &face.right_eye));
        if let Some(d) = face.interpupillary_distance {
            s.push_str(&format!("  Distance: {:.1} px\n", d));
        }
    }

    s
}
