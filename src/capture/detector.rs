//! Object detection hand-off

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use image::{ImageFormat, RgbImage};
use serde::Deserialize;

use crate::{Error, Result};

/// Normalized box, TensorFlow object-detection order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub ymin: f32,
    pub xmin: f32,
    pub ymax: f32,
    pub xmax: f32,
}

impl BoundingBox {
    /// Pixel rectangle `(x0, y0, x1, y1)` in an image of the given size
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32, f32, f32) {
        let (w, h) = (width as f32, height as f32);
        (
            self.xmin.clamp(0.0, 1.0) * w,
            self.ymin.clamp(0.0, 1.0) * h,
            self.xmax.clamp(0.0, 1.0) * w,
            self.ymax.clamp(0.0, 1.0) * h,
        )
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([ymin, xmin, ymax, xmax]: [f32; 4]) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }
}

/// One detected object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub score: f32,
}

/// Detections for a single image, in detector order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    detections: Vec<Detection>,
}

impl DetectionResult {
    /// Build from the detector's parallel arrays
    ///
    /// # Errors
    ///
    /// Returns a detection error if the arrays differ in length
    pub fn from_parallel(
        boxes: Vec<BoundingBox>,
        classes: Vec<u32>,
        scores: Vec<f32>,
    ) -> Result<Self> {
        if boxes.len() != classes.len() || boxes.len() != scores.len() {
            return Err(Error::Detection(format!(
                "mismatched detector output: {} boxes, {} classes, {} scores",
                boxes.len(),
                classes.len(),
                scores.len()
            )));
        }

        let detections = boxes
            .into_iter()
            .zip(classes)
            .zip(scores)
            .map(|((bbox, class_id), score)| Detection {
                bbox,
                class_id,
                score,
            })
            .collect();

        Ok(Self { detections })
    }

    /// All detections
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    /// Detections scoring at least `threshold`, in detector order
    pub fn above(&self, threshold: f32) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(move |d| d.score >= threshold)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Offline object detector
pub trait ObjectDetector {
    /// Detect objects in `frame`
    ///
    /// # Errors
    ///
    /// Returns error if the detector fails
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult>;

    /// Human-readable name for a class id
    fn class_name(&self, class_id: u32) -> Option<&str>;
}

#[derive(Deserialize)]
struct RawDetections {
    boxes: Vec<[f32; 4]>,
    classes: Vec<u32>,
    scores: Vec<f32>,
}

/// Detector running an external program on a temporary PNG
///
/// The program receives the image path as its last argument and prints
/// `{"boxes": [[ymin, xmin, ymax, xmax], ..], "classes": [..], "scores": [..]}`.
#[derive(Debug)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    labels: HashMap<u32, String>,
}

impl CommandDetector {
    /// Create a detector with class names from `labels_path`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the labels file is missing or is not
    /// a JSON object of `"id": "name"`
    pub fn new(program: String, args: Vec<String>, labels_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(labels_path).map_err(|e| {
            Error::Config(format!("failed to read detector labels {}: {e}", labels_path.display()))
        })?;
        let labels: HashMap<u32, String> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("malformed detector labels {}: {e}", labels_path.display()))
        })?;

        tracing::debug!(program = %program, labels = labels.len(), "object detector configured");
        Ok(Self {
            program,
            args,
            labels,
        })
    }
}

impl ObjectDetector for CommandDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult> {
        let file = tempfile::Builder::new()
            .prefix("sketchbooth-frame-")
            .suffix(".png")
            .tempfile()?;
        frame.save_with_format(file.path(), ImageFormat::Png)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .output()
            .map_err(|e| Error::Detection(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(Error::Detection(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw: RawDetections = serde_json::from_slice(&output.stdout)?;
        let result = DetectionResult::from_parallel(
            raw.boxes.into_iter().map(BoundingBox::from).collect(),
            raw.classes,
            raw.scores,
        )?;

        tracing::debug!(detections = result.len(), "detector finished");
        Ok(result)
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }
}
