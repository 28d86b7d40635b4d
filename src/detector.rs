// src/detector.rs
//
// Detector boundary. Object detection itself happens elsewhere (a YOLO model
// run offline or by another service); this module only turns its output
// into fixed-shape `DetectedObject` records for one image.

use crate::types::{DetectedObject, FrameSize};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything the counter needs from one image.
#[derive(Debug, Clone)]
pub struct ImageDetections {
    pub frame: FrameSize,
    pub objects: Vec<DetectedObject>,
}

pub trait VehicleDetector {
    /// Detections for `image`, already filtered by the confidence floor.
    fn detect(&mut self, image: &Path) -> Result<ImageDetections>;
}

/// Reads detections from a JSON file stored next to each image.
///
/// `frame_0012.jpg` pairs with `frame_0012.json`, which holds a list of
/// `{"class_id": 2, "bbox": [x1, y1, x2, y2], "confidence": 0.87}` records in
/// original image pixels. The frame size comes from the image header.
pub struct SidecarDetector {
    confidence_threshold: f32,
}

impl SidecarDetector {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn sidecar_path(image: &Path) -> PathBuf {
        image.with_extension("json")
    }
}

impl VehicleDetector for SidecarDetector {
    fn detect(&mut self, image: &Path) -> Result<ImageDetections> {
        let (width, height) = image::image_dimensions(image)
            .with_context(|| format!("Failed to read image {}", image.display()))?;

        let sidecar = Self::sidecar_path(image);
        let contents = fs::read_to_string(&sidecar)
            .with_context(|| format!("Missing detections for {}", image.display()))?;
        let raw: Vec<DetectedObject> = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed detections in {}", sidecar.display()))?;

        let total = raw.len();
        let objects: Vec<DetectedObject> = raw
            .into_iter()
            .filter(|det| det.confidence >= self.confidence_threshold)
            .collect();

        debug!(
            "{}: {} detections ({} below confidence {:.2})",
            image.display(),
            objects.len(),
            total - objects.len(),
            self.confidence_threshold
        );

        Ok(ImageDetections {
            frame: FrameSize::new(width, height),
            objects,
        })
    }
}
