// src/zone_counter.rs
//
// Turns one approach image's detections into a vehicle count.
//
// A vehicle is "at the stop line" when the ground contact point of its box
// (bottom-center) falls inside the detection zone, the lower half of the
// frame. Box overlap alone does not count: distant vehicles in the upper half
// can have tall boxes that reach into the zone.

use crate::types::{
    class_id_to_name, DetectedObject, DetectionZone, FrameSize, VehicleCount,
    DEFAULT_VEHICLE_CLASSES,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ZoneCounterConfig {
    /// Detector class IDs treated as vehicles (COCO: 2=car, 3=motorcycle, 5=bus, 7=truck)
    pub vehicle_class_ids: Vec<u32>,
}

impl Default for ZoneCounterConfig {
    fn default() -> Self {
        Self {
            vehicle_class_ids: DEFAULT_VEHICLE_CLASSES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneOccupancyCounter {
    config: ZoneCounterConfig,
}

impl ZoneOccupancyCounter {
    pub fn new(config: ZoneCounterConfig) -> Self {
        Self { config }
    }

    pub fn is_vehicle(&self, det: &DetectedObject) -> bool {
        self.config.vehicle_class_ids.contains(&det.class_id)
    }

    /// Count vehicles whose bottom-center lies inside the frame's detection zone.
    ///
    /// Identical boxes are counted independently; no deduplication happens here.
    pub fn count(&self, frame: FrameSize, detections: &[DetectedObject]) -> VehicleCount {
        let zone = frame.detection_zone();
        self.count_in_zone(&zone, detections)
    }

    pub fn count_in_zone(&self, zone: &DetectionZone, detections: &[DetectedObject]) -> VehicleCount {
        let mut vehicle_count = 0;

        for det in detections {
            if !self.is_vehicle(det) {
                continue;
            }

            let contact = det.bottom_center();
            if zone.contains(contact) {
                vehicle_count += 1;
            } else {
                debug!(
                    "Skipping {} at ({}, {}): outside zone",
                    class_id_to_name(det.class_id),
                    contact.x,
                    contact.y
                );
            }
        }

        vehicle_count
    }
}
