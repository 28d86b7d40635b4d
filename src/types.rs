// src/types.rs

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of approaches feeding the intersection.
pub const APPROACH_COUNT: usize = 4;

// COCO class IDs for vehicles
pub const DEFAULT_VEHICLE_CLASSES: [u32; 4] = [2, 3, 5, 7]; // car, motorcycle, bus, truck

/// Vehicles inside one approach's detection zone, valid for one cycle.
pub type VehicleCount = u32;

/// Green time for one approach, in whole seconds.
pub type SignalTiming = u32;

// ============================================================================
// APPROACHES
// ============================================================================

/// Ordinal identifier of an approach, always in `1..=4`.
///
/// The ordinal is also the round-robin order the scheduler walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ApproachId(u8);

impl ApproachId {
    pub const ALL: [ApproachId; APPROACH_COUNT] =
        [ApproachId(1), ApproachId(2), ApproachId(3), ApproachId(4)];

    pub fn new(ordinal: u8) -> Option<Self> {
        if (1..=APPROACH_COUNT as u8).contains(&ordinal) {
            Some(Self(ordinal))
        } else {
            None
        }
    }

    /// Approach assigned to the image at `index` (0-based) of a cycle.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn first() -> Self {
        Self::ALL[0]
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Next approach in cycle order, wrapping 4 -> 1.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % APPROACH_COUNT]
    }
}

impl fmt::Display for ApproachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "approach {}", self.0)
    }
}

/// One value per approach, indexed by `ApproachId`.
///
/// Replaces string-keyed maps: a table always holds exactly four entries,
/// so a lookup can never miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproachTable<T>([T; APPROACH_COUNT]);

impl<T> ApproachTable<T> {
    pub fn new(values: [T; APPROACH_COUNT]) -> Self {
        Self(values)
    }

    pub fn from_fn(f: impl FnMut(ApproachId) -> T) -> Self {
        Self(ApproachId::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApproachId, &T)> {
        ApproachId::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(ApproachId, &T) -> U) -> ApproachTable<U> {
        ApproachTable::from_fn(|id| f(id, &self.0[id.index()]))
    }
}

impl<T> Index<ApproachId> for ApproachTable<T> {
    type Output = T;

    fn index(&self, id: ApproachId) -> &T {
        &self.0[id.index()]
    }
}

impl<T> IndexMut<ApproachId> for ApproachTable<T> {
    fn index_mut(&mut self, id: ApproachId) -> &mut T {
        &mut self.0[id.index()]
    }
}

impl<T: Default> Default for ApproachTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

// Serialized as {"1": .., "2": .., "3": .., "4": ..}
impl<T: Serialize> Serialize for ApproachTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(APPROACH_COUNT))?;
        for (id, value) in self.iter() {
            map.serialize_entry(&id.get(), value)?;
        }
        map.end()
    }
}

// ============================================================================
// DETECTIONS & GEOMETRY
// ============================================================================

/// One object reported by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub class_id: u32,
    pub bbox: [f32; 4], // [x1, y1, x2, y2] in original image pixels
    pub confidence: f32,
}

impl DetectedObject {
    /// Ground contact point: middle of the box's bottom edge, in whole pixels.
    pub fn bottom_center(&self) -> PixelPoint {
        let [x1, _, x2, y2] = self.bbox;
        // Casts saturate; summing in i64 keeps far out-of-frame boxes from overflowing
        let x = (x1 as i32 as i64 + x2 as i32 as i64).div_euclid(2);
        PixelPoint {
            x: x as i32,
            y: y2 as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

/// Dimensions of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Lower half of the frame: rows `height / 2 ..= height`.
    pub fn detection_zone(&self) -> DetectionZone {
        DetectionZone {
            x1: 0,
            y1: (self.height / 2) as i32,
            x2: self.width as i32,
            y2: self.height as i32,
        }
    }
}

/// Axis-aligned rectangle inside a frame, bounds inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectionZone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl DetectionZone {
    pub fn contains(&self, point: PixelPoint) -> bool {
        self.x1 <= point.x && point.x <= self.x2 && self.y1 <= point.y && point.y <= self.y2
    }
}

pub fn class_id_to_name(class_id: u32) -> &'static str {
    match class_id {
        2 => "car",
        3 => "motorcycle",
        5 => "bus",
        7 => "truck",
        _ => "unknown",
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub detection: DetectionConfig,
    pub intersection: IntersectionConfig,
    pub images: ImageConfig,
    pub driver: DriverConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Green time every approach gets regardless of traffic
    pub minimum_seconds: u32,
    /// Extra green time handed out in proportion to the busiest approach
    pub extra_budget_seconds: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            minimum_seconds: 10,
            extra_budget_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub vehicle_class_ids: Vec<u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            vehicle_class_ids: DEFAULT_VEHICLE_CLASSES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    pub approach_count: usize,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            approach_count: APPROACH_COUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub input_dir: String,
    /// Fixes the random image sample; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/images".to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub tick_interval_ms: u64,
    /// Stop after this many completed cycles (0 = run until interrupted)
    pub max_cycles: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_cycles: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_annotated: bool,
    pub annotated_dir: String,
    pub events_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_annotated: false,
            annotated_dir: "output/annotated".to_string(),
            events_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_ids_wrap_in_order() {
        let order: Vec<u8> = std::iter::successors(Some(ApproachId::first()), |id| Some(id.next()))
            .take(6)
            .map(ApproachId::get)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4, 1, 2]);
        assert!(ApproachId::new(0).is_none());
        assert!(ApproachId::new(5).is_none());
        assert_eq!(ApproachId::from_index(3), ApproachId::new(4));
    }

    #[test]
    fn test_bottom_center_truncates_to_pixels() {
        let det = DetectedObject {
            class_id: 2,
            bbox: [10.9, 5.0, 21.7, 99.8],
            confidence: 0.9,
        };
        // (10 + 21) div 2 = 15, y2 truncated to 99
        assert_eq!(det.bottom_center(), PixelPoint { x: 15, y: 99 });

        let left_edge = DetectedObject {
            class_id: 2,
            bbox: [-3.0, 0.0, 0.0, 10.0],
            confidence: 0.9,
        };
        assert_eq!(left_edge.bottom_center().x, -2);
    }

    #[test]
    fn test_bottom_center_of_huge_box_does_not_overflow() {
        let far_right = DetectedObject {
            class_id: 2,
            bbox: [2e9, 0.0, 2e9, 400.0],
            confidence: 0.9,
        };
        assert_eq!(far_right.bottom_center().x, 2_000_000_000);

        let past_i32 = DetectedObject {
            class_id: 2,
            bbox: [3e9, 0.0, 3e9, 400.0],
            confidence: 0.9,
        };
        assert_eq!(past_i32.bottom_center().x, i32::MAX);

        let far_left = DetectedObject {
            class_id: 2,
            bbox: [-3e9, 0.0, -3e9, 400.0],
            confidence: 0.9,
        };
        assert_eq!(far_left.bottom_center().x, i32::MIN);
    }

    #[test]
    fn test_detection_zone_is_lower_half() {
        let zone = FrameSize::new(640, 481).detection_zone();
        assert_eq!(zone, DetectionZone { x1: 0, y1: 240, x2: 640, y2: 481 });
        assert!(zone.y1 < zone.y2);
    }

    #[test]
    fn test_table_serializes_as_ordinal_map() {
        let table = ApproachTable::new([20u32, 30, 10, 16]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"1":20,"2":30,"3":10,"4":16}"#);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("timing:\n  minimum_seconds: 5\n").unwrap();
        assert_eq!(config.timing.minimum_seconds, 5);
        assert_eq!(config.timing.extra_budget_seconds, 20);
        assert_eq!(config.detection.vehicle_class_ids, vec![2, 3, 5, 7]);
        assert_eq!(config.intersection.approach_count, 4);
    }
}
