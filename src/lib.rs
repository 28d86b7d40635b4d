//! Adaptive traffic signal controller
//!
//! Estimates vehicle density per approach of a four-way intersection from
//! still images and derives a recurring green schedule.
//!
//! Signal flow:
//!
//!   ImageSource → VehicleDetector → ZoneOccupancyCounter → counts
//!       → TimingAllocator → timings → CycleScheduler → CycleSnapshot
//!
//! Orchestrated by `orchestrator::CycleOrchestrator`. The scheduler is driven
//! by an external clock calling `tick()` once per second.

pub mod annotate;
pub mod config;
pub mod detector;
pub mod error;
pub mod image_source;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod snapshot;
pub mod timing;
pub mod types;
pub mod zone_counter;

pub use detector::{ImageDetections, SidecarDetector, VehicleDetector};
pub use error::{Result, SignalError};
pub use image_source::{DirectoryImageSource, ImageSource};
pub use orchestrator::{
    ApproachObservation, CycleOrchestrator, CycleReport, OrchestratorConfig, TickReport,
};
pub use scheduler::{CycleScheduler, CycleState, TickOutcome};
pub use snapshot::CycleSnapshot;
pub use timing::TimingAllocator;
pub use types::{ApproachId, ApproachTable, Config, DetectedObject, FrameSize};
pub use zone_counter::ZoneOccupancyCounter;
