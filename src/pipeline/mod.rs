// src/pipeline/mod.rs

pub mod event_bus;
pub mod metrics;

pub use event_bus::{ControllerEvent, EventBus};
pub use metrics::{ControllerMetrics, MetricsSummary};
