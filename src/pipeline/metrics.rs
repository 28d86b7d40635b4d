// src/pipeline/metrics.rs
//
// Controller observability: counters for cycles, ticks and detections.
// Cheap to clone and share with a display thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ControllerMetrics {
    pub cycles_started: Arc<AtomicU64>,
    pub cycle_start_failures: Arc<AtomicU64>,
    pub ticks: Arc<AtomicU64>,
    pub phase_changes: Arc<AtomicU64>,
    pub vehicles_counted: Arc<AtomicU64>,
    pub detection_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self {
            cycles_started: Arc::new(AtomicU64::new(0)),
            cycle_start_failures: Arc::new(AtomicU64::new(0)),
            ticks: Arc::new(AtomicU64::new(0)),
            phase_changes: Arc::new(AtomicU64::new(0)),
            vehicles_counted: Arc::new(AtomicU64::new(0)),
            detection_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycle_start_failures: self.cycle_start_failures.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            phase_changes: self.phase_changes.load(Ordering::Relaxed),
            vehicles_counted: self.vehicles_counted.load(Ordering::Relaxed),
            last_detection_us: self.detection_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub cycles_started: u64,
    pub cycle_start_failures: u64,
    pub ticks: u64,
    pub phase_changes: u64,
    pub vehicles_counted: u64,
    pub last_detection_us: u64,
    pub elapsed_secs: f64,
}
