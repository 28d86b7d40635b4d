// src/snapshot.rs
//
// Read-only view of the signal state for displays and logs. Built fresh on
// every tick; holds no path back into the scheduler.

use crate::scheduler::CycleScheduler;
use crate::types::{ApproachId, ApproachTable, SignalTiming, VehicleCount};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct ApproachWait {
    pub approach: ApproachId,
    pub seconds: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSnapshot {
    pub cycle_id: u64,
    pub active_approach: ApproachId,
    pub remaining_seconds: u32,
    pub counts: ApproachTable<VehicleCount>,
    pub timings: ApproachTable<SignalTiming>,
    /// Wait until green for every approach that is currently red
    pub waits: Vec<ApproachWait>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_images: Option<ApproachTable<Option<PathBuf>>>,
}

impl CycleSnapshot {
    pub fn capture(cycle_id: u64, scheduler: &CycleScheduler) -> Self {
        Self {
            cycle_id,
            active_approach: scheduler.active_approach(),
            remaining_seconds: scheduler.remaining_seconds(),
            counts: *scheduler.counts(),
            timings: *scheduler.timings(),
            waits: scheduler
                .waits()
                .into_iter()
                .map(|(approach, seconds)| ApproachWait { approach, seconds })
                .collect(),
            annotated_images: None,
        }
    }

    pub fn with_annotated_images(mut self, images: ApproachTable<Option<PathBuf>>) -> Self {
        self.annotated_images = Some(images);
        self
    }

    /// One-line status, e.g. `GREEN 2 (12s) | 3 in 12s | 4 in 22s | 1 in 38s`
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "GREEN {} ({}s)",
            self.active_approach.get(),
            self.remaining_seconds
        );
        let mut waits = self.waits.clone();
        waits.sort_by_key(|w| w.seconds);
        for wait in waits {
            line.push_str(&format!(" | {} in {}s", wait.approach.get(), wait.seconds));
        }
        line
    }
}
