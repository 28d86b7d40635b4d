// src/pipeline/event_bus.rs
//
// Decoupled event queue. The orchestrator publishes what happened on each
// step; the driver drains it to log, display or persist.

use crate::types::{ApproachId, ApproachTable, SignalTiming, VehicleCount};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    CycleStarted {
        cycle_id: u64,
        counts: ApproachTable<VehicleCount>,
        timings: ApproachTable<SignalTiming>,
    },

    PhaseChanged {
        cycle_id: u64,
        from: ApproachId,
        to: ApproachId,
        green_seconds: SignalTiming,
    },

    CycleCompleted {
        cycle_id: u64,
        /// Clock ticks elapsed in the round; advance() steps are not counted
        ticks: u64,
    },

    /// A new cycle could not start; the previous one keeps running
    CycleStartFailed {
        reason: String,
        kept_cycle_id: Option<u64>,
    },
}

pub struct EventBus {
    events: VecDeque<ControllerEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: ControllerEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<ControllerEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
