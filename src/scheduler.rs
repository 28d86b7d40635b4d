// src/scheduler.rs
//
// Round-robin green phase state machine.
//
// One approach is green at a time; every other approach is implicitly red
// (no yellow/clearance interval). The machine is advanced by an external
// clock calling tick() once per elapsed second and never sleeps itself.
//
// Tick semantics:
//   - remaining is decremented by one
//   - when that exhausts the phase, the same tick hands green to the next
//     approach with its full timing
//   - handing green back to approach 1 completes a cycle
//
// A phase with timing T therefore lasts exactly T ticks, a full cycle lasts
// sum(timings) ticks, and wait_until_green() is the exact number of ticks
// until the target turns green.

use crate::error::{Result, SignalError};
use crate::types::{ApproachId, ApproachTable, SignalTiming, VehicleCount};
use tracing::debug;

/// Authoritative signal state for one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    pub active_approach: ApproachId,
    pub remaining_seconds: u32,
    pub timings: ApproachTable<SignalTiming>,
    pub counts: ApproachTable<VehicleCount>,
}

/// Result of one tick or advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub active_approach: ApproachId,
    pub remaining_seconds: u32,
    /// Green moved to a new approach on this step
    pub transitioned: bool,
    /// Green returned to approach 1; a fresh detection cycle is due
    pub cycle_complete: bool,
}

#[derive(Debug, Clone)]
pub struct CycleScheduler {
    state: CycleState,
}

impl CycleScheduler {
    /// Start a cycle with approach 1 green for its full timing.
    pub fn new(
        counts: ApproachTable<VehicleCount>,
        timings: ApproachTable<SignalTiming>,
    ) -> Result<Self> {
        if let Some((id, _)) = timings.iter().find(|(_, t)| **t == 0) {
            return Err(SignalError::configuration(format!(
                "green time for {id} must be positive"
            )));
        }
        // Bounds cycle_length() and every wait_until_green()
        if timings
            .values()
            .try_fold(0u32, |total, &t| total.checked_add(t))
            .is_none()
        {
            return Err(SignalError::configuration(
                "total round length does not fit in u32 seconds",
            ));
        }

        let first = ApproachId::first();
        Ok(Self {
            state: CycleState {
                active_approach: first,
                remaining_seconds: timings[first],
                timings,
                counts,
            },
        })
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn active_approach(&self) -> ApproachId {
        self.state.active_approach
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.state.remaining_seconds
    }

    pub fn timings(&self) -> &ApproachTable<SignalTiming> {
        &self.state.timings
    }

    pub fn counts(&self) -> &ApproachTable<VehicleCount> {
        &self.state.counts
    }

    /// Ticks needed for one full round through all approaches.
    pub fn cycle_length(&self) -> u32 {
        self.state.timings.values().sum()
    }

    /// Advance by one elapsed second.
    pub fn tick(&mut self) -> TickOutcome {
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);

        if self.state.remaining_seconds > 0 {
            return self.outcome(false, false);
        }

        self.transition()
    }

    /// End the active green now and hand over to the next approach.
    pub fn advance(&mut self) -> TickOutcome {
        self.transition()
    }

    fn transition(&mut self) -> TickOutcome {
        let previous = self.state.active_approach;
        let next = previous.next();

        self.state.active_approach = next;
        self.state.remaining_seconds = self.state.timings[next];

        let cycle_complete = next == ApproachId::first();
        debug!(
            "Green {} -> {} ({}s){}",
            previous,
            next,
            self.state.remaining_seconds,
            if cycle_complete { ", cycle complete" } else { "" }
        );

        self.outcome(true, cycle_complete)
    }

    fn outcome(&self, transitioned: bool, cycle_complete: bool) -> TickOutcome {
        TickOutcome {
            active_approach: self.state.active_approach,
            remaining_seconds: self.state.remaining_seconds,
            transitioned,
            cycle_complete,
        }
    }

    /// Seconds until `target` turns green; 0 if it is green now.
    ///
    /// Remaining time of the active approach plus the full timing of every
    /// approach strictly between the active one and `target`, walking forward
    /// 1 -> 2 -> 3 -> 4 -> 1.
    pub fn wait_until_green(&self, target: ApproachId) -> u32 {
        let active = self.state.active_approach;
        if target == active {
            return 0;
        }

        let mut wait = self.state.remaining_seconds;
        let mut between = active.next();
        while between != target {
            wait += self.state.timings[between];
            between = between.next();
        }
        wait
    }

    /// Wait for every approach that is currently red.
    pub fn waits(&self) -> Vec<(ApproachId, u32)> {
        ApproachId::ALL
            .into_iter()
            .filter(|&id| id != self.state.active_approach)
            .map(|id| (id, self.wait_until_green(id)))
            .collect()
    }
}
