// src/timing.rs
//
// Green time proportional to traffic, with a floor.
//
//   timing = minimum + floor(count / max_count * extra_budget)
//
// The busiest approach always gets minimum + extra_budget. When nothing was
// counted anywhere every approach gets the floor.

use crate::error::{Result, SignalError};
use crate::types::{ApproachId, ApproachTable, SignalTiming, TimingConfig, VehicleCount};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct TimingAllocator {
    minimum_seconds: u32,
    extra_budget_seconds: u32,
}

impl Default for TimingAllocator {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

impl TimingAllocator {
    pub fn new(config: TimingConfig) -> Self {
        Self {
            minimum_seconds: config.minimum_seconds,
            extra_budget_seconds: config.extra_budget_seconds,
        }
    }

    pub fn minimum_seconds(&self) -> u32 {
        self.minimum_seconds
    }

    pub fn maximum_seconds(&self) -> u32 {
        self.minimum_seconds.saturating_add(self.extra_budget_seconds)
    }

    pub fn allocate(&self, counts: &ApproachTable<VehicleCount>) -> ApproachTable<SignalTiming> {
        let max_count = counts.values().copied().max().unwrap_or(0);

        let timings = counts.map(|_, &count| self.timing_for(count, max_count));
        debug!(
            "Allocated timings (max count {}): {:?}",
            max_count,
            timings.values().collect::<Vec<_>>()
        );
        timings
    }

    /// Allocate from a loosely keyed map, e.g. counts assembled by an adapter.
    ///
    /// Fails with a configuration error unless the keys are exactly the four approaches.
    pub fn allocate_map(
        &self,
        counts: &HashMap<ApproachId, VehicleCount>,
    ) -> Result<ApproachTable<SignalTiming>> {
        let table = table_from_map(counts)?;
        Ok(self.allocate(&table))
    }

    fn timing_for(&self, count: VehicleCount, max_count: VehicleCount) -> SignalTiming {
        if max_count == 0 {
            return self.minimum_seconds;
        }
        // Integer form of floor(count / max * extra); exact for non-negative inputs
        let extra = (count as u64 * self.extra_budget_seconds as u64) / max_count as u64;
        // extra <= extra_budget_seconds, so only the addition can overflow
        self.minimum_seconds.saturating_add(extra as u32)
    }
}

pub fn table_from_map<T: Copy>(map: &HashMap<ApproachId, T>) -> Result<ApproachTable<T>> {
    if let Some(missing) = ApproachId::ALL.into_iter().find(|id| !map.contains_key(id)) {
        return Err(SignalError::configuration(format!(
            "missing entry for {missing} ({} of {} approaches present)",
            map.len(),
            ApproachId::ALL.len()
        )));
    }

    Ok(ApproachTable::from_fn(|id| map[&id]))
}
