// src/orchestrator.rs
//
// Composes the cycle:
//
//   ImageSource → 4 images → VehicleDetector → ZoneOccupancyCounter → counts
//       → TimingAllocator → timings → CycleScheduler (replaced atomically)
//
// The orchestrator holds the only CycleScheduler. A failed cycle start never
// touches it, so the previous cycle keeps advancing. When a tick completes a
// full round, a fresh detection cycle is requested before the next tick.

use crate::annotate;
use crate::detector::VehicleDetector;
use crate::error::{Result, SignalError};
use crate::image_source::ImageSource;
use crate::pipeline::{ControllerEvent, ControllerMetrics, EventBus};
use crate::scheduler::{CycleScheduler, TickOutcome};
use crate::snapshot::CycleSnapshot;
use crate::timing::TimingAllocator;
use crate::types::{
    ApproachId, ApproachTable, Config, DetectedObject, FrameSize, SignalTiming, TimingConfig,
    VehicleCount, APPROACH_COUNT,
};
use crate::zone_counter::{ZoneCounterConfig, ZoneOccupancyCounter};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

/// One approach's image after detection.
#[derive(Debug, Clone)]
pub struct ApproachObservation {
    pub image: Option<PathBuf>,
    pub frame: FrameSize,
    pub detections: Vec<DetectedObject>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub counts: ApproachTable<VehicleCount>,
    pub timings: ApproachTable<SignalTiming>,
    pub images: ApproachTable<Option<PathBuf>>,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Set when this step completed a round and fresh detection succeeded
    pub new_cycle: Option<CycleReport>,
    /// State after the step, including any new cycle
    pub snapshot: CycleSnapshot,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub timing: TimingConfig,
    pub counter: ZoneCounterConfig,
    /// Where annotated approach images go; `None` disables them
    pub annotated_dir: Option<PathBuf>,
    pub max_pending_events: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            counter: ZoneCounterConfig::default(),
            annotated_dir: None,
            max_pending_events: 256,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            timing: config.timing,
            counter: ZoneCounterConfig {
                vehicle_class_ids: config.detection.vehicle_class_ids.clone(),
            },
            annotated_dir: config
                .output
                .save_annotated
                .then(|| PathBuf::from(&config.output.annotated_dir)),
            ..Self::default()
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct CycleOrchestrator<S, D> {
    config: OrchestratorConfig,
    counter: ZoneOccupancyCounter,
    allocator: TimingAllocator,
    source: S,
    detector: D,
    scheduler: Option<CycleScheduler>,
    cycle_id: u64,
    cycle_ticks: u64,
    annotated: ApproachTable<Option<PathBuf>>,
    events: EventBus,
    metrics: ControllerMetrics,
}

impl<S: ImageSource, D: VehicleDetector> CycleOrchestrator<S, D> {
    pub fn new(config: OrchestratorConfig, source: S, detector: D) -> Self {
        Self {
            counter: ZoneOccupancyCounter::new(config.counter.clone()),
            allocator: TimingAllocator::new(config.timing),
            events: EventBus::new(config.max_pending_events),
            config,
            source,
            detector,
            scheduler: None,
            cycle_id: 0,
            cycle_ticks: 0,
            annotated: ApproachTable::default(),
            metrics: ControllerMetrics::new(),
        }
    }

    /// Count, allocate and start a new cycle from four already-detected images.
    ///
    /// Observations are assigned to approaches 1..4 in the order given. On any
    /// error the running cycle, if one exists, is left exactly as it was.
    pub fn run_cycle(&mut self, observations: Vec<ApproachObservation>) -> Result<CycleReport> {
        let result = self.start_cycle(observations);
        if let Err(e) = &result {
            self.record_failure(e);
        }
        result
    }

    /// Pull fresh images, detect, and start a new cycle.
    pub fn request_new_cycle(&mut self) -> Result<CycleReport> {
        match self.collect_observations() {
            Ok(observations) => {
                let report = self.run_cycle(observations)?;
                self.annotate(&report);
                Ok(report)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Advance the signal by one second.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.metrics.inc(&self.metrics.ticks);
        self.step(CycleScheduler::tick, 1)
    }

    /// Cut the current green short and hand over to the next approach.
    pub fn advance(&mut self) -> Result<TickReport> {
        self.step(CycleScheduler::advance, 0)
    }

    pub fn scheduler(&self) -> Option<&CycleScheduler> {
        self.scheduler.as_ref()
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn wait_until_green(&self, target: ApproachId) -> Option<u32> {
        self.scheduler.as_ref().map(|s| s.wait_until_green(target))
    }

    pub fn snapshot(&self) -> Option<CycleSnapshot> {
        self.scheduler.as_ref().map(|scheduler| {
            let snapshot = CycleSnapshot::capture(self.cycle_id, scheduler);
            if self.config.annotated_dir.is_some() {
                snapshot.with_annotated_images(self.annotated.clone())
            } else {
                snapshot
            }
        })
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        self.events.drain()
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    fn collect_observations(&mut self) -> Result<Vec<ApproachObservation>> {
        let images = self.source.next_images(APPROACH_COUNT)?;
        let started = Instant::now();

        let mut observations = Vec::with_capacity(images.len());
        for (index, path) in images.into_iter().enumerate() {
            let approach = ApproachId::from_index(index).ok_or_else(|| {
                SignalError::configuration(format!(
                    "image source returned more than {APPROACH_COUNT} images"
                ))
            })?;

            let detections = self
                .detector
                .detect(&path)
                .map_err(|e| SignalError::detection(approach, format!("{e:#}")))?;

            observations.push(ApproachObservation {
                image: Some(path),
                frame: detections.frame,
                detections: detections.objects,
            });
        }

        self.metrics.set_timing(
            &self.metrics.detection_time_us,
            started.elapsed().as_micros() as u64,
        );
        Ok(observations)
    }

    fn start_cycle(&mut self, observations: Vec<ApproachObservation>) -> Result<CycleReport> {
        if observations.len() > APPROACH_COUNT {
            return Err(SignalError::configuration(format!(
                "expected {} approach images, got {}",
                APPROACH_COUNT,
                observations.len()
            )));
        }

        let usable = observations.iter().filter(|o| o.frame.is_valid()).count();
        if usable < APPROACH_COUNT {
            return Err(SignalError::InsufficientInput {
                needed: APPROACH_COUNT,
                found: usable,
            });
        }

        let counts = ApproachTable::from_fn(|id| {
            let obs = &observations[id.index()];
            self.counter.count(obs.frame, &obs.detections)
        });
        let timings = self.allocator.allocate(&counts);
        let scheduler = CycleScheduler::new(counts, timings)?;
        let round = scheduler.cycle_length();

        // Commit: everything below is infallible
        self.scheduler = Some(scheduler);
        self.cycle_id += 1;
        self.cycle_ticks = 0;
        self.annotated = ApproachTable::default();

        let images = ApproachTable::from_fn(|id| observations[id.index()].image.clone());
        for (id, count) in counts.iter() {
            info!("  {}: {} vehicle(s) -> {}s green", id, count, timings[id]);
        }
        info!(
            "🚦 Cycle {} started ({}s round)",
            self.cycle_id, round
        );

        self.metrics.inc(&self.metrics.cycles_started);
        self.metrics
            .add(&self.metrics.vehicles_counted, counts.values().map(|&c| c as u64).sum());
        self.events.publish(ControllerEvent::CycleStarted {
            cycle_id: self.cycle_id,
            counts,
            timings,
        });

        Ok(CycleReport {
            cycle_id: self.cycle_id,
            counts,
            timings,
            images,
        })
    }

    /// `elapsed` is the number of clock seconds the step represents.
    fn step(
        &mut self,
        advance: fn(&mut CycleScheduler) -> TickOutcome,
        elapsed: u64,
    ) -> Result<TickReport> {
        let scheduler = self
            .scheduler
            .as_mut()
            .ok_or_else(|| SignalError::configuration("no cycle has been started"))?;

        let previous = scheduler.active_approach();
        let outcome = advance(scheduler);
        self.cycle_ticks += elapsed;

        if outcome.transitioned {
            self.metrics.inc(&self.metrics.phase_changes);
            self.events.publish(ControllerEvent::PhaseChanged {
                cycle_id: self.cycle_id,
                from: previous,
                to: outcome.active_approach,
                green_seconds: outcome.remaining_seconds,
            });
        }

        let mut new_cycle = None;
        if outcome.cycle_complete {
            info!("✓ Cycle {} complete, re-detecting", self.cycle_id);
            self.events.publish(ControllerEvent::CycleCompleted {
                cycle_id: self.cycle_id,
                ticks: self.cycle_ticks,
            });
            self.cycle_ticks = 0;

            match self.request_new_cycle() {
                Ok(report) => new_cycle = Some(report),
                Err(e) => warn!("Keeping cycle {}: {}", self.cycle_id, e),
            }
        }

        let snapshot = self
            .snapshot()
            .ok_or_else(|| SignalError::configuration("no cycle has been started"))?;

        Ok(TickReport {
            outcome,
            new_cycle,
            snapshot,
        })
    }

    fn annotate(&mut self, report: &CycleReport) {
        let Some(dir) = self.config.annotated_dir.clone() else {
            return;
        };

        for (id, image) in report.images.iter() {
            let Some(image) = image else { continue };
            match annotate::write_annotated(image, &dir) {
                Ok(path) => self.annotated[id] = Some(path),
                Err(e) => warn!("Could not annotate {} image: {:#}", id, e),
            }
        }
    }

    fn record_failure(&mut self, error: &SignalError) {
        self.metrics.inc(&self.metrics.cycle_start_failures);
        let kept_cycle_id = self.scheduler.as_ref().map(|_| self.cycle_id);
        warn!("Cycle start failed: {}", error);
        self.events.publish(ControllerEvent::CycleStartFailed {
            reason: error.to_string(),
            kept_cycle_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ImageDetections;
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;

    /// Hands out queued batches of image paths, one batch per cycle.
    struct QueuedSource {
        batches: VecDeque<Vec<PathBuf>>,
    }

    impl QueuedSource {
        fn new(batches: Vec<Vec<&str>>) -> Self {
            Self {
                batches: batches
                    .into_iter()
                    .map(|b| b.into_iter().map(PathBuf::from).collect())
                    .collect(),
            }
        }
    }

    impl ImageSource for QueuedSource {
        fn next_images(&mut self, count: usize) -> Result<Vec<PathBuf>> {
            let batch = self.batches.pop_front().unwrap_or_default();
            if batch.len() < count {
                return Err(SignalError::InsufficientInput {
                    needed: count,
                    found: batch.len(),
                });
            }
            Ok(batch)
        }
    }

    /// Places `n` cars in the zone for each known image; unknown images fail.
    struct ScriptedDetector {
        cars: HashMap<PathBuf, u32>,
    }

    impl ScriptedDetector {
        fn new(cars: &[(&str, u32)]) -> Self {
            Self {
                cars: cars.iter().map(|(p, n)| (PathBuf::from(p), *n)).collect(),
            }
        }
    }

    impl VehicleDetector for ScriptedDetector {
        fn detect(&mut self, image: &Path) -> anyhow::Result<ImageDetections> {
            let n = *self
                .cars
                .get(image)
                .ok_or_else(|| anyhow::anyhow!("cannot read {}", image.display()))?;
            Ok(ImageDetections {
                frame: FrameSize::new(640, 480),
                objects: (0..n).map(|_| in_zone_car()).collect(),
            })
        }
    }

    fn in_zone_car() -> DetectedObject {
        DetectedObject {
            class_id: 2,
            bbox: [100.0, 300.0, 200.0, 400.0],
            confidence: 0.9,
        }
    }

    fn observation(cars: usize) -> ApproachObservation {
        ApproachObservation {
            image: None,
            frame: FrameSize::new(640, 480),
            detections: vec![in_zone_car(); cars],
        }
    }

    fn orchestrator(
        source: QueuedSource,
        detector: ScriptedDetector,
    ) -> CycleOrchestrator<QueuedSource, ScriptedDetector> {
        CycleOrchestrator::new(OrchestratorConfig::default(), source, detector)
    }

    fn idle() -> CycleOrchestrator<QueuedSource, ScriptedDetector> {
        orchestrator(QueuedSource::new(vec![]), ScriptedDetector::new(&[]))
    }

    fn id(ordinal: u8) -> ApproachId {
        ApproachId::new(ordinal).unwrap()
    }

    #[test]
    fn test_run_cycle_reference_scenario() {
        let mut orch = idle();
        let report = orch
            .run_cycle(vec![observation(5), observation(10), observation(0), observation(3)])
            .unwrap();

        assert_eq!(report.counts, ApproachTable::new([5, 10, 0, 3]));
        assert_eq!(report.timings, ApproachTable::new([20, 30, 10, 16]));
        assert_eq!(orch.cycle_id(), 1);

        let scheduler = orch.scheduler().unwrap();
        assert_eq!(scheduler.active_approach(), id(1));
        assert_eq!(scheduler.remaining_seconds(), 20);
        assert_eq!(orch.wait_until_green(id(3)), Some(50));
    }

    #[test]
    fn test_insufficient_images_leave_state_unchanged() {
        let mut orch = idle();
        orch.run_cycle(vec![observation(5), observation(10), observation(0), observation(3)])
            .unwrap();
        for _ in 0..7 {
            orch.tick().unwrap();
        }
        let before = orch.scheduler().unwrap().state().clone();

        let err = orch
            .run_cycle(vec![observation(1), observation(1), observation(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientInput {
                needed: 4,
                found: 3
            }
        ));
        assert_eq!(orch.scheduler().unwrap().state(), &before);
        assert_eq!(orch.cycle_id(), 1);
    }

    #[test]
    fn test_invalid_frame_is_not_usable() {
        let mut orch = idle();
        let mut broken = observation(2);
        broken.frame = FrameSize::new(0, 480);

        let err = orch
            .run_cycle(vec![observation(1), broken, observation(1), observation(1)])
            .unwrap_err();
        assert!(matches!(err, SignalError::InsufficientInput { found: 3, .. }));
        assert!(orch.scheduler().is_none());
    }

    #[test]
    fn test_too_many_images_is_a_configuration_error() {
        let mut orch = idle();
        let err = orch.run_cycle(vec![observation(1); 5]).unwrap_err();
        assert!(matches!(err, SignalError::Configuration(_)));
    }

    #[test]
    fn test_request_new_cycle_assigns_images_in_order() {
        let source = QueuedSource::new(vec![vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg"]]);
        let detector =
            ScriptedDetector::new(&[("a.jpg", 0), ("b.jpg", 4), ("c.jpg", 2), ("d.jpg", 1)]);
        let mut orch = orchestrator(source, detector);

        let report = orch.request_new_cycle().unwrap();
        assert_eq!(report.counts, ApproachTable::new([0, 4, 2, 1]));
        assert_eq!(report.timings, ApproachTable::new([10, 30, 20, 15]));
        assert_eq!(report.images[id(2)], Some(PathBuf::from("b.jpg")));
    }

    #[test]
    fn test_detection_failure_fails_whole_cycle() {
        let source = QueuedSource::new(vec![vec!["a.jpg", "b.jpg", "missing.jpg", "d.jpg"]]);
        let detector = ScriptedDetector::new(&[("a.jpg", 3), ("b.jpg", 4), ("d.jpg", 1)]);
        let mut orch = orchestrator(source, detector);

        let err = orch.request_new_cycle().unwrap_err();
        match err {
            SignalError::Detection { approach, message } => {
                assert_eq!(approach, id(3));
                assert!(message.contains("missing.jpg"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(orch.scheduler().is_none());

        let events = orch.drain_events();
        assert!(matches!(
            events.as_slice(),
            [ControllerEvent::CycleStartFailed {
                kept_cycle_id: None,
                ..
            }]
        ));
    }

    #[test]
    fn test_tick_before_any_cycle_is_an_error() {
        let mut orch = idle();
        assert!(matches!(orch.tick(), Err(SignalError::Configuration(_))));
    }

    #[test]
    fn test_completed_round_triggers_fresh_detection() {
        let source = QueuedSource::new(vec![
            vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg"],
            vec!["e.jpg", "f.jpg", "g.jpg", "h.jpg"],
        ]);
        let detector = ScriptedDetector::new(&[
            ("a.jpg", 0),
            ("b.jpg", 0),
            ("c.jpg", 0),
            ("d.jpg", 0),
            ("e.jpg", 2),
            ("f.jpg", 0),
            ("g.jpg", 0),
            ("h.jpg", 1),
        ]);
        let mut orch = orchestrator(source, detector);
        orch.request_new_cycle().unwrap();

        // All-floor round: 40 ticks, only the last completes it
        for _ in 0..39 {
            let report = orch.tick().unwrap();
            assert!(!report.outcome.cycle_complete);
            assert!(report.new_cycle.is_none());
        }
        let report = orch.tick().unwrap();
        assert!(report.outcome.cycle_complete);

        let new_cycle = report.new_cycle.expect("fresh cycle");
        assert_eq!(new_cycle.cycle_id, 2);
        assert_eq!(new_cycle.timings, ApproachTable::new([30, 10, 10, 20]));
        assert_eq!(report.snapshot.cycle_id, 2);
        assert_eq!(report.snapshot.active_approach, id(1));
        assert_eq!(report.snapshot.remaining_seconds, 30);

        let events = orch.drain_events();
        let phase_changes = events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::PhaseChanged { .. }))
            .count();
        assert_eq!(phase_changes, 4);
        assert!(events
            .iter()
            .any(|e| matches!(e, ControllerEvent::CycleCompleted { cycle_id: 1, ticks: 40 })));
        assert!(matches!(
            events.last(),
            Some(ControllerEvent::CycleStarted { cycle_id: 2, .. })
        ));
    }

    #[test]
    fn test_failed_refresh_keeps_previous_cycle_running() {
        // Only one batch: the refresh after the first round finds no images
        let source = QueuedSource::new(vec![vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg"]]);
        let detector =
            ScriptedDetector::new(&[("a.jpg", 1), ("b.jpg", 0), ("c.jpg", 0), ("d.jpg", 0)]);
        let mut orch = orchestrator(source, detector);
        orch.request_new_cycle().unwrap();
        let timings = *orch.scheduler().unwrap().timings();
        let round = orch.scheduler().unwrap().cycle_length();

        let mut last = None;
        for _ in 0..round {
            last = Some(orch.tick().unwrap());
        }
        let last = last.unwrap();
        assert!(last.outcome.cycle_complete);
        assert!(last.new_cycle.is_none());

        // Old timings keep running from approach 1
        assert_eq!(orch.cycle_id(), 1);
        assert_eq!(orch.scheduler().unwrap().timings(), &timings);
        assert_eq!(orch.scheduler().unwrap().remaining_seconds(), 30);
        assert!(orch.tick().is_ok());

        assert!(orch
            .drain_events()
            .iter()
            .any(|e| matches!(e, ControllerEvent::CycleStartFailed { kept_cycle_id: Some(1), .. })));
        assert_eq!(orch.metrics().summary().cycle_start_failures, 1);
    }

    #[test]
    fn test_advance_publishes_phase_change() {
        let mut orch = idle();
        orch.run_cycle(vec![observation(5), observation(10), observation(0), observation(3)])
            .unwrap();
        orch.drain_events();

        let report = orch.advance().unwrap();
        assert_eq!(report.outcome.active_approach, id(2));
        assert_eq!(report.snapshot.remaining_seconds, 30);
        assert!(matches!(
            orch.drain_events().as_slice(),
            [ControllerEvent::PhaseChanged { green_seconds: 30, .. }]
        ));
    }

    #[test]
    fn test_completed_round_reports_only_clock_ticks() {
        let mut orch = idle();
        orch.run_cycle(vec![observation(5), observation(10), observation(0), observation(3)])
            .unwrap();
        for _ in 0..5 {
            orch.tick().unwrap();
        }
        for _ in 0..3 {
            orch.advance().unwrap();
        }
        let report = orch.advance().unwrap();
        assert!(report.outcome.cycle_complete);

        assert!(orch
            .drain_events()
            .iter()
            .any(|e| matches!(e, ControllerEvent::CycleCompleted { cycle_id: 1, ticks: 5 })));
    }
}
