// src/main.rs
//
// Driver: the clock source and console display for the controller core.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Duration;
use tokio::time::Interval;
use tracing::{debug, error, info, warn};
use traffic_signal_controller::pipeline::ControllerEvent;
use traffic_signal_controller::{
    Config, CycleOrchestrator, CycleReport, DirectoryImageSource, OrchestratorConfig,
    SidecarDetector,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("SIGNAL_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("traffic_signal_controller={}", config.logging.level).into()
            }),
        )
        .init();

    info!("🚦 Traffic Signal Controller Starting");
    info!("✓ Configuration: {}", config_path);
    info!(
        "Timing: minimum={}s, extra budget={}s, confidence >= {:.2}",
        config.timing.minimum_seconds,
        config.timing.extra_budget_seconds,
        config.detection.confidence_threshold
    );

    let source = DirectoryImageSource::new(&config.images.input_dir, config.images.seed);
    let detector = SidecarDetector::new(config.detection.confidence_threshold);
    let mut orchestrator =
        CycleOrchestrator::new(OrchestratorConfig::from(&config), source, detector);

    let mut events_file = match &config.output.events_path {
        Some(path) => Some(open_events_file(path)?),
        None => None,
    };

    // Step 1: detect vehicles and decide timings for the first cycle
    let report = orchestrator
        .request_new_cycle()
        .context("Failed to start the first cycle")?;
    print_report(&report);
    write_events(&mut orchestrator, events_file.as_mut())?;

    // Step 2: run the signal, one tick per interval
    let mut interval = tokio::time::interval(Duration::from_millis(config.driver.tick_interval_ms));
    interval.tick().await; // first tick completes immediately

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, stopping"),
            Err(e) => {
                warn!("Cannot listen for Ctrl-C, running until max_cycles: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    let mut completed_cycles = 0u64;
    drive(&mut interval, shutdown, || {
        let tick = match orchestrator.tick() {
            Ok(tick) => tick,
            Err(e) => {
                error!("Tick failed: {}", e);
                return Ok(ControlFlow::Break(()));
            }
        };

        debug!("{}", tick.snapshot.status_line());
        if tick.outcome.transitioned {
            info!("{}", tick.snapshot.status_line());
        }
        if let Some(report) = &tick.new_cycle {
            print_report(report);
        }
        write_events(&mut orchestrator, events_file.as_mut())?;

        if tick.outcome.cycle_complete {
            completed_cycles += 1;
            if config.driver.max_cycles > 0 && completed_cycles >= config.driver.max_cycles {
                info!("Completed {} cycle(s), stopping", completed_cycles);
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    })
    .await?;

    let summary = orchestrator.metrics().summary();
    info!("\n========================================");
    info!("  Cycles started: {}", summary.cycles_started);
    info!("  Cycle start failures: {}", summary.cycle_start_failures);
    info!("  Ticks: {}", summary.ticks);
    info!("  Phase changes: {}", summary.phase_changes);
    info!("  Vehicles counted: {}", summary.vehicles_counted);
    info!("  Last detection: {} us", summary.last_detection_us);
    info!("========================================");

    Ok(())
}

/// Calls `on_tick` once per interval until it breaks or `shutdown` resolves.
///
/// `shutdown` is polled across iterations, so a signal that arrives while
/// `on_tick` runs still ends the loop before the next tick.
async fn drive<F, T>(interval: &mut Interval, shutdown: F, mut on_tick: T) -> Result<()>
where
    F: Future<Output = ()>,
    T: FnMut() -> Result<ControlFlow<()>>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            _ = interval.tick() => {}
        }

        if on_tick()?.is_break() {
            return Ok(());
        }
    }
}

fn print_report(report: &CycleReport) {
    info!("\nCycle {}", report.cycle_id);
    info!(
        "Vehicle Counts: {}",
        serde_json::to_string(&report.counts).unwrap_or_default()
    );
    info!(
        "Signal Timings: {}",
        serde_json::to_string(&report.timings).unwrap_or_default()
    );
}

fn open_events_file(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open events file {}", path))?;
    info!("💾 Writing events to {}", path);
    Ok(file)
}

fn write_events<S, D>(
    orchestrator: &mut CycleOrchestrator<S, D>,
    file: Option<&mut File>,
) -> Result<()>
where
    S: traffic_signal_controller::ImageSource,
    D: traffic_signal_controller::VehicleDetector,
{
    let events = orchestrator.drain_events();

    for event in &events {
        match event {
            ControllerEvent::CycleStartFailed { reason, .. } => {
                warn!("Cycle start failed, keeping current timings: {}", reason)
            }
            other => debug!("{:?}", other),
        }
    }

    if let Some(file) = file {
        for event in &events {
            let json_line = serde_json::to_string(event)?;
            writeln!(file, "{}", json_line)?;
        }
        file.flush()?;
    }
    Ok(())
}
