//! Demonstration of windowed activity recognition.
//!
//! This example shows how to:
//! 1. Create a synthetic sensor source
//! 2. Load the bundled linear model into a session
//! 3. Fuse readings into windows and receive activities
//!
//! Run with: cargo run --example fusion_demo

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use activity_fusion_agent::{
    classifier::{LinearLoader, BUNDLED_FULL_MODEL},
    core::{ActivityLabel, ActivityObserver, SensorSet, Session, SessionConfig},
    source::{synthetic::SyntheticConfig, SyntheticSource, NUM_AXES},
};

struct PrintObserver;

impl ActivityObserver for PrintObserver {
    fn on_progress(&mut self, filled: usize, total: usize, last_values: Option<[f32; NUM_AXES]>) {
        if let Some([x, y, z]) = last_values {
            if filled % 16 == 0 {
                println!("  {filled:>3}/{total}  {x:6.3} {y:6.3} {z:6.3}");
            }
        }
    }

    fn on_activity(&mut self, label: ActivityLabel) {
        println!("Activity: {label}");
    }
}

fn main() {
    println!("Activity Fusion Agent - Fusion Demo");
    println!("===================================");
    println!();

    let sensors = SensorSet::full();
    let loader = LinearLoader::for_sensors(&sensors);
    let source = SyntheticSource::new(SyntheticConfig {
        interval: Duration::from_millis(5),
        // Accelerometer runs faster; surplus readings are dropped per timestep
        accelerometer_interval: Some(Duration::from_millis(2)),
        ..SyntheticConfig::default()
    });

    let mut session = match Session::new(SessionConfig::new(sensors, 128), source) {
        Ok(session) => session.with_observer(Box::new(PrintObserver)),
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    if let Err(e) = session.init(&loader, BUNDLED_FULL_MODEL) {
        eprintln!("Failed to initialize: {e}");
        return;
    }
    if let Err(e) = session.start() {
        eprintln!("Failed to start: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    println!("Running for 5 seconds (Ctrl+C to stop early)...");
    println!();

    let deadline = Instant::now() + Duration::from_secs(5);
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        if let Err(e) = session.poll(Duration::from_millis(50)) {
            eprintln!("Poll error: {e}");
        }
    }

    session.close();

    println!();
    println!("{}", session.telemetry().summary());
}
