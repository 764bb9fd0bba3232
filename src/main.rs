//! Activity Fusion Agent CLI
//!
//! Fuses motion sensor streams into windows and prints the recognized activity.

use activity_fusion_agent::{
    classifier::{InferenceError, LinearLoader},
    config::{Config, SensorSelection},
    core::{
        ActivityLabel, ActivityObserver, ActivityReport, ReportBuilder, Session, SessionConfig,
        SessionError, ACTIVITY_LABELS,
    },
    source::{synthetic::SyntheticConfig, SyntheticSource, NUM_AXES},
    telemetry::create_shared_log_with_persistence,
    VERSION,
};
use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-fusion")]
#[command(version = VERSION)]
#[command(about = "Multi-sensor fusion and activity recognition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start fusing sensor data and recognizing activities
    Run {
        /// Sensors to fuse (accelerometer or full)
        #[arg(long)]
        sensors: Option<SensorSelection>,

        /// Timesteps per classification window
        #[arg(long)]
        timesteps: Option<usize>,

        /// Model file (defaults to the bundled model for the sensor set)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Deliver accelerometer readings at this period (ms) instead of the
        /// common sample interval
        #[arg(long)]
        accelerometer_interval_ms: Option<u64>,

        /// Print activities as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Pause listening
    Pause,

    /// Resume listening
    Resume,

    /// Show configuration and cumulative statistics
    Status,

    /// List the activity classes
    Labels,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sensors,
            timesteps,
            model,
            duration,
            accelerometer_interval_ms,
            json,
        } => cmd_run(RunArgs {
            sensors,
            timesteps,
            model,
            duration: duration.map(Duration::from_secs),
            accelerometer_interval: accelerometer_interval_ms.map(Duration::from_millis),
            json,
        }),
        Commands::Pause => cmd_set_paused(true),
        Commands::Resume => cmd_set_paused(false),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Labels => {
            cmd_labels();
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

struct RunArgs {
    sensors: Option<SensorSelection>,
    timesteps: Option<usize>,
    model: Option<PathBuf>,
    duration: Option<Duration>,
    accelerometer_interval: Option<Duration>,
    json: bool,
}

/// Prints session notifications to the terminal.
struct ConsoleObserver {
    json: bool,
    reports: ReportBuilder,
    /// Set by the first progress notification, which `start` sends
    listening: bool,
}

impl ConsoleObserver {
    fn new(json: bool, reports: ReportBuilder) -> Self {
        Self {
            json,
            reports,
            listening: false,
        }
    }

    /// Report for a completed window. The load-failure notice sent during
    /// init arrives before any window and gets none.
    fn window_report(&mut self, label: ActivityLabel) -> Option<ActivityReport> {
        if self.listening {
            Some(self.reports.build(label))
        } else {
            None
        }
    }
}

impl ActivityObserver for ConsoleObserver {
    fn on_progress(&mut self, filled: usize, total: usize, last_values: Option<[f32; NUM_AXES]>) {
        self.listening = true;
        if self.json {
            return;
        }
        let values = match last_values {
            Some([x, y, z]) => format!("{x:6.3} {y:6.3} {z:6.3}"),
            None => String::new(),
        };
        print!("\r  {filled:>4}/{total}  {values:<24}");
        let _ = std::io::stdout().flush();
    }

    fn on_activity(&mut self, label: ActivityLabel) {
        // cmd_run reports the load failure itself
        let Some(report) = self.window_report(label) else {
            return;
        };
        if self.json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Error serializing report: {e}"),
            }
            return;
        }
        let text = match label {
            ActivityLabel::Unavailable => "(classifier unavailable)".to_string(),
            label => label.to_string(),
        };
        println!(
            "\r[{}] Window {}: {text}",
            Local::now().format("%H:%M:%S"),
            report.window_seq
        );
    }

    fn on_inference_error(&mut self, error: &InferenceError) {
        eprintln!("\rWarning: inference failed: {error}");
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(sensors) = args.sensors {
        config.sensors = sensors;
    }
    if let Some(timesteps) = args.timesteps {
        config.num_timesteps = timesteps;
    }
    if let Some(model) = args.model {
        config.model_path = Some(model);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let sensors = config.sensors.sensor_set();

    if !args.json {
        println!("Activity Fusion Agent v{VERSION}");
        println!();
        println!(
            "  Sensors: {}",
            sensors.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
        println!("  Window: {} timesteps", config.num_timesteps);
        println!("  Sample interval: {}ms", config.sample_interval.as_millis());
        println!("  Model: {}", config.model_description());
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    let telemetry = create_shared_log_with_persistence(config.telemetry_path());

    let source = SyntheticSource::new(SyntheticConfig {
        interval: config.sample_interval,
        accelerometer_interval: args.accelerometer_interval,
        channel_capacity: config.channel_capacity,
    });

    let observer = ConsoleObserver::new(
        args.json,
        ReportBuilder::new(&sensors, config.num_timesteps),
    );

    let mut session = Session::new(
        SessionConfig::new(sensors.clone(), config.num_timesteps),
        source,
    )?
    .with_observer(Box::new(observer))
    .with_telemetry(Arc::clone(&telemetry));

    let loader = LinearLoader::for_sensors(&sensors);
    match &config.model_path {
        Some(path) => session.init_from_path(&loader, path)?,
        None => session.init(&loader, config.sensors.bundled_model())?,
    }
    if !session.is_classifier_available() {
        eprintln!("Warning: model could not be loaded; activities will be reported as unavailable");
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    // Support pause/resume from another process by polling the config file.
    let mut paused = config.paused;
    let mut last_config_check = Instant::now();
    let deadline = args.duration.map(|d| Instant::now() + d);

    if paused {
        println!("Listening is currently paused.");
        println!("Run `activity-fusion resume` to start.");
        println!();
    } else {
        session.start()?;
    }

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!();
                        println!("Pausing...");
                        session.stop()?;
                    } else {
                        println!();
                        println!("Resuming...");
                        session.start()?;
                    }
                }
            }
            last_config_check = Instant::now();
        }

        if paused {
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        match session.poll(Duration::from_millis(100)) {
            Ok(_) => {}
            // Already logged and counted by the session
            Err(SessionError::Feed(_)) => {}
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    println!();
    println!("Stopping...");
    session.close();

    if let Err(e) = telemetry.save() {
        eprintln!("Warning: Could not save telemetry: {e}");
    }

    println!();
    println!("{}", telemetry.summary());
    Ok(())
}

fn cmd_set_paused(paused: bool) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.paused = paused;
    config.save().context("saving configuration")?;
    if paused {
        println!("Listening paused. Use 'activity-fusion resume' to continue.");
    } else {
        println!("Listening resumed.");
    }
    Ok(())
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Activity Fusion Agent Status");
    println!("============================");
    println!();
    println!("Configuration:");
    println!("  Sensors: {}", config.sensors);
    println!("  Window: {} timesteps", config.num_timesteps);
    println!("  Model: {}", config.model_description());
    println!("  Paused: {}", config.paused);
    println!();

    let stats_path = config.telemetry_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("samples_received", "Samples fused"),
                    ("samples_dropped", "Duplicate samples dropped"),
                    ("windows_completed", "Windows completed"),
                    ("inferences", "Windows classified"),
                    ("inference_failures", "Inference failures"),
                    ("unavailable_windows", "Windows without classifier"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous run data found.");
    }
}

fn cmd_labels() {
    for (index, name) in ACTIVITY_LABELS.iter().enumerate() {
        println!("{index}  {name}");
    }
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
