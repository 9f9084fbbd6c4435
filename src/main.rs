use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use repcam::profile::ProfileRegistry;
use repcam::source::{demo_script, load_script};
use repcam::{RepcamConfig, RepcamOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "repcam")]
#[command(about = "Rust-based exercise repetition counter driven by pose keypoint streams")]
#[command(version)]
#[command(long_about = "Counts exercise repetitions in real time from a stream of body \
keypoints produced by an external pose-estimation model. Converts per-frame joint \
coordinates into angle or displacement signals, classifies them against exercise-specific \
thresholds, and logs completed workouts to a durable history store.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "repcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Exercise to count (squats, bicep-curls, pushups, situps)
    #[arg(short, long, help = "Exercise identifier for the workout session")]
    exercise: Option<String>,

    /// Replay a recorded keypoint script instead of a live pose source
    #[arg(short, long, value_name = "FILE", help = "JSON file of recorded keypoint frames")]
    replay: Option<PathBuf>,

    /// Restart the replay from the beginning when it ends
    #[arg(long, help = "Loop the replay script indefinitely")]
    loop_replay: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting Repcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let mut config = match RepcamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Apply CLI overrides
    if let Some(exercise) = &args.exercise {
        config.session.default_exercise = exercise.clone();
    }
    if args.loop_replay {
        config.source.loop_replay = true;
    }

    // Validate configuration if requested
    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;
    info!("Repcam configuration loaded and validated");

    // Build the keypoint script: recorded replay, or a synthetic demo
    let script = match &args.replay {
        Some(path) => load_script(path).await.map_err(|e| {
            error!("Failed to load replay script: {}", e);
            e
        })?,
        None => {
            warn!(
                "No replay file supplied - generating a synthetic demo for '{}'",
                config.session.default_exercise
            );
            let profiles = ProfileRegistry::with_builtins();
            let lookup = profiles.lookup(&config.session.default_exercise);
            demo_script(&lookup.profile, 5)
        }
    };

    // Create and initialize the orchestrator
    let mut orchestrator = RepcamOrchestrator::from_script(config, script).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    // Handle dry run mode
    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    // Start all components
    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    // Run the main application loop with signal handling
    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Repcam exited with code: {}", exit_code);

    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repcam={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Repcam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", RepcamConfig::default().to_toml()?);
    Ok(())
}
