//! Entropy Manager CLI
//!
//! Runs the entropy source manager as a foreground daemon: initializes
//! the compiled-in sources, spawns the startup monitor, triggers reseeds
//! as entropy accumulates, and prints sample output once the DRNG is
//! operational.

use clap::Parser;
use entropy_manager::{
    config::Config,
    drng::{DrngPool, DrngWorker},
    manager::Manager,
    sources::default_sources,
    status::{ProcessStatus, StatusSink},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "entropy-manager", version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of DRNG instances (one per node).
    #[arg(long, default_value_t = 1)]
    nodes: usize,

    /// Interval between reseed triggers, in milliseconds.
    #[arg(long, default_value_t = 250)]
    trigger_interval_ms: u64,

    /// Exit after printing sample output instead of running until
    /// interrupted.
    #[arg(long)]
    oneshot: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Entropy Manager v{}", entropy_manager::VERSION);

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    let sources = default_sources(&config);
    let drng = Arc::new(DrngPool::new(args.nodes));
    let status = Arc::new(ProcessStatus::new());

    let mgr = match Manager::initialize(
        config,
        sources,
        Arc::clone(&drng) as Arc<dyn DrngWorker>,
        Arc::clone(&status) as Arc<dyn StatusSink>,
    ) {
        Ok(mgr) => mgr,
        Err(e) => {
            eprintln!("Failed to initialize entropy manager: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = mgr.monitor_initialize() {
        warn!("Startup monitor not running: {}", e);
    }

    // Cooperative shutdown on ctrl-c.
    {
        let mgr = Arc::clone(&mgr);
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Shutdown requested");
            mgr.request_shutdown();
        }) {
            warn!("Failed to install signal handler: {}", e);
        }
    }

    info!("Collecting entropy...");
    let trigger_interval = Duration::from_millis(args.trigger_interval_ms);
    let mut printed_sample = false;

    while !mgr.terminated() {
        mgr.add_entropy();

        if mgr.state_operational() && !printed_sample {
            let mut output = [0u8; 32];
            match drng.generate_full(&mgr, &mut output, Duration::from_secs(1)) {
                Ok(()) => {
                    println!(
                        "Random bytes: {}",
                        output
                            .iter()
                            .map(|b| format!("{:02x}", b))
                            .collect::<String>()
                    );
                    printed_sample = true;
                    info!(
                        available_bits = mgr.avail_entropy(),
                        reseeds = drng.init_instance().reseed_count(),
                        "DRNG operational"
                    );
                    if args.oneshot {
                        break;
                    }
                }
                Err(e) => warn!("Generation failed: {}", e),
            }
        }

        std::thread::sleep(trigger_interval);
    }

    mgr.finalize();
    info!(
        "Done. Operational: {}, reseeds: {}",
        status.is_operational(),
        drng.init_instance().reseed_count()
    );
}
