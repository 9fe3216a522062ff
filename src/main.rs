//! Capture Controller Demo CLI
//!
//! Drives the still-capture controller against the simulated mock device:
//! open, preview, a number of stills, close.

use capture_fsm::{
    config::FileConfig,
    device::{Facing, MockDevice, MockTarget, StillImage},
    machine::{Controller, State},
    metrics::{MetricsRegistry, MetricsSnapshot},
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tracing::{info, warn};

/// Frames to wait for one still before giving up on it.
const MAX_FRAMES_PER_SHOT: u32 = 500;

#[derive(Debug, Parser)]
#[command(name = "capture-fsm", version, about = "Still-capture controller demo")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stills to take (overrides the config file).
    #[arg(short, long)]
    shots: Option<u32>,

    /// Simulator seed (overrides the config file).
    #[arg(long)]
    seed: Option<u64>,

    /// Lens to open (overrides the config file).
    #[arg(long, value_enum)]
    facing: Option<FacingArg>,

    /// Print the Prometheus metrics after closing.
    #[arg(long)]
    print_metrics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FacingArg {
    Front,
    Back,
    External,
}

impl From<FacingArg> for Facing {
    fn from(arg: FacingArg) -> Self {
        match arg {
            FacingArg::Front => Facing::Front,
            FacingArg::Back => Facing::Back,
            FacingArg::External => Facing::External,
        }
    }
}

/// Pushes snapshots to the local registry and, when serving, the HTTP state.
struct Publisher {
    registry: MetricsRegistry,
    #[cfg(feature = "metrics")]
    served: Option<Arc<tokio::sync::RwLock<capture_fsm::metrics::MetricsState>>>,
}

impl Publisher {
    fn publish(&self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        #[cfg(feature = "metrics")]
        {
            if let Some(served) = &self.served {
                served.blocking_write().update(snapshot);
            }
        }
    }
}

#[cfg(feature = "metrics")]
fn serve_metrics(port: u16) -> Option<Arc<tokio::sync::RwLock<capture_fsm::metrics::MetricsState>>> {
    use capture_fsm::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return None;
    }
    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics server disabled: {}", e);
            return None;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Metrics runtime failed to start: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
    Some(state)
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

    info!("Capture controller demo v{}", capture_fsm::VERSION);

    let mut file_config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(shots) = args.shots {
        file_config.demo.shots = shots;
    }
    if let Some(seed) = args.seed {
        file_config.simulator.seed = seed;
    }
    if let Some(facing) = args.facing {
        file_config.controller.facing = facing.into();
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            warn!("Ctrl-C handler not installed: {}", e);
        }
    }

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    let publisher = Publisher {
        registry,
        #[cfg(feature = "metrics")]
        served: serve_metrics(file_config.demo.metrics_port),
    };

    let backend = MockDevice::simulated(file_config.simulator.clone());
    let mut controller: Controller<MockDevice, MockTarget> =
        match Controller::new(backend, file_config.controller.clone()) {
            Ok(controller) => controller,
            Err(e) => {
                eprintln!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
        };
    controller.set_transition_listener(|from, to| tracing::debug!(%from, %to, "transition"));

    if let Err(e) = controller.open(MockTarget::available()) {
        eprintln!("Failed to open camera: {}", e);
        std::process::exit(1);
    }
    controller.dispatch_pending();
    if controller.state() != State::Preview {
        eprintln!("Camera did not reach preview (state {})", controller.state());
        std::process::exit(1);
    }
    info!("Preview running");

    let (tx, rx) = mpsc::channel::<StillImage>();
    let mut taken = 0;

    for shot in 1..=file_config.demo.shots {
        if !running.load(Ordering::SeqCst) {
            warn!("Interrupted, closing early");
            break;
        }

        let tx = tx.clone();
        if !controller.take_picture(move |image| {
            let _ = tx.send(image);
        }) {
            warn!("Shot {} refused in state {}", shot, controller.state());
            break;
        }

        let mut frames = 0;
        let image = loop {
            controller.backend_mut().tick();
            controller.dispatch_pending();
            if let Ok(image) = rx.try_recv() {
                break Some(image);
            }
            frames += 1;
            if frames >= MAX_FRAMES_PER_SHOT || controller.state() == State::Closed {
                break None;
            }
        };

        match image {
            Some(image) => {
                taken += 1;
                println!(
                    "Shot {}: {} {} bytes after {} frames, blake3 {}",
                    shot,
                    image.size(),
                    image.data().len(),
                    frames + 1,
                    image.fingerprint()
                );
            }
            None => warn!("Shot {}: no image (state {})", shot, controller.state()),
        }

        publisher.publish(&MetricsSnapshot::from_controller(
            controller.stats(),
            controller.state(),
            controller.generation().0,
        ));
        if controller.state() == State::Closed {
            break;
        }
    }

    controller.close();
    publisher.publish(&MetricsSnapshot::from_controller(
        controller.stats(),
        controller.state(),
        controller.generation().0,
    ));

    info!(
        "Done. {} of {} stills delivered, {} transitions",
        taken,
        file_config.demo.shots,
        controller.stats().transitions
    );

    if args.print_metrics {
        match publisher.registry.encode() {
            Ok(output) => print!("{}", output),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}
