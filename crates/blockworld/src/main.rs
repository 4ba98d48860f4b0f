//! World server executable.
//!
//! Loads the TOML configuration, applies command-line overrides, installs
//! logging and runs the server until SIGINT or SIGTERM.

mod cli;
mod config;
mod signals;

use anyhow::Context;
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use world_server::WorldServer;

/// How long in-flight connections get to wind down after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// `RUST_LOG` wins over the configured level.
fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
            .context("installing JSON logger")?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
            .context("installing logger")?;
    }

    info!("🔧 Logging initialized with level: {}", config.level);
    Ok(())
}

fn display_banner() {
    info!("╔══════════════════════════════════════════╗");
    info!("║              BLOCKWORLD                  ║");
    info!("║      shared voxel world server           ║");
    info!("╚══════════════════════════════════════════╝");
}

struct Application {
    config: AppConfig,
    server: Arc<WorldServer>,
}

impl Application {
    async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config.validate().context("Configuration validation failed")?;
        setup_logging(&config.logging)?;
        display_banner();

        let server = Arc::new(WorldServer::new(config.to_server_config()?));
        info!("📂 Config: {}", args.config_path.display());
        Ok(Self { config, server })
    }

    async fn run(self) -> anyhow::Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Handshake timeout: {}s", self.config.server.connection_timeout);
        info!(
            "  🧱 Terrain: {}x{}x{} ({} blocks)",
            self.config.world.size,
            self.config.world.depth,
            self.config.world.size,
            self.server.world().blocks().len().await
        );

        let mut signals = signals::ShutdownSignals::install().context("installing signal handlers")?;
        let listener = self.server.bind().context("binding listener")?;
        let server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.serve(listener).await {
                    Ok(()) => info!("✅ Accept loop finished"),
                    Err(e) => error!("❌ Server error: {}", e),
                }
            })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");
        let received = signals.recv().await.context("waiting for a shutdown signal")?;
        info!("📡 Received {}", received);

        info!("🔄 Shutting down");
        self.server.shutdown();
        if tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await.is_err() {
            warn!("Accept loop did not stop within {:?}", SHUTDOWN_GRACE);
        }
        info!(
            "👋 Goodbye ({} connection(s) still open)",
            self.server.active_connections()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}
