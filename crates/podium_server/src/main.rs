//! Podium Server
//!
//! Serves a resource store over HTTP.

use clap::Parser;
use podium_server::{PodiumServer, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Podium resource server
#[derive(Parser, Debug)]
#[command(name = "podium-server")]
#[command(author = "Podium Developers")]
#[command(version)]
#[command(about = "Resource-oriented storage server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Public URL of the root container
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for persistent storage; memory only when absent
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bind to all interfaces (0.0.0.0)
    #[arg(long)]
    public: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        let mut config = config.apply_env()?;

        if self.public {
            config.host = "0.0.0.0".to_string();
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podium_server=info,podium_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;
    let server = PodiumServer::new(config)?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    server.run_with_shutdown(shutdown_signal).await?;

    Ok(())
}
