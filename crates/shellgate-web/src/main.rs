//! Application shell web server.
//!
//! Gates every request behind the backend's session check, renders the
//! tenant chrome around composed page bodies and relays logins.
//!
//! # Usage
//!
//! ```bash
//! shellgate-web --config shellgate.toml
//! shellgate-web --port 8080 --static-dir ./public
//! SHELLGATE_API_BASE_URL=http://api.internal shellgate-web
//! RUST_LOG=shellgate=debug shellgate-web
//! ```

use std::path::PathBuf;

use clap::Parser;
use shellgate::config::ShellConfig;
use shellgate_web::{WebConfig, spawn_web};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Multi-tenant application shell server.
#[derive(Parser)]
#[command(name = "shellgate-web")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long, default_value = "shellgate.toml")]
    config: PathBuf,

    /// Port for the web server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Bind on all interfaces instead of loopback.
    #[arg(long)]
    public: bool,

    /// Directory served under /assets.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let shell = ShellConfig::load(&args.config)?;
    let ip = if args.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let config = WebConfig {
        bind_addr: (ip, args.port).into(),
        static_dir: args.static_dir,
        shell,
    };

    let addr = spawn_web(config).await?;
    println!("Shell: http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {e}"))?;
    Ok(())
}
