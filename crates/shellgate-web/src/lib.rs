//! HTTP front end for the `shellgate` application shell.
//!
//! `shellgate-web` runs the session gate as axum middleware in front of every
//! route, renders the tenant chrome around composed page bodies, relays login
//! credentials to the backend and exposes the shell state as JSON.
//!
//! # Quick start
//!
//! ```ignore
//! use shellgate::config::ShellConfig;
//! use shellgate_web::{WebConfig, spawn_web};
//!
//! let config = WebConfig {
//!     shell: ShellConfig::load("shellgate.toml".as_ref())?,
//!     ..Default::default()
//! };
//! let addr = spawn_web(config).await?;
//! println!("Shell: http://{addr}");
//! ```
//!
//! # Request flow
//!
//! ```text
//! request ──▶ session_gate ──deny──▶ 302 /login (no-store)
//!                  │
//!                  └─allow/bypass─▶ handler ──▶ TemplateStore::enter ┐
//!                                           └─▶ ContentComposer::navigate ┘─▶ HTML / JSON
//! ```
//!
//! `/health` sits outside the gate. `/assets/*` passes through it via the
//! default bypass rules.

mod api;
mod auth;
pub mod error;
mod page;
mod server;

pub use error::WebError;
pub use server::{build_router, start_server};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use shellgate::config::ShellConfig;
use shellgate::shell::Shell;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory served under `/assets`. `None` disables static files.
    pub static_dir: Option<PathBuf>,
    /// Shell (backend, gate, cache) configuration.
    pub shell: ShellConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            shell: ShellConfig::default(),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(config: WebConfig) -> Result<SocketAddr, String> {
    let shell = Shell::connect(config.shell).map_err(|e| format!("failed to build shell: {e}"))?;
    let router = build_router(Arc::new(shell), config.static_dir);
    start_server(router, config.bind_addr).await
}
