//! Run the shell's pipeline from the command line against a live backend.
//!
//! Each subcommand performs one step the web shell performs per request and
//! prints the outcome as JSON. Warnings captured during the run are printed
//! to stderr afterwards.
//!
//! # Examples
//!
//! ```sh
//! # Would this request be let through?
//! shellgate check-session --path /reports --cookie "PHPSESSID=abc"
//!
//! # Fetch the chrome and theme for a tenant host
//! shellgate --host agrovid.example.com template --cookie "PHPSESSID=abc"
//!
//! # Compose a page
//! shellgate --config shellgate.toml page / --cookie "PHPSESSID=abc"
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;
use shellgate::diagnostics::{DiagnosticBuffer, DiagnosticsLayer};
use shellgate::gate::GateDecision;
use shellgate::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run the shell's gate, chrome and composition steps from the command line.
#[derive(Parser)]
#[command(name = "shellgate")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, default_value = "shellgate.toml")]
    config: PathBuf,

    /// Request host used for tenant selection
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the session gate for a path
    CheckSession {
        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Raw Cookie header to forward
        #[arg(long)]
        cookie: Option<String>,

        /// Referer header of the request
        #[arg(long)]
        referer: Option<String>,
    },

    /// Load the chrome as a first navigation would
    Template {
        /// Raw Cookie header to forward
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Compose the page body for a path
    Page {
        /// Request path
        path: String,

        /// Raw Cookie header to forward
        #[arg(long)]
        cookie: Option<String>,
    },
}

fn session(cookie: Option<String>, host: Option<String>) -> Session {
    let session = Session::new(cookie.map(SessionCookie::new).unwrap_or_default());
    match host {
        Some(h) => session.with_host(h),
        None => session,
    }
}

fn init_tracing() -> DiagnosticBuffer {
    let (diagnostics, buffer) = DiagnosticsLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(diagnostics)
        .init();
    buffer
}

async fn run(cli: Cli) -> Result<serde_json::Value, String> {
    let config = ShellConfig::load(&cli.config)?;
    let shell = Shell::connect(config).map_err(|e| e.to_string())?;

    match cli.command {
        Command::CheckSession {
            path,
            cookie,
            referer,
        } => {
            let mut request = GateRequest::new(path, session(cookie, cli.host));
            if let Some(r) = referer {
                request = request.with_referer(r);
            }
            let decision = shell.gate().evaluate(&request).await;
            Ok(match decision {
                GateDecision::Bypass => json!({"decision": "bypass"}),
                GateDecision::Allow => json!({"decision": "allow"}),
                GateDecision::Deny { redirect, reason } => json!({
                    "decision": "deny",
                    "redirect": redirect,
                    "reason": reason,
                }),
            })
        }
        Command::Template { cookie } => {
            let session = session(cookie, cli.host);
            let snapshot = shell.chrome(&session).templates.enter("/", &session).await;
            Ok(json!({
                "theme": snapshot.theme().css(),
                "snapshot": snapshot,
            }))
        }
        Command::Page { path, cookie } => {
            let session = session(cookie, cli.host);
            let chrome = shell.chrome(&session);
            let composer = shell.composer(&chrome);
            let navigation = composer.navigate(&path, &session).await;
            let state = navigation.into_state().unwrap_or_else(|| composer.state());
            Ok(json!({
                "path": path,
                "content_key": composer.content_key(&path),
                "active_menu_item_id": chrome.nav.active(),
                "page": state,
            }))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let diagnostics = init_tracing();

    let result = run(cli).await;

    let captured = diagnostics.drain();
    if !captured.is_empty() {
        eprintln!("── {} warning(s) during run ──", captured.len());
        for d in &captured {
            eprintln!("  {} {} [{}] {}", d.time, d.level, d.target, d.message);
        }
    }

    match result {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: failed to serialize output: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
