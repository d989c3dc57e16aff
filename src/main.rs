//! Command line interface for the status aggregator. Supports initializing
//! the `.env` configuration and state directory, and serving the JSON API.

mod attest;
mod collector;
mod config;
mod event;
mod history;
mod poll;
mod server;

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use config::Settings;
use history::History;

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "watchr",
    author,
    version,
    about = "Nostr-native agent status dashboard",
    short_flag = 'v',
    long_flag = "version"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file and state directory.
    Init,
    /// Serve the JSON status API.
    Serve,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    fs::create_dir_all(&cfg.state_root)?;
    match cli.command {
        Commands::Init => {}
        Commands::Serve => {
            let addr: SocketAddr = cfg.bind_http.as_str().parse()?;
            let history = Arc::new(History::new(cfg.state_root.clone()));
            server::serve_http(addr, cfg, history, std::future::pending()).await?;
        }
    }
    Ok(())
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let base_dir = match env_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let state_root = base_dir.join("watchr-data");
    let mut content = String::new();
    content.push_str(&format!("STATE_ROOT={}\n", display_path(&state_root)));
    content.push_str("BIND_HTTP=127.0.0.1:7799\n");
    content.push_str("RELAY_URL=\n");
    content.push_str("PUBKEY=\n");
    content.push_str("SECKEY=\n");
    content.push_str("WALLET_URL=\n");
    content.push_str("TRUST_API_URL=\n");
    content.push_str("SERVICES=\n");
    content.push_str("TOR_SOCKS=\n");
    content.push_str("COLLECT_WAIT_MS=5000\n");
    content.push_str("VERBOSE=0\n");
    fs::write(env_path, content)?;
    Ok(())
}

fn display_path(path: &PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
