//! Configuration loading from `.env` files.

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use secp256k1::XOnlyPublicKey;

/// Static agent identity loaded once at startup.
#[derive(Debug, Clone)]
pub struct Identity {
    /// X-only public key (hex).
    pub public_key_hex: String,
    /// Optional secret key (hex), kept for future signing use.
    pub secret_key_hex: Option<String>,
}

/// Runtime settings derived from environment variables.
///
/// Constructed once before serving begins and passed by value into the
/// server; replaced only by process restart.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for persisted state (the history snapshot).
    pub state_root: PathBuf,
    /// HTTP bind address, e.g. `127.0.0.1:7799`.
    pub bind_http: String,
    /// Relay endpoint queried for attestations and DVM results.
    pub relay_url: Option<String>,
    /// Agent identity, if configured.
    pub identity: Option<Identity>,
    /// Wallet balance endpoint.
    pub wallet_url: Option<String>,
    /// Trust score API base URL.
    pub trust_api_url: Option<String>,
    /// Locally supervised services to probe.
    pub services: Vec<String>,
    /// Optional Tor SOCKS proxy (host:port) for relay connections.
    pub tor_socks: Option<String>,
    /// Maximum wait for a relay subscription, in milliseconds.
    pub collect_wait_ms: u64,
    /// Log each HTTP request to stdout.
    pub verbose: bool,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let state_root = PathBuf::from(env::var("STATE_ROOT")?);
        let bind_http = env::var("BIND_HTTP")?;
        let relay_url = env::var("RELAY_URL").ok().filter(|s| !s.is_empty());
        let pubkey = env::var("PUBKEY").ok().filter(|s| !s.is_empty());
        let seckey = env::var("SECKEY").ok().filter(|s| !s.is_empty());
        let identity = match pubkey {
            Some(pk) => {
                let raw = hex::decode(&pk).context("PUBKEY is not hex")?;
                XOnlyPublicKey::from_slice(&raw).context("PUBKEY is not a valid x-only key")?;
                Some(Identity {
                    public_key_hex: pk,
                    secret_key_hex: seckey,
                })
            }
            None => None,
        };
        let wallet_url = env::var("WALLET_URL").ok().filter(|s| !s.is_empty());
        let trust_api_url = env::var("TRUST_API_URL").ok().filter(|s| !s.is_empty());
        let services = csv_strings(env::var("SERVICES").unwrap_or_default());
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        let collect_wait_ms = env::var("COLLECT_WAIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let verbose = env::var("VERBOSE").unwrap_or_else(|_| "0".into()) == "1";
        Ok(Self {
            state_root,
            bind_http,
            relay_url,
            identity,
            wallet_url,
            trust_api_url,
            services,
            tor_socks,
            collect_wait_ms,
            verbose,
        })
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}
