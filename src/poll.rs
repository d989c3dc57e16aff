//! Polled collaborators: wallet balance, trust score, local service health.
//!
//! Each poll is a one-shot call; failures surface once to the caller and are
//! rendered per-section by the HTTP layer, never crossing into sibling polls.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Wallet balance as reported by the wallet endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletBalance {
    #[serde(alias = "balanceSats")]
    pub balance_sats: f64,
}

/// Web-of-trust score as reported by the scoring API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub score: f64,
}

/// Health of one locally supervised service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    pub status: String,
    pub healthy: bool,
}

/// Fetch the wallet balance from the configured endpoint.
pub async fn get_balance(url: &str) -> Result<WalletBalance> {
    let resp = reqwest::get(url).await.context("wallet request failed")?;
    let balance = resp
        .error_for_status()
        .context("wallet endpoint returned an error status")?
        .json()
        .await
        .context("wallet response was not valid JSON")?;
    Ok(balance)
}

/// Fetch the web-of-trust score for `pubkey_hex` from the scoring API.
pub async fn fetch_score(base_url: &str, pubkey_hex: &str) -> Result<TrustScore> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), pubkey_hex);
    let resp = reqwest::get(&url).await.context("trust request failed")?;
    let score = resp
        .error_for_status()
        .context("trust endpoint returned an error status")?
        .json()
        .await
        .context("trust response was not valid JSON")?;
    Ok(score)
}

/// Probe a locally supervised service via `systemctl is-active`.
///
/// Probes are total: a missing supervisor or unknown unit maps to status
/// `"unknown"` and unhealthy rather than an error. The subprocess runs on
/// the tokio reactor, so a slow probe never stalls relay timers.
pub async fn probe(service: &str) -> ServiceStatus {
    let output = Command::new("systemctl")
        .arg("is-active")
        .arg(service)
        .output()
        .await;
    match output {
        Ok(out) => {
            let status = String::from_utf8_lossy(&out.stdout).trim().to_string();
            let status = if status.is_empty() {
                "unknown".to_string()
            } else {
                status
            };
            let healthy = status == "active";
            ServiceStatus { status, healthy }
        }
        Err(_) => ServiceStatus {
            status: "unknown".into(),
            healthy: false,
        },
    }
}
