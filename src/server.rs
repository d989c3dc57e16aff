//! HTTP endpoints for health checks, status aggregation, attestations,
//! history, and recent DVM results.

use std::{
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{
    attest::{self, ATTESTATION_KIND},
    collector::{self, Filter},
    config::Settings,
    history::{History, DEFAULT_SAMPLE_INTERVAL_MS},
    poll,
};

/// NIP-90 job result kind published by the agent's DVM.
const DVM_RESULT_KIND: u32 = 6300;

/// Result cap per attestation filter.
const ATTESTATION_LIMIT: usize = 100;

/// Number of recent DVM results to report.
const DVM_LIMIT: usize = 10;

#[derive(Clone)]
struct HttpState {
    cfg: Settings,
    history: Arc<History>,
}

/// Start the HTTP server exposing `/healthz` and the `/api/*` endpoints.
pub async fn serve_http(
    addr: SocketAddr,
    cfg: Settings,
    history: Arc<History>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = Arc::new(HttpState { cfg, history });
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(api_status))
        .route("/api/attestations", get(api_attestations))
        .route("/api/history", get(api_history))
        .route("/api/dvm", get(api_dvm))
        .with_state(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render a fallible section result as its JSON value or `{"error": ...}`.
///
/// Section failures stay inside their own section; a wallet outage never
/// hides the trust score or service health.
fn section<T: serde::Serialize>(result: Result<T>) -> Value {
    match result.and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(v) => v,
        Err(e) => json!({"error": e.to_string()}),
    }
}

/// Health check endpoint.
async fn healthz(State(state): State<Arc<HttpState>>) -> Json<Value> {
    if state.cfg.verbose {
        println!("[http] GET /healthz");
    }
    Json(json!({"status": "ok"}))
}

/// Combined snapshot of wallet, trust, and service health. Successful wallet
/// and trust polls are fed through the throttled sampler.
async fn api_status(State(state): State<Arc<HttpState>>) -> Json<Value> {
    if state.cfg.verbose {
        println!("[http] GET /api/status");
    }
    let now = now_ms();

    let wallet = match &state.cfg.wallet_url {
        None => json!({"error": "No wallet configured"}),
        Some(url) => section(match poll::get_balance(url).await {
            Ok(balance) => {
                if let Err(e) = state.history.maybe_sample(
                    "wallet",
                    balance.balance_sats,
                    now,
                    DEFAULT_SAMPLE_INTERVAL_MS,
                ) {
                    eprintln!("history write error (wallet): {e}");
                }
                Ok(balance)
            }
            Err(e) => Err(e),
        }),
    };

    let trust = match (&state.cfg.identity, &state.cfg.trust_api_url) {
        (None, _) => json!({"error": "No identity configured"}),
        (_, None) => json!({"error": "No trust API configured"}),
        (Some(identity), Some(url)) => {
            section(match poll::fetch_score(url, &identity.public_key_hex).await {
                Ok(score) => {
                    if let Err(e) = state.history.maybe_sample(
                        "trust",
                        score.score,
                        now,
                        DEFAULT_SAMPLE_INTERVAL_MS,
                    ) {
                        eprintln!("history write error (trust): {e}");
                    }
                    Ok(score)
                }
                Err(e) => Err(e),
            })
        }
    };

    let mut services = Vec::new();
    for name in &state.cfg.services {
        let status = poll::probe(name).await;
        services.push(json!({
            "name": name,
            "status": status.status,
            "healthy": status.healthy,
        }));
    }

    Json(json!({
        "wallet": wallet,
        "trust": trust,
        "services": services,
    }))
}

/// Attestations given by and received by the configured identity.
async fn api_attestations(State(state): State<Arc<HttpState>>) -> Json<Value> {
    if state.cfg.verbose {
        println!("[http] GET /api/attestations");
    }
    let Some(identity) = &state.cfg.identity else {
        return Json(json!({"error": "No identity configured"}));
    };
    let Some(relay) = &state.cfg.relay_url else {
        return Json(json!({"error": "No relay configured"}));
    };
    let pk = identity.public_key_hex.clone();
    let filters = [
        Filter {
            kinds: vec![ATTESTATION_KIND],
            p_tags: vec![pk.clone()],
            limit: Some(ATTESTATION_LIMIT),
            ..Default::default()
        },
        Filter {
            kinds: vec![ATTESTATION_KIND],
            authors: vec![pk.clone()],
            limit: Some(ATTESTATION_LIMIT),
            ..Default::default()
        },
    ];
    let wait = Duration::from_millis(state.cfg.collect_wait_ms);
    match collector::collect(relay, &filters, wait, state.cfg.tor_socks.as_deref()).await {
        Ok(events) => Json(section(Ok(attest::classify(&events, &pk)))),
        Err(e) => Json(json!({"error": e.to_string()})),
    }
}

/// The full persisted history mapping.
async fn api_history(State(state): State<Arc<HttpState>>) -> Json<Value> {
    if state.cfg.verbose {
        println!("[http] GET /api/history");
    }
    Json(section(Ok(state.history.load())))
}

/// Truncate DVM result content for listing.
fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(100).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Recent results published by the agent's DVM, newest first.
async fn api_dvm(State(state): State<Arc<HttpState>>) -> Json<Value> {
    if state.cfg.verbose {
        println!("[http] GET /api/dvm");
    }
    let Some(identity) = &state.cfg.identity else {
        return Json(json!({"error": "No identity configured"}));
    };
    let Some(relay) = &state.cfg.relay_url else {
        return Json(json!({"error": "No relay configured"}));
    };
    let filters = [Filter {
        kinds: vec![DVM_RESULT_KIND],
        authors: vec![identity.public_key_hex.clone()],
        limit: Some(DVM_LIMIT),
        ..Default::default()
    }];
    let wait = Duration::from_millis(state.cfg.collect_wait_ms);
    match collector::collect(relay, &filters, wait, state.cfg.tor_socks.as_deref()).await {
        Ok(mut events) => {
            events.sort_by_key(|e| std::cmp::Reverse(e.created_at));
            events.truncate(DVM_LIMIT);
            let results: Vec<Value> = events
                .iter()
                .map(|ev| {
                    json!({
                        "id": ev.id,
                        "timestamp": ev.created_at,
                        "contentPreview": preview(&ev.content),
                    })
                })
                .collect();
            Json(json!({"count": results.len(), "recentResults": results}))
        }
        Err(e) => Json(json!({"error": e.to_string()})),
    }
}
