//! Bounded relay subscription collector.
//!
//! Opens a NIP-01 subscription, gathers matching events until the relay
//! signals end of stored events or a deadline elapses, then tears the
//! subscription down before returning.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async, tungstenite::Message, WebSocketStream};
use url::Url;

use crate::event::Event;

/// Subscription id used for every collector request.
const SUB_ID: &str = "watchr";

/// One NIP-01 filter within a subscription request.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Event kind numbers to match.
    pub kinds: Vec<u32>,
    /// Author public keys (hex) to match.
    pub authors: Vec<String>,
    /// `#p` tag values (referenced pubkeys) to match.
    pub p_tags: Vec<String>,
    /// Per-filter result cap.
    pub limit: Option<usize>,
}

impl Filter {
    /// Serialize into the NIP-01 filter object.
    fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        if !self.kinds.is_empty() {
            map.insert(
                "kinds".into(),
                Value::Array(self.kinds.iter().map(|k| (*k).into()).collect()),
            );
        }
        if !self.authors.is_empty() {
            map.insert(
                "authors".into(),
                Value::Array(self.authors.iter().cloned().map(Value::String).collect()),
            );
        }
        if !self.p_tags.is_empty() {
            map.insert(
                "#p".into(),
                Value::Array(self.p_tags.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), (limit as u64).into());
        }
        Value::Object(map)
    }
}

/// Connect to `relay`, issue a multi-filter subscription, and accumulate
/// every delivered event until the relay's EOSE for the subscription or
/// `max_wait`, whichever fires first.
///
/// Events come back in delivery order; nothing is deduplicated across
/// filters and payloads that fail to parse as events are skipped. The
/// subscription is closed and the socket shut down on every exit path after
/// the connection succeeds; teardown errors are swallowed because the result
/// set is already final by then.
pub async fn collect(
    relay: &str,
    filters: &[Filter],
    max_wait: Duration,
    tor_socks: Option<&str>,
) -> Result<Vec<Event>> {
    let mut ws = connect_ws(relay, tor_socks)
        .await
        .with_context(|| format!("connecting to relay {relay}"))?;
    let mut req = vec![json!("REQ"), json!(SUB_ID)];
    req.extend(filters.iter().map(Filter::to_json));
    ws.send(Message::Text(Value::Array(req).to_string())).await?;

    let mut events = Vec::new();
    // The deadline and the EOSE wait race. Dropping the receive future on
    // timeout cancels it, so the loser can never terminate a second time.
    let _ = timeout(max_wait, async {
        while let Some(msg) = ws.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(_) => break,
            };
            match msg {
                Message::Text(txt) => {
                    if let Ok(val) = serde_json::from_str::<Value>(&txt) {
                        if let Some(arr) = val.as_array() {
                            match arr.first().and_then(|v| v.as_str()) {
                                Some("EVENT") if arr.len() >= 3 => {
                                    if let Ok(ev) =
                                        serde_json::from_value::<Event>(arr[2].clone())
                                    {
                                        events.push(ev);
                                    }
                                }
                                Some("EOSE")
                                    if arr.get(1).and_then(|v| v.as_str()) == Some(SUB_ID) =>
                                {
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    })
    .await;

    // Best-effort teardown: unsubscribe, then close the connection.
    let _ = ws
        .send(Message::Text(json!(["CLOSE", SUB_ID]).to_string()))
        .await;
    let _ = ws.close(None).await;
    Ok(events)
}

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy.
async fn connect_ws(
    relay: &str,
    tor_socks: Option<&str>,
) -> Result<WebSocketStream<Box<dyn AsyncReadWrite + Unpin + Send>>> {
    let url = Url::parse(relay)?;
    let host = url.host_str().ok_or_else(|| anyhow!("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("missing port"))?;
    let req = relay.into_client_request()?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = tor_socks {
        Box::new(Socks5Stream::connect(proxy, (host, port)).await?)
    } else {
        Box::new(TcpStream::connect((host, port)).await?)
    };
    let (ws, _) = client_async(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
