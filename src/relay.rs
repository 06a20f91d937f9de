//! Fetching single events by id from a set of upstream relays.
//!
//! Every fetch opens its own connections, one task per relay, and tears them
//! down when the first matching event arrives, when every relay has answered
//! without a match, or when the deadline passes.

use std::time::Duration;

use anyhow::{anyhow, Result as AnyResult};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{
    client_async_tls, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::Settings,
    error::{BotError, Result},
    event::{verify_event, Event},
};

/// Fetches events from the configured relays plus per-identifier hints.
#[derive(Debug, Clone)]
pub struct RelayFetcher {
    relays: Vec<String>,
    timeout: Duration,
    tor_socks: Option<String>,
    verify_sig: bool,
}

/// Outcome of querying one relay.
enum RelayAnswer {
    Found(Event),
    /// The relay signalled end of stored events or closed the subscription.
    Exhausted,
}

impl RelayFetcher {
    pub fn new(relays: Vec<String>, timeout: Duration) -> Self {
        Self {
            relays,
            timeout,
            tor_socks: None,
            verify_sig: false,
        }
    }

    /// Build a fetcher from the relay, proxy and verification settings.
    pub fn from_settings(cfg: &Settings) -> Self {
        let mut fetcher =
            Self::new(cfg.relays.clone(), cfg.fetch_timeout).verify_signatures(cfg.verify_sig);
        fetcher.tor_socks = cfg.tor_socks.clone();
        fetcher
    }

    /// Drop events whose id or signature does not verify.
    pub fn verify_signatures(mut self, verify: bool) -> Self {
        self.verify_sig = verify;
        self
    }

    /// Fetch the event with hex id `id` from the default relays and `hints`.
    ///
    /// The first relay to deliver a matching event wins; copies arriving from
    /// other relays are never looked at. Fails with [`BotError::NotFound`] once
    /// every relay is exhausted or the timeout elapses.
    pub async fn fetch(&self, id: &str, hints: &[String]) -> Result<Event> {
        let relays = merge_relays(&self.relays, hints);
        let sub_id = subscription_id();
        let deadline = Instant::now() + self.timeout;
        debug!(%id, relays = relays.len(), "fetching note");

        let mut tasks = JoinSet::new();
        for url in relays {
            let sub_id = sub_id.clone();
            let id = id.to_string();
            let tor_socks = self.tor_socks.clone();
            let verify_sig = self.verify_sig;
            tasks.spawn(async move {
                let answer =
                    query_relay(&url, &sub_id, &id, tor_socks.as_deref(), verify_sig).await;
                (url, answer)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Err(_) => {
                    warn!(%id, "note fetch timed out");
                    return Err(BotError::NotFound(format!("{id} (timed out)")));
                }
                Ok(None) => return Err(BotError::NotFound(id.to_string())),
                Ok(Some(Ok((url, Ok(RelayAnswer::Found(ev)))))) => {
                    info!(%id, relay = %url, "note found");
                    // remaining relays are abandoned, not awaited
                    tasks.abort_all();
                    return Ok(ev);
                }
                Ok(Some(Ok((url, Ok(RelayAnswer::Exhausted))))) => {
                    debug!(%id, relay = %url, "relay has no match");
                }
                Ok(Some(Ok((url, Err(e))))) => {
                    warn!(%id, relay = %url, "relay error: {e}");
                }
                Ok(Some(Err(e))) => warn!(%id, "relay task failed: {e}"),
            }
        }
    }
}

/// Union of `defaults` and `hints` in order, skipping blanks and duplicates
/// that differ only by a trailing slash.
pub fn merge_relays(defaults: &[String], hints: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for relay in defaults.iter().chain(hints) {
        let relay = relay.trim();
        if relay.is_empty() {
            continue;
        }
        let key = relay.trim_end_matches('/');
        if !out.iter().any(|r| r.trim_end_matches('/') == key) {
            out.push(relay.to_string());
        }
    }
    out
}

fn subscription_id() -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("gazobot-{n:016x}")
}

/// Ask one relay for the event and wait for a match or end of stored events.
async fn query_relay(
    url: &str,
    sub_id: &str,
    id: &str,
    tor_socks: Option<&str>,
    verify_sig: bool,
) -> AnyResult<RelayAnswer> {
    let mut ws = connect_ws(url, tor_socks).await?;
    let req = json!(["REQ", sub_id, {"ids": [id]}]);
    ws.send(Message::Text(req.to_string())).await?;

    let mut answer = RelayAnswer::Exhausted;
    while let Some(msg) = ws.next().await {
        let txt = match msg? {
            Message::Text(txt) => txt,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(Value::Array(arr)) = serde_json::from_str::<Value>(&txt) else {
            continue;
        };
        let same_sub = arr.get(1).and_then(|v| v.as_str()) == Some(sub_id);
        match arr.first().and_then(|v| v.as_str()) {
            Some("EVENT") if same_sub && arr.len() >= 3 => {
                let Ok(ev) = serde_json::from_value::<Event>(arr[2].clone()) else {
                    continue;
                };
                if ev.id != id {
                    continue;
                }
                if verify_sig {
                    if let Err(e) = verify_event(&ev) {
                        warn!(relay = %url, %id, "dropping unverifiable event: {e}");
                        continue;
                    }
                }
                answer = RelayAnswer::Found(ev);
                break;
            }
            Some("EOSE") | Some("CLOSED") if same_sub => break,
            Some("NOTICE") => debug!(relay = %url, "notice: {txt}"),
            _ => {}
        }
    }

    let close = json!(["CLOSE", sub_id]);
    let _ = ws.send(Message::Text(close.to_string())).await;
    let _ = ws.close(None).await;
    Ok(answer)
}

type RelayStream = WebSocketStream<MaybeTlsStream<Box<dyn AsyncReadWrite + Unpin + Send>>>;

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy.
async fn connect_ws(relay: &str, tor_socks: Option<&str>) -> AnyResult<RelayStream> {
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
    let (ws, _) = client_async_tls(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
