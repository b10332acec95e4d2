//! Minimal DevTools protocol client
//!
//! Covers exactly the surface the completion monitor needs: target
//! enumeration and attachment, page lifecycle events, and navigation
//! history. Construction is an explicit, ordered attach step: the endpoint
//! is polled until the freshly launched browser starts serving it, then a
//! single WebSocket session is opened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{CookieFerryError, Result};

/// How long to keep knocking on the discovery endpoint while the browser
/// finishes starting up.
const ENDPOINT_CONNECT_ATTEMPTS: u32 = 100;
const ENDPOINT_RETRY_DELAY: Duration = Duration::from_millis(300);
const ENDPOINT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingCall = oneshot::Sender<std::result::Result<Value, String>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCall>>>;

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// One entry of the browser's target list.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
}

/// An event frame received on the session.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// Fetch the browser-level WebSocket URL from the DevTools HTTP endpoint,
/// retrying while the browser is still binding the port.
pub async fn discover_web_socket_url(
    base_url: &str,
    attempts: u32,
    retry_delay: Duration,
) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(ENDPOINT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| {
            CookieFerryError::DebuggingConnect(format!("failed to build HTTP client: {}", e))
        })?;
    let version_url = format!("{}/json/version", base_url);

    for attempt in 1..=attempts {
        match client.get(&version_url).send().await {
            Ok(response) if response.status().is_success() => {
                let info: VersionInfo = response.json().await.map_err(|e| {
                    CookieFerryError::DebuggingConnect(format!(
                        "malformed version response: {}",
                        e
                    ))
                })?;
                return Ok(info.web_socket_debugger_url);
            }
            Ok(response) => {
                log::debug!(
                    "DevTools endpoint not ready (status {}), attempt {}/{}",
                    response.status(),
                    attempt,
                    attempts
                );
            }
            Err(e) => {
                log::debug!(
                    "DevTools endpoint not ready ({}), attempt {}/{}",
                    e,
                    attempt,
                    attempts
                );
            }
        }
        tokio::time::sleep(retry_delay).await;
    }

    Err(CookieFerryError::DebuggingConnect(format!(
        "endpoint {} never became reachable",
        version_url
    )))
}

/// A connected DevTools session. Dropping the client aborts its reader
/// task, so the session's listeners share one owning scope.
pub struct CdpClient {
    write: Mutex<SplitSink<WsStream, Message>>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the browser-level debugging socket on `port`. Returns the
    /// client and the stream of protocol events.
    pub async fn connect(port: u16) -> Result<(Self, mpsc::UnboundedReceiver<CdpEvent>)> {
        let base_url = format!("http://127.0.0.1:{}", port);
        let ws_url =
            discover_web_socket_url(&base_url, ENDPOINT_CONNECT_ATTEMPTS, ENDPOINT_RETRY_DELAY)
                .await?;

        let (stream, _) = connect_async(ws_url.as_str()).await.map_err(|e| {
            CookieFerryError::DebuggingConnect(format!("WebSocket connect failed: {}", e))
        })?;
        let (write, read) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(read, pending.clone(), event_tx));

        Ok((
            Self {
                write: Mutex::new(write),
                pending,
                next_id: AtomicU64::new(1),
                reader,
            },
            event_rx,
        ))
    }

    /// Issue one command and await its response frame.
    pub async fn call(
        &self,
        method: &str,
        session_id: Option<&str>,
        params: Value,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            frame["sessionId"] = json!(session_id);
        }

        let send_result = self
            .write
            .lock()
            .await
            .send(Message::Text(frame.to_string()))
            .await;
        if let Err(e) = send_result {
            self.pending.lock().await.remove(&id);
            return Err(CookieFerryError::DebuggingConnect(format!(
                "failed to send {}: {}",
                method, e
            )));
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(CookieFerryError::DebuggingConnect(format!(
                "{} failed: {}",
                method, message
            ))),
            Err(_) => Err(CookieFerryError::DebuggingConnect(format!(
                "session closed before {} completed",
                method
            ))),
        }
    }

    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>> {
        let result = self.call("Target.getTargets", None, json!({})).await?;
        let infos = result
            .get("targetInfos")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(infos).map_err(|e| {
            CookieFerryError::DebuggingConnect(format!("malformed target list: {}", e))
        })
    }

    /// Subscribe the whole session to target lifecycle events, including
    /// the destroyed notification the monitor watches for.
    pub async fn set_discover_targets(&self) -> Result<()> {
        self.call("Target.setDiscoverTargets", None, json!({ "discover": true }))
            .await?;
        Ok(())
    }

    /// Attach to a target in flat session mode; returns the session id all
    /// page-level commands must carry.
    pub async fn attach_to_target(&self, target_id: &str) -> Result<String> {
        let result = self
            .call(
                "Target.attachToTarget",
                None,
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        result
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CookieFerryError::DebuggingConnect("attach returned no sessionId".to_string())
            })
    }

    pub async fn enable_page_events(&self, session_id: &str) -> Result<()> {
        self.call("Page.enable", Some(session_id), json!({})).await?;
        Ok(())
    }

    /// The URL of the tab's current navigation-history entry.
    pub async fn current_history_url(&self, session_id: &str) -> Result<String> {
        let result = self
            .call("Page.getNavigationHistory", Some(session_id), json!({}))
            .await?;
        history_current_url(&result)
            .map(str::to_string)
            .ok_or_else(|| {
                CookieFerryError::DebuggingConnect("malformed navigation history".to_string())
            })
    }

    /// Politely close the socket; the reader task winds down when the peer
    /// acknowledges or the stream ends.
    pub async fn close(&self) {
        let mut write = self.write.lock().await;
        if let Err(e) = write.send(Message::Close(None)).await {
            log::debug!("DevTools socket already closed: {}", e);
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    pending: PendingMap,
    events: mpsc::UnboundedSender<CdpEvent>,
) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => route_frame(&text, &pending, &events).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("DevTools socket read failed: {}", e);
                break;
            }
        }
    }
    // Fail any in-flight calls instead of leaving them waiting on a dead
    // socket; dropping the event sender ends the consumer loop too.
    pending.lock().await.clear();
}

async fn route_frame(text: &str, pending: &PendingMap, events: &mpsc::UnboundedSender<CdpEvent>) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Discarding unparsable DevTools frame: {}", e);
            return;
        }
    };

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        if let Some(sender) = pending.lock().await.remove(&id) {
            let outcome = match value.get("error") {
                Some(error) => Err(error.to_string()),
                None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = sender.send(outcome);
        }
    } else if let Some(method) = value.get("method").and_then(Value::as_str) {
        let params = value.get("params").cloned().unwrap_or(Value::Null);
        let _ = events.send(CdpEvent {
            method: method.to_string(),
            params,
        });
    }
}

fn history_current_url(result: &Value) -> Option<&str> {
    let index = result.get("currentIndex").and_then(Value::as_u64)?;
    result
        .get("entries")?
        .as_array()?
        .get(index as usize)?
        .get("url")?
        .as_str()
}
