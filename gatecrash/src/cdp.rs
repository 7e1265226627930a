//! Chrome DevTools Protocol driver for a live browser.
//!
//! Endpoint discovery goes over the HTTP `/json` target listing; commands
//! go over the page's WebSocket debugger channel. The run is strictly
//! serial, so a single in-flight command at a time is enough.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::driver::PageDriver;
use crate::errors::PageError;
use crate::scripts;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct TargetInfo {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    websocket_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CdpReply {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<Value>,
}

/// Drives one browser tab through its DevTools debugger endpoint.
pub struct CdpDriver {
    http_base: String,
    http: reqwest::Client,
    ws: Mutex<Option<WsStream>>,
    next_id: AtomicU64,
}

impl CdpDriver {
    /// Client for a browser started with `--remote-debugging-port=<port>`.
    pub fn new(debug_port: u16) -> Self {
        Self {
            http_base: format!("http://127.0.0.1:{debug_port}"),
            http: reqwest::Client::new(),
            ws: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether a browser with DevTools enabled is listening.
    pub async fn is_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/json/version", self.http_base))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Attach the command channel to the first page target.
    pub async fn connect(&self) -> Result<(), PageError> {
        let targets = self.targets().await?;
        let page = targets
            .into_iter()
            .find(|t| t.kind.is_empty() || t.kind == "page")
            .ok_or_else(|| PageError::Endpoint("no page target exposed by the browser".into()))?;
        let ws_url = page.websocket_url.ok_or_else(|| {
            PageError::Endpoint(format!("target '{}' has no webSocketDebuggerUrl", page.id))
        })?;

        debug!(url = %page.url, title = %page.title, "attaching to page target");
        let (stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| PageError::Endpoint(format!("WebSocket connect failed: {e}")))?;
        *self.ws.lock().await = Some(stream);
        Ok(())
    }

    async fn targets(&self) -> Result<Vec<TargetInfo>, PageError> {
        let response = self
            .http
            .get(format!("{}/json", self.http_base))
            .send()
            .await
            .map_err(|e| PageError::Endpoint(format!("target listing failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| PageError::Endpoint(format!("target listing is not parseable: {e}")))
    }

    /// Send one command and wait for its reply, skipping interleaved
    /// protocol events on the channel.
    async fn command(&self, method: &str, params: Value) -> Result<Value, PageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_string(&CdpCommand { id, method, params })
            .map_err(|e| PageError::Eval(format!("command serialization failed: {e}")))?;

        let mut guard = self.ws.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| PageError::Endpoint("command channel not connected".into()))?;
        stream
            .send(Message::Text(payload))
            .await
            .map_err(|e| PageError::Endpoint(format!("command send failed: {e}")))?;

        while let Some(message) = stream.next().await {
            let message =
                message.map_err(|e| PageError::Endpoint(format!("command channel error: {e}")))?;
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(reply) = serde_json::from_str::<CdpReply>(&text) else {
                continue;
            };
            if reply.id != Some(id) {
                // Unsolicited protocol event; the engine subscribes to none.
                continue;
            }
            if let Some(error) = reply.error {
                return Err(PageError::Eval(format!("{method} failed: {error}")));
            }
            return Ok(reply.result.unwrap_or(Value::Null));
        }
        Err(PageError::Endpoint("command channel closed mid-command".into()))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            return Err(PageError::Eval(format!("page threw: {details}")));
        }
        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn open(&self, url: &str) -> Result<(), PageError> {
        if self.ws.lock().await.is_none() {
            self.connect().await?;
        }
        self.command("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| PageError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn location(&self) -> Result<String, PageError> {
        let value = self.evaluate("window.location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PageError::Eval("location.href did not return a string".into()))
    }

    async fn eval(&self, script: &str) -> Result<Value, PageError> {
        self.evaluate(script).await
    }

    async fn click_text(&self, label: &str) -> Result<bool, PageError> {
        let value = self.evaluate(&scripts::click_visible(label)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn storage_get(&self, key: &str) -> Result<Option<String>, PageError> {
        let key = scripts::js_string(key);
        let value = self
            .evaluate(&format!("window.localStorage.getItem({key})"))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn storage_set(&self, key: &str, value: &str) -> Result<(), PageError> {
        let key = scripts::js_string(key);
        let value = scripts::js_string(value);
        self.evaluate(&format!("window.localStorage.setItem({key}, {value})"))
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, PageError> {
        let result = self
            .command(
                "Page.captureScreenshot",
                json!({ "format": "png", "captureBeyondViewport": true }),
            )
            .await
            .map_err(|e| PageError::Screenshot(e.to_string()))?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| PageError::Screenshot("no image payload in reply".into()))?;
        BASE64
            .decode(data)
            .map_err(|e| PageError::Screenshot(format!("image payload is not base64: {e}")))
    }
}
