//! Low-level Chrome DevTools Protocol (CDP) client over WebSocket.
//!
//! One client per target: the browser endpoint for target management, and one
//! per page for everything that acts on that page.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};
use webcell_core::{Error, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type Listeners = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

/// A CDP WebSocket client that can send commands and receive responses/events.
pub struct CdpClient {
    /// Sender to write messages to the WebSocket.
    ws_tx: mpsc::Sender<String>,
    /// Pending command responses, keyed by request ID.
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    next_id: AtomicU64,
    /// Event listeners (domain.event -> channels).
    event_listeners: Listeners,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a CDP WebSocket endpoint.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            Error::Browser(format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))
        })?;

        let (mut ws_sink, mut ws_stream_read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let event_listeners: Listeners = Arc::new(Mutex::new(HashMap::new()));
        let events_clone = event_listeners.clone();

        // Writer task: owns the sink, forwards messages from channel
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches responses by id and events by method
        let reader_handle = tokio::spawn(async move {
            while let Some(msg_result) = ws_stream_read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        let val = match serde_json::from_str::<Value>(&text) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            let mut pending = pending_clone.lock().await;
                            if let Some(tx) = pending.remove(&id) {
                                let _ = tx.send(val);
                            }
                        } else if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
                            let mut listeners = events_clone.lock().await;
                            if let Some(senders) = listeners.get_mut(method) {
                                let params = val.get("params").cloned().unwrap_or(Value::Null);
                                senders.retain(|tx| !tx.is_closed());
                                for tx in senders.iter() {
                                    let _ = tx.try_send(params.clone());
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        })
    }

    /// Send a CDP command and wait for the response.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Browser(format!("Failed to send CDP command: {}", e)))?;

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    Err(Error::Browser(format!("CDP error in {}: {}", method, error)))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Browser("CDP response channel closed".to_string())),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Timeout(format!(
                    "CDP command '{}' timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Subscribe to a CDP event. Returns a receiver that will get event params.
    /// Dropping the receiver unsubscribes on the next matching event.
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        let mut listeners = self.event_listeners.lock().await;
        listeners.entry(method.to_string()).or_default().push(tx);
        rx
    }

    /// Wait for the next event on an existing subscription.
    pub async fn next_event(
        rx: &mut mpsc::Receiver<Value>,
        what: &str,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(params)) => Ok(params),
            Ok(None) => Err(Error::Browser(format!("CDP connection closed while waiting for {}", what))),
            Err(_) => Err(Error::Timeout(format!(
                "no {} within {}ms",
                what,
                timeout.as_millis()
            ))),
        }
    }

    /// Enable a CDP domain (e.g., "Page", "Runtime", "DOM", "Accessibility").
    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({})).await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value> {
        let result = self.send_command("Page.navigate", json!({"url": url})).await?;
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::Browser(format!("navigation to {} failed: {}", url, error_text)));
        }
        Ok(result)
    }

    /// Evaluate JavaScript in the page context and return its value.
    pub async fn evaluate_js(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::Browser(format!("script threw: {}", details)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Get the full accessibility tree via CDP.
    pub async fn get_accessibility_tree(&self) -> Result<Value> {
        self.send_command("Accessibility.getFullAXTree", json!({})).await
    }

    /// `DOM.describeNode` for a backend node; returns the `node` object.
    pub async fn describe_node(&self, backend_node_id: i64) -> Result<Value> {
        let result = self
            .send_command("DOM.describeNode", json!({"backendNodeId": backend_node_id}))
            .await?;
        Ok(result.get("node").cloned().unwrap_or(Value::Null))
    }

    /// `DOM.getBoxModel` border quad for a backend node.
    pub async fn get_box_model(&self, backend_node_id: i64) -> Result<Vec<f64>> {
        let result = self
            .send_command("DOM.getBoxModel", json!({"backendNodeId": backend_node_id}))
            .await?;
        Ok(result
            .get("model")
            .and_then(|m| m.get("border"))
            .and_then(|c| c.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default())
    }

    /// Resolve a backend node to a Runtime object id for JS interaction.
    pub async fn resolve_node(&self, backend_node_id: i64) -> Result<String> {
        let result = self
            .send_command("DOM.resolveNode", json!({"backendNodeId": backend_node_id}))
            .await?;
        result
            .get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Browser(format!("Failed to resolve node {}", backend_node_id)))
    }

    /// Call a function with `this` bound to a remote object; returns its value.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let args: Vec<Value> = arguments.into_iter().map(|v| json!({"value": v})).collect();
        let result = self
            .send_command(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function_declaration,
                    "arguments": args,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::Browser(format!("script threw: {}", details)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn scroll_into_view(&self, backend_node_id: i64) -> Result<()> {
        self.send_command(
            "DOM.scrollIntoViewIfNeeded",
            json!({"backendNodeId": backend_node_id}),
        )
        .await?;
        Ok(())
    }

    pub async fn focus(&self, backend_node_id: i64) -> Result<()> {
        self.send_command("DOM.focus", json!({"backendNodeId": backend_node_id}))
            .await?;
        Ok(())
    }

    /// Dispatch a mouse event via Input domain.
    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
        button: &str,
        click_count: i32,
    ) -> Result<()> {
        self.send_command(
            "Input.dispatchMouseEvent",
            json!({
                "type": event_type,
                "x": x,
                "y": y,
                "button": button,
                "clickCount": click_count,
            }),
        )
        .await?;
        Ok(())
    }

    /// Dispatch a wheel event at the given viewport point.
    pub async fn dispatch_mouse_wheel(&self, x: f64, y: f64, delta_x: i64, delta_y: i64) -> Result<()> {
        self.send_command(
            "Input.dispatchMouseEvent",
            json!({
                "type": "mouseWheel",
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            }),
        )
        .await?;
        Ok(())
    }

    /// Dispatch a key event via Input domain.
    pub async fn dispatch_key_event(
        &self,
        event_type: &str,
        key: &str,
        code: &str,
        modifiers: i32,
    ) -> Result<()> {
        let mut params = json!({
            "type": event_type,
            "key": key,
            "code": code,
        });
        if modifiers != 0 {
            params["modifiers"] = json!(modifiers);
        }
        if let Some(vk) = virtual_key_code(key) {
            params["windowsVirtualKeyCode"] = json!(vk);
        }
        // Ctrl/Meta+A is an editing command, not text
        if event_type == "keyDown" && modifiers & 6 != 0 && key.eq_ignore_ascii_case("a") {
            params["commands"] = json!(["selectAll"]);
        }
        // Printable characters without a command modifier produce text
        if event_type == "keyDown" && key.chars().count() == 1 && modifiers & !8 == 0 {
            params["text"] = json!(key);
        }
        self.send_command("Input.dispatchKeyEvent", params).await?;
        Ok(())
    }

    // ─── Target management ────────────────────────────────────────────

    /// Create a new page target (tab) with the given URL.
    pub async fn create_target(&self, url: &str) -> Result<String> {
        let result = self
            .send_command("Target.createTarget", json!({"url": url}))
            .await?;
        result
            .get("targetId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Browser("No targetId returned from createTarget".to_string()))
    }

    // ─── Files ────────────────────────────────────────────────────────

    /// Set files on a file input element identified by backendNodeId.
    pub async fn set_file_input_files(&self, files: Vec<String>, backend_node_id: i64) -> Result<()> {
        self.send_command(
            "DOM.setFileInputFiles",
            json!({
                "files": files,
                "backendNodeId": backend_node_id,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_intercept_file_chooser(&self, enabled: bool) -> Result<()> {
        self.send_command(
            "Page.setInterceptFileChooserDialog",
            json!({"enabled": enabled}),
        )
        .await?;
        Ok(())
    }

    /// Route downloads into `dir`, saved under their guid, with progress events.
    pub async fn set_download_behavior(&self, dir: &std::path::Path) -> Result<()> {
        self.send_command(
            "Browser.setDownloadBehavior",
            json!({
                "behavior": "allowAndName",
                "downloadPath": dir.display().to_string(),
                "eventsEnabled": true,
            }),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._reader_handle.abort();
        self._writer_handle.abort();
    }
}

/// Windows virtual key code for a DOM key name; needed for shortcuts to fire.
fn virtual_key_code(key: &str) -> Option<u32> {
    let code = match key {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "Escape" => 27,
        " " => 32,
        "PageUp" => 33,
        "PageDown" => 34,
        "End" => 35,
        "Home" => 36,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        "Delete" => 46,
        _ => {
            let mut chars = key.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => Some(c.to_ascii_uppercase() as u32),
                _ => None,
            };
        }
    };
    Some(code)
}
