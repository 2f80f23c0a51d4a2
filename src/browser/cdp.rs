// src/browser/cdp.rs
//! Minimal DevTools-protocol client
//!
//! Speaks the Chrome DevTools protocol over the browser's websocket
//! endpoint: commands are JSON objects correlated by an increasing `id`,
//! everything without an `id` is an event. One background task owns the
//! socket; callers get their reply through a oneshot registered under the
//! command id, and events fan out on a broadcast channel.

use crate::utils::errors::{PoolError, Result};
use futures::stream::StreamExt;
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

/// Upper bound on a single command round trip.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered protocol events before slow subscribers start lagging.
const EVENT_BUFFER: usize = 256;

type ReplySender = oneshot::Sender<std::result::Result<Value, String>>;

/// A protocol event (anything the browser pushes without an `id`).
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Client for one DevTools websocket connection.
pub struct CdpClient {
    next_id: AtomicU64,
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<HashMap<u64, ReplySender>>>,
    events: broadcast::Sender<CdpEvent>,
    closed: watch::Receiver<bool>,
    io_task: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools websocket endpoint.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let (socket, _) = connect_async(endpoint).await.map_err(|e| {
            PoolError::ControlChannel(format!("connect to {endpoint} failed: {e}"))
        })?;
        let (mut sink, mut stream) = socket.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<Mutex<HashMap<u64, ReplySender>>> = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (closed_tx, closed) = watch::channel(false);

        let io_pending = Arc::clone(&pending);
        let io_events = events.clone();
        let io_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    command = outbound_rx.recv() => match command {
                        Some(message) => {
                            if sink.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            Self::dispatch(&io_pending, &io_events, &text);
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
            for (_, reply) in io_pending.lock().drain() {
                let _ = reply.send(Err("control channel closed".into()));
            }
            let _ = closed_tx.send(true);
        });

        Ok(Self {
            next_id: AtomicU64::new(0),
            outbound,
            pending,
            events,
            closed,
            io_task,
        })
    }

    fn dispatch(
        pending: &Mutex<HashMap<u64, ReplySender>>,
        events: &broadcast::Sender<CdpEvent>,
        text: &str,
    ) {
        let message: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "discarding unparsable protocol message");
                return;
            }
        };
        if let Some(id) = message.get("id").and_then(Value::as_u64) {
            if let Some(reply) = pending.lock().remove(&id) {
                let outcome = if let Some(error) = message.get("error") {
                    let detail = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown protocol error");
                    Err(detail.to_string())
                } else {
                    Ok(message.get("result").cloned().unwrap_or(Value::Null))
                };
                let _ = reply.send(outcome);
            }
            return;
        }
        if let Some(method) = message.get("method").and_then(Value::as_str) {
            trace!(method, "protocol event");
            let _ = events.send(CdpEvent {
                method: method.to_string(),
                params: message.get("params").cloned().unwrap_or(Value::Null),
                session_id: message
                    .get("sessionId")
                    .and_then(Value::as_str)
                    .map(String::from),
            });
        }
    }

    /// Issue a browser-level command and await its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_impl(None, method, params).await
    }

    /// Issue a command on an attached session.
    pub async fn call_on(&self, session_id: &str, method: &str, params: Value) -> Result<Value> {
        self.call_impl(Some(session_id), method, params).await
    }

    async fn call_impl(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut command = json!({ "id": id, "method": method, "params": params });
        if let Some(session) = session_id {
            command["sessionId"] = Value::String(session.to_string());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(id, reply_tx);
        self.outbound
            .send(Message::Text(command.to_string()))
            .map_err(|_| PoolError::ControlChannel("control channel closed".into()))?;

        match tokio::time::timeout(CALL_TIMEOUT, reply_rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(detail))) => Err(PoolError::ControlChannel(format!("{method}: {detail}"))),
            Ok(Err(_)) => Err(PoolError::ControlChannel("control channel closed".into())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(PoolError::ControlChannel(format!("{method} timed out")))
            }
        }
    }

    /// Subscribe to protocol events. Subscribe before issuing the command
    /// whose event is awaited.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Await one event matching `method` (and session, when given).
    pub async fn wait_event(
        &self,
        events: &mut broadcast::Receiver<CdpEvent>,
        session_id: Option<&str>,
        method: &str,
        limit: Duration,
    ) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Ok(event)) => event,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(PoolError::ControlChannel("control channel closed".into()));
                }
                Err(_) => {
                    return Err(PoolError::ControlChannel(format!(
                        "timed out waiting for {method}"
                    )));
                }
            };
            if event.method == method
                && (session_id.is_none() || event.session_id.as_deref() == session_id)
            {
                return Ok(event.params);
            }
        }
    }

    /// Observer that flips to `true` when the socket drops.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    /// Tear the connection down.
    pub fn shutdown(&self) {
        self.io_task.abort();
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}
