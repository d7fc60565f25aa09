//! NUL-delimited JSON-RPC 2.0 server over a Unix or TCP socket. Each
//! connection gets two tokio tasks, not two OS threads as the original
//! command server used: a reader task that parses frames and dispatches
//! them, and a writer task that owns the socket's write half and drains
//! an mpsc channel of outbound bytes (responses plus `onchange`
//! notifications). The two tasks talk over that mpsc rather than
//! sharing the socket, so dispatch never blocks on I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use pipeline::{EventBus, PipelineEvent};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::methods::{self, Context};
use crate::protocol::{onchange, RpcError, RpcNotification, RpcRequest, RpcResponse, PARSE_ERROR};

/// Parsed from a config `bind` string: `"unix:/path/to.sock"` or
/// `"tcp:0.0.0.0:4242"`.
#[derive(Debug, Clone)]
pub enum BindAddr {
    Unix(String),
    Tcp(String),
}

impl BindAddr {
    pub fn parse(bind: &str) -> Option<Self> {
        if let Some(path) = bind.strip_prefix("unix:") {
            Some(BindAddr::Unix(path.to_string()))
        } else if let Some(addr) = bind.strip_prefix("tcp:") {
            Some(BindAddr::Tcp(addr.to_string()))
        } else {
            None
        }
    }
}

/// Correlates responses to requests this server itself issues to a
/// client (distinct from the per-connection request ids a client sends
/// us), matching the "random 32-bit id" pending-call bookkeeping of the
/// original command server.
#[derive(Default)]
pub struct PendingCalls {
    next_id: AtomicU32,
    waiting: Mutex<HashMap<u32, oneshot::Sender<Value>>>,
}

impl PendingCalls {
    pub fn register(&self) -> (u32, oneshot::Receiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(rand::random::<u32>() & 0xff);
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    pub fn resolve(&self, id: u32, value: Value) {
        if let Some(tx) = self.waiting.lock().unwrap().remove(&id) {
            let _ = tx.send(value);
        }
    }
}

pub struct Server {
    ctx: Arc<Context>,
    events: Arc<EventBus>,
    pub pending: Arc<PendingCalls>,
}

impl Server {
    pub fn new(ctx: Context, events: Arc<EventBus>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            events,
            pending: Arc::new(PendingCalls::default()),
        }
    }

    pub async fn serve(self: Arc<Self>, bind: &str) -> std::io::Result<()> {
        match BindAddr::parse(bind).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad bind address: {bind}"))
        })? {
            BindAddr::Unix(path) => {
                let _ = std::fs::remove_file(&path);
                let listener = UnixListener::bind(&path)?;
                loop {
                    let (stream, _) = listener.accept().await?;
                    let (rd, wr) = stream.into_split();
                    self.clone().spawn_connection(rd, wr);
                }
            }
            BindAddr::Tcp(addr) => {
                let listener = TcpListener::bind(&addr).await?;
                loop {
                    let (stream, _) = listener.accept().await?;
                    let (rd, wr) = stream.into_split();
                    self.clone().spawn_connection(rd, wr);
                }
            }
        }
    }

    pub(crate) fn spawn_connection<R, W>(self: Arc<Self>, mut reader: R, mut writer: W)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(64);

        // Writer task: owns the socket's write half, drains framed
        // bytes pushed by the reader task or by the notification
        // bridge below.
        tokio::spawn(async move {
            while let Some(mut frame) = out_rx.recv().await {
                frame.push(0);
                if let Err(e) = writer.write_all(&frame).await {
                    warn!(%e, "rpc write failed, closing connection");
                    break;
                }
            }
        });

        // Notification bridge: the pipeline's event bus is a blocking
        // std::sync::mpsc channel (every stage runs on an OS thread), so
        // forwarding it onto this connection's async writer happens on
        // a dedicated blocking task.
        let notif_tx = out_tx.clone();
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let (id, rx) = events.subscribe_named("rpc-connection");
            while let Ok(event) = rx.recv() {
                if let Some(notification) = encode_onchange(event) {
                    let bytes = match serde_json::to_vec(&notification) {
                        Ok(b) => b,
                        Err(_) => continue,
                    };
                    if notif_tx.blocking_send(bytes).is_err() {
                        break;
                    }
                }
            }
            events.unsubscribe(id);
        });

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let mut buf = Vec::with_capacity(4096);
            let mut chunk = [0u8; 4096];
            loop {
                let n = match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(%e, "rpc read failed");
                        break;
                    }
                };
                buf.extend_from_slice(&chunk[..n]);
                while let Some(pos) = buf.iter().position(|&b| b == 0) {
                    let frame: Vec<u8> = buf.drain(..=pos).collect();
                    let frame = &frame[..frame.len() - 1];
                    if let Some(response) = handle_frame(&ctx, frame) {
                        let bytes = match serde_json::to_vec(&response) {
                            Ok(b) => b,
                            Err(_) => continue,
                        };
                        if out_tx.send(bytes).await.is_err() {
                            return;
                        }
                    }
                }
            }
            debug!("rpc connection closed");
        });
    }
}

fn handle_frame(ctx: &Context, frame: &[u8]) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(frame) {
        Ok(r) => r,
        Err(e) => {
            error!(%e, "failed to parse rpc frame");
            return Some(RpcResponse::err(Value::Null, RpcError::new(PARSE_ERROR, e.to_string())));
        }
    };

    let result = methods::dispatch(ctx, &request.method, &request.params);
    let id = request.id?; // notifications (no id) get no response
    Some(match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err(e) => RpcResponse::err(id, e),
    })
}

fn encode_onchange(event: PipelineEvent) -> Option<RpcNotification> {
    let (mask, payload) = match event {
        PipelineEvent::PlayerChange { media_id } => (onchange::MEDIA, serde_json::json!({ "media_id": media_id })),
        PipelineEvent::PlayerVolume { level } => (onchange::VOLUME, serde_json::json!({ "level": level })),
        PipelineEvent::SrcNewEs { .. } | PipelineEvent::SrcEndEs { .. } => {
            (onchange::SOURCE, serde_json::json!({}))
        }
        _ => return None,
    };
    Some(RpcNotification::new(
        "onchange",
        serde_json::json!({ "mask": mask, "payload": payload }),
    ))
}
