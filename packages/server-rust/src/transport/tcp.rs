//! TCP backend client.
//!
//! One connection per backend, shared by every in-flight call. Requests are
//! tagged with a UUID correlation id and parked in a pending map; a reader
//! task owns the read half and completes the matching waiter when the final
//! reply for that id arrives. The connection is opened lazily on first use
//! and reopened on the next call after it closes.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use gatehouse_core::{ReplyPacket, RequestPacket, ServiceName};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::codec::{CodecError, JsonSocketCodec};
use crate::service::call::RouteError;
use crate::service::client::BackendClient;
use crate::service::targets::Target;

struct PendingReply {
    tx: oneshot::Sender<Result<Value, RouteError>>,
    /// Latest non-final response, returned if the disposing reply has none.
    last: Option<Value>,
}

type PendingMap = DashMap<String, PendingReply>;

struct Connection {
    writer: Mutex<FramedWrite<OwnedWriteHalf, JsonSocketCodec>>,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Removes a waiter from the pending map when its call finishes or is
/// cancelled (e.g. by the timeout layer dropping the future).
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

/// Long-lived client handle for one backend target.
pub struct TcpBackendClient {
    target: Target,
    codec: JsonSocketCodec,
    connect_timeout: Duration,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl TcpBackendClient {
    /// Creates a client without connecting; the first call connects.
    #[must_use]
    pub fn new(target: Target, connect_timeout: Duration, max_frame_len: usize) -> Self {
        Self {
            target,
            codec: JsonSocketCodec::new(max_frame_len),
            connect_timeout,
            connection: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>, RouteError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            if conn.is_open() {
                return Ok(Arc::clone(conn));
            }
            debug!(target_name = %self.target.name, "backend connection closed, reconnecting");
        }
        let conn = Arc::new(self.connect().await?);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn connect(&self) -> Result<Connection, RouteError> {
        let name = self.target.name;
        let addr = self.target.address();
        let connect = TcpStream::connect(addr.as_str());
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(RouteError::Transport { target: name, source }),
            Err(_elapsed) => {
                return Err(RouteError::Transport {
                    target: name,
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connecting to {addr} timed out"),
                    ),
                })
            }
        };
        stream
            .set_nodelay(true)
            .map_err(|source| RouteError::Transport { target: name, source })?;

        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(PendingMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_replies(
            FramedRead::new(read_half, self.codec.clone()),
            name,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        info!(target_name = %name, %addr, "connected to backend");

        Ok(Connection {
            writer: Mutex::new(FramedWrite::new(write_half, self.codec.clone())),
            pending,
            closed,
            reader,
        })
    }

    async fn write(&self, conn: &Connection, packet: RequestPacket) -> Result<(), RouteError> {
        let target = self.target.name;
        let mut writer = conn.writer.lock().await;
        writer.send(packet).await.map_err(|err| match err {
            CodecError::Io(source) => {
                conn.closed.store(true, Ordering::SeqCst);
                RouteError::Transport { target, source }
            }
            other => RouteError::Codec {
                target,
                source: other,
            },
        })
    }
}

#[async_trait]
impl BackendClient for TcpBackendClient {
    fn target(&self) -> ServiceName {
        self.target.name
    }

    async fn send(&self, pattern: &str, payload: Value) -> Result<Value, RouteError> {
        let target = self.target.name;
        let conn = self.connection().await?;

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        conn.pending.insert(id.clone(), PendingReply { tx, last: None });
        let _pending = PendingGuard {
            pending: &conn.pending,
            id: &id,
        };
        // The reader marks the connection closed before failing waiters, so a
        // waiter inserted after that sweep is caught here.
        if !conn.is_open() {
            return Err(RouteError::ConnectionClosed { target });
        }

        self.write(&conn, RequestPacket::request(id.clone(), pattern, payload))
            .await?;

        rx.await
            .unwrap_or(Err(RouteError::ConnectionClosed { target }))
    }

    async fn emit(&self, pattern: &str, payload: Value) -> Result<Value, RouteError> {
        let conn = self.connection().await?;
        self.write(&conn, RequestPacket::event(pattern, payload))
            .await?;
        Ok(Value::Null)
    }

    async fn close(&self) -> anyhow::Result<()> {
        let Some(conn) = self.connection.lock().await.take() else {
            return Ok(());
        };
        conn.closed.store(true, Ordering::SeqCst);
        fail_pending(&conn.pending, self.target.name);

        let mut writer = conn.writer.lock().await;
        writer.get_mut().shutdown().await?;
        info!(target_name = %self.target.name, "closed backend connection");
        Ok(())
    }
}

async fn read_replies(
    mut frames: FramedRead<OwnedReadHalf, JsonSocketCodec>,
    target: ServiceName,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(value) => match serde_json::from_value::<ReplyPacket>(value) {
                Ok(reply) => dispatch_reply(&pending, target, reply),
                Err(err) => warn!(target_name = %target, error = %err, "ignoring malformed reply"),
            },
            Err(err) => {
                warn!(target_name = %target, error = %err, "backend connection failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending, target);
    debug!(target_name = %target, "backend reader finished");
}

fn dispatch_reply(pending: &PendingMap, target: ServiceName, reply: ReplyPacket) {
    let Some(id) = reply.id.as_deref() else {
        debug!(target_name = %target, "dropping reply without id");
        return;
    };

    if !reply.is_final() {
        if let Some(mut waiter) = pending.get_mut(id) {
            if reply.response.is_some() {
                waiter.last = reply.response;
            }
        }
        return;
    }

    let Some((_, waiter)) = pending.remove(id) else {
        debug!(target_name = %target, id, "reply for an unknown or abandoned call");
        return;
    };

    let result = match reply.error_message() {
        Some(message) => Err(RouteError::Remote { target, message }),
        None => reply
            .response
            .or(waiter.last)
            .ok_or(RouteError::EmptyResponse { target }),
    };
    let _ = waiter.tx.send(result);
}

fn fail_pending(pending: &PendingMap, target: ServiceName) {
    let ids: Vec<String> = pending.iter().map(|entry| entry.key().clone()).collect();
    for id in ids {
        if let Some((_, waiter)) = pending.remove(&id) {
            let _ = waiter.tx.send(Err(RouteError::ConnectionClosed { target }));
        }
    }
}
