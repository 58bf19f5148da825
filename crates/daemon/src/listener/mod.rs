// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for socket I/O.
//!
//! Two Unix sockets: the private one (trusted daemons, full surface) and an
//! optional public one (apps; private-only methods rejected). Each
//! connection reads newline-delimited JSON requests and writes replies and
//! subscription event records, serialized through one writer task.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use am_core::{AmError, BusId, BusType};
use am_wire::{Reply, Request};

use crate::engine::signal::Signal;
use crate::engine::{ConnCtx, EngineHandle, Msg};

/// Accept loop over one socket.
pub struct Listener {
    socket: UnixListener,
    bus: BusType,
    handle: EngineHandle,
}

/// Remove a stale socket file and bind fresh.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(path)
}

impl Listener {
    pub fn new(socket: UnixListener, bus: BusType, handle: EngineHandle) -> Self {
        Self { socket, bus, handle }
    }

    /// Accept connections until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(bus = %self.bus, "listener started");
        let mut next_conn_id: u64 = 1;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.socket.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let conn_id = next_conn_id;
                            next_conn_id += 1;
                            let handle = self.handle.clone();
                            let bus = self.bus;
                            let child_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, conn_id, bus, handle, child_shutdown)
                                    .await;
                            });
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
        info!(bus = %self.bus, "listener stopped");
    }
}

/// Serve one connection until it closes.
async fn handle_connection(
    stream: UnixStream,
    conn_id: u64,
    bus: BusType,
    handle: EngineHandle,
    shutdown: CancellationToken,
) {
    debug!(conn = conn_id, bus = %bus, "connection opened");
    let (read_half, mut write_half) = stream.into_split();

    // All outbound traffic (replies and event records) funnels through one
    // writer so per-subscription FIFO order survives.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    // Subscription events: EventRecord → JSON line.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<am_wire::EventRecord>();
    let event_line_tx = line_tx.clone();
    tokio::spawn(async move {
        while let Some(record) = event_rx.recv().await {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    if event_line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "failed to serialize event record"),
            }
        }
    });

    let mut caller = BusId::anonymous(format!("conn-{conn_id}"));
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                debug!(conn = conn_id, error = %err, "malformed request");
                let reply =
                    Reply::error(&AmError::invalid_argument(format!("malformed request: {err}")));
                send_reply(&line_tx, &reply);
                continue;
            }
        };
        // The handshake pins the caller identity for this connection.
        if let Request::Hello { caller: Some(identity), .. } = &request {
            caller = BusId::parse(identity);
        }

        let ctx = ConnCtx { conn_id, caller: caller.clone(), bus, outlet: event_tx.clone() };
        let (reply_tx, reply_rx) = oneshot::channel();
        if handle.msg_tx.send(Msg::Rpc { ctx, request, reply: reply_tx }).await.is_err() {
            break;
        }
        match reply_rx.await {
            Ok(reply) => send_reply(&line_tx, &reply),
            // Engine dropped the reply channel; treat as internal.
            Err(_) => send_reply(
                &line_tx,
                &Reply::error(&AmError::internal("request dropped during shutdown")),
            ),
        }
    }

    let _ = handle.signal_tx.send(Signal::ConnectionClosed { conn_id });
    writer.abort();
    debug!(conn = conn_id, "connection closed");
}

fn send_reply(line_tx: &mpsc::UnboundedSender<String>, reply: &Reply) {
    match serde_json::to_string(reply) {
        Ok(line) => {
            let _ = line_tx.send(line);
        }
        Err(err) => warn!(error = %err, "failed to serialize reply"),
    }
}
