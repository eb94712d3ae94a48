// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Session orchestration: owns the transport, runs the receive loop and
//! the decode loop side by side, and assembles the final statistics once
//! both have ended.

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use dsr_core::{
    lookup_protocol, DecodeStats, ProtocolMatch, ReceiveStats, SessionStats, StatsReport,
    StreamHeader,
};

use crate::config::{ReceiverConfig, TransportKind};
use crate::decoder::run_decoder;
use crate::session::StreamSession;
use crate::sink::SymbolSink;
use crate::transport::{Chunk, Transport, TransportError};

/// Everything a receiver needs to run, resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct ReceiverOptions {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub expected: Option<ProtocolMatch>,
    pub queue_capacity: usize,
    pub recv_buffer_size: usize,
    pub poll_timeout: Duration,
    pub stop_timeout: Duration,
}

impl ReceiverOptions {
    pub fn from_config(cfg: &ReceiverConfig) -> Self {
        Self {
            transport: cfg.stream.transport,
            host: cfg.stream.host.clone(),
            port: cfg.stream.port,
            expected: cfg.stream.protocol.as_deref().and_then(lookup_protocol),
            queue_capacity: cfg.session.queue_capacity,
            recv_buffer_size: cfg.session.recv_buffer_size,
            poll_timeout: cfg.session.poll_timeout(),
            stop_timeout: cfg.session.stop_timeout(),
        }
    }
}

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// A stop was requested.
    Stopped,
    /// TCP peer closed the connection.
    PeerClosed,
    /// Transport I/O failed mid-stream.
    Failed(io::ErrorKind),
}

pub struct Receiver {
    shutdown_tx: watch::Sender<bool>,
    receive_task: Option<JoinHandle<(ReceiveStats, StreamEnd)>>,
    decode_task: Option<JoinHandle<DecodeStats>>,
    decode_stats_rx: watch::Receiver<DecodeStats>,
    local_addr: Option<SocketAddr>,
    started_at: Instant,
    stop_timeout: Duration,
    runtime: Option<Duration>,
    stats: Option<SessionStats>,
    end: Option<StreamEnd>,
}

impl Receiver {
    /// Open the transport and launch the receive and decode loops.
    ///
    /// Fails only when the transport cannot be opened.
    pub async fn start(
        opts: ReceiverOptions,
        sink: Box<dyn SymbolSink>,
    ) -> Result<Self, TransportError> {
        let transport = Transport::connect(opts.transport, &opts.host, opts.port).await?;
        let local_addr = transport.local_addr().ok();
        let started_at = Instant::now();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue_tx, queue_rx) = mpsc::channel::<Bytes>(opts.queue_capacity);
        let (header_tx, header_rx) = watch::channel::<Option<StreamHeader>>(None);
        let (decode_stats_tx, decode_stats_rx) = watch::channel(DecodeStats::default());

        let decode_task = tokio::spawn(run_decoder(
            queue_rx,
            header_rx,
            shutdown_rx.clone(),
            decode_stats_tx,
            sink,
            opts.poll_timeout,
        ));

        let session = StreamSession::new(queue_tx, header_tx, opts.expected);
        let receive_task = tokio::spawn(run_receive_loop(
            transport,
            session,
            opts.recv_buffer_size,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            shutdown_tx,
            receive_task: Some(receive_task),
            decode_task: Some(decode_task),
            decode_stats_rx,
            local_addr,
            started_at,
            stop_timeout: opts.stop_timeout,
            runtime: None,
            stats: None,
            end: None,
        })
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Resolves once a stop has been requested or the stream ended on its
    /// own (peer EOF or transport error).
    pub async fn closed(&self) {
        wait_for_shutdown(self.shutdown_tx.subscribe()).await;
    }

    /// Stop both loops and collect their counters. Safe to call repeatedly;
    /// later calls return the statistics gathered by the first.
    pub async fn stop(&mut self) -> SessionStats {
        if let Some(stats) = &self.stats {
            return stats.clone();
        }
        self.shutdown_tx.send_replace(true);

        let (receive, end) = match self.receive_task.take() {
            Some(handle) => join_within(handle, self.stop_timeout, "Receive loop")
                .await
                .unwrap_or((ReceiveStats::default(), StreamEnd::Stopped)),
            None => (ReceiveStats::default(), StreamEnd::Stopped),
        };
        let decode = match self.decode_task.take() {
            Some(handle) => join_within(handle, self.stop_timeout, "Decode loop").await,
            None => None,
        };
        // An aborted decode loop still leaves the counts it published.
        let decode = decode.unwrap_or_else(|| *self.decode_stats_rx.borrow());

        self.runtime = Some(self.started_at.elapsed());
        self.end = Some(end);
        let stats = SessionStats::new(receive, decode);
        self.stats = Some(stats.clone());
        stats
    }

    /// Time since start, frozen at the moment of `stop`.
    pub fn runtime(&self) -> Duration {
        self.runtime.unwrap_or_else(|| self.started_at.elapsed())
    }

    /// Why the stream ended; `None` until [`Receiver::stop`] has completed.
    pub fn stream_end(&self) -> Option<StreamEnd> {
        self.end
    }

    /// Final report; `None` until [`Receiver::stop`] has completed.
    pub fn report(&self) -> Option<StatsReport> {
        self.stats.as_ref().map(|s| s.report(self.runtime()))
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn join_within<T>(mut handle: JoinHandle<T>, limit: Duration, what: &str) -> Option<T> {
    match time::timeout(limit, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!("{} task failed: {}", what, e);
            None
        }
        Err(_) => {
            warn!("{} did not stop within {:?}, aborting", what, limit);
            handle.abort();
            None
        }
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

/// Receive chunks until EOF, a transport error or a stop request. Ending
/// for any reason requests a stop of the whole session.
async fn run_receive_loop(
    mut transport: Transport,
    mut session: StreamSession,
    max_len: usize,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
) -> (ReceiveStats, StreamEnd) {
    let end = loop {
        tokio::select! {
            _ = wait_for_shutdown(shutdown_rx.clone()) => break StreamEnd::Stopped,
            res = transport.recv_chunk(max_len) => match res {
                Ok(Chunk::Data(bytes)) => {
                    session.on_chunk(bytes);
                }
                Ok(Chunk::Eof) => {
                    info!("Connection closed by peer");
                    break StreamEnd::PeerClosed;
                }
                Err(e) => {
                    if *shutdown_rx.borrow() {
                        break StreamEnd::Stopped;
                    }
                    error!("{} receive error: {}", transport.kind(), e);
                    break StreamEnd::Failed(e.kind());
                }
            }
        }
    };

    shutdown_tx.send_replace(true);
    debug!(
        "Receive loop finished ({} bytes, {} chunks dropped)",
        session.stats().bytes_received,
        session.stats().chunks_dropped
    );
    drop(transport);
    // Dropping the session closes the queue so the decode loop can drain.
    (session.into_stats(), end)
}
