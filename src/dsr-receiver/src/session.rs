// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receive-side half of a stream session.
//!
//! Strips the one-time stream header from the first chunk, then forwards
//! payload chunks to the decode queue without ever blocking the receive
//! path: when the queue is full the chunk is dropped.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use dsr_app::hex_prefix;
use dsr_core::{
    parse_header, HeaderError, ProtocolKind, ProtocolMatch, ReceiveStats, StreamHeader,
    HEADER_SIZE, STREAM_MAGIC,
};

const HEX_DUMP_BYTES: usize = 16;
const DROP_WARN_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHeader,
    Streaming,
}

/// What happened to one inbound chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Header accepted; `queued` tells whether trailing payload was queued.
    HeaderAccepted { queued: bool },
    /// Still waiting for a header; chunk discarded.
    HeaderRejected,
    Queued,
    Dropped,
    /// Nothing to forward (header-only chunk or empty read).
    Empty,
}

pub struct StreamSession {
    state: SessionState,
    queue_tx: mpsc::Sender<Bytes>,
    header_tx: watch::Sender<Option<StreamHeader>>,
    expected: Option<ProtocolMatch>,
    stats: ReceiveStats,
}

impl StreamSession {
    pub fn new(
        queue_tx: mpsc::Sender<Bytes>,
        header_tx: watch::Sender<Option<StreamHeader>>,
        expected: Option<ProtocolMatch>,
    ) -> Self {
        Self {
            state: SessionState::AwaitingHeader,
            queue_tx,
            header_tx,
            expected,
            stats: ReceiveStats::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn header(&self) -> Option<&StreamHeader> {
        self.stats.header.as_ref()
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    pub fn into_stats(self) -> ReceiveStats {
        self.stats
    }

    /// Account for and route one inbound chunk.
    pub fn on_chunk(&mut self, chunk: Bytes) -> ChunkOutcome {
        self.stats.bytes_received += chunk.len() as u64;
        if !chunk.is_empty() {
            debug!(
                "Received {} bytes: {}",
                chunk.len(),
                hex_prefix(&chunk, HEX_DUMP_BYTES)
            );
        }

        match self.state {
            SessionState::AwaitingHeader => self.on_header_chunk(chunk),
            SessionState::Streaming => self.enqueue(chunk),
        }
    }

    fn on_header_chunk(&mut self, chunk: Bytes) -> ChunkOutcome {
        let header = match parse_header(&chunk) {
            Ok(header) => header,
            Err(HeaderError::Truncated(len)) => {
                debug!(
                    "Discarding {} byte chunk while awaiting a {} byte header",
                    len, HEADER_SIZE
                );
                return ChunkOutcome::HeaderRejected;
            }
            Err(HeaderError::InvalidMagic(found)) => {
                debug!(
                    "Checking header: magic={:08X}, expected={:08X}",
                    found.magic, STREAM_MAGIC
                );
                warn!("Invalid header magic: {:08X}", found.magic);
                return ChunkOutcome::HeaderRejected;
            }
        };

        info!("Digital stream header received: {}", header);
        self.check_expected(&header);

        self.stats.header = Some(header);
        self.state = SessionState::Streaming;
        self.header_tx.send_replace(Some(header));

        let payload = chunk.slice(HEADER_SIZE..);
        let queued = matches!(self.enqueue(payload), ChunkOutcome::Queued);
        ChunkOutcome::HeaderAccepted { queued }
    }

    fn check_expected(&self, header: &StreamHeader) {
        let kind = ProtocolKind::from_id(header.protocol_id);
        if let Some(expected) = &self.expected {
            match kind {
                Some(kind) if expected.matches(kind) => {}
                _ => warn!(
                    "Stream protocol {} does not match the expected protocol",
                    header.protocol_name()
                ),
            }
        }
        if let Some(kind) = kind {
            let nominal = kind.profile().bits_per_symbol;
            if header.bits_per_symbol != nominal {
                warn!(
                    "{} normally carries {} bit(s)/symbol, header announces {}",
                    kind, nominal, header.bits_per_symbol
                );
            }
        }
    }

    fn enqueue(&mut self, payload: Bytes) -> ChunkOutcome {
        if payload.is_empty() {
            return ChunkOutcome::Empty;
        }
        match self.queue_tx.try_send(payload) {
            Ok(()) => ChunkOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.chunks_dropped += 1;
                let dropped = self.stats.chunks_dropped;
                if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
                    warn!("Decode queue full, dropped {} chunk(s) so far", dropped);
                }
                ChunkOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Decode queue closed, discarding chunk");
                ChunkOutcome::Dropped
            }
        }
    }
}
