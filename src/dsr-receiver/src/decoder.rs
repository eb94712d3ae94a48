// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Decode loop: the consumer side of the session queue.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::debug;

use dsr_core::{decode_symbols, DecodeStats, StreamHeader, SymbolFormat};

use crate::sink::SymbolSink;

/// Drain payload chunks, decode them and hand the symbols to `sink`.
///
/// Runs until the receive side drops its queue sender, or until
/// `shutdown_rx` is set while the queue is idle. This task is the only
/// writer of the decode counters: they are published on `stats_tx` after
/// every chunk and returned when the loop ends.
pub async fn run_decoder(
    mut queue_rx: mpsc::Receiver<Bytes>,
    header_rx: watch::Receiver<Option<StreamHeader>>,
    shutdown_rx: watch::Receiver<bool>,
    stats_tx: watch::Sender<DecodeStats>,
    mut sink: Box<dyn SymbolSink>,
    poll_timeout: Duration,
) -> DecodeStats {
    let mut stats = DecodeStats::default();
    let mut announced = false;
    let mut symbols = Vec::new();

    loop {
        let chunk = match time::timeout(poll_timeout, queue_rx.recv()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_) => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        // Chunks are only queued after the header has been published.
        let Some(header) = *header_rx.borrow() else {
            debug!("Payload chunk before stream header, skipping");
            continue;
        };
        if !announced {
            sink.on_header(&header);
            announced = true;
        }

        let decoded = decode_symbols(&chunk, header.bits_per_symbol);
        let format: SymbolFormat = decoded.format();
        symbols.clear();
        symbols.extend(decoded);
        sink.on_symbols(format, &symbols);

        stats.packets_received += 1;
        stats.symbols_received += chunk.len() as u64;
        stats_tx.send_replace(stats);
    }

    sink.finish();
    debug!(
        "Decode loop finished ({} packets, {} symbols)",
        stats.packets_received, stats.symbols_received
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default, Clone)]
    struct Collected {
        headers: Arc<Mutex<Vec<StreamHeader>>>,
        symbols: Arc<Mutex<Vec<Vec<u8>>>>,
        finished: Arc<Mutex<bool>>,
    }

    struct CollectSink(Collected);

    impl SymbolSink for CollectSink {
        fn on_header(&mut self, header: &StreamHeader) {
            self.0.headers.lock().unwrap().push(*header);
        }

        fn on_symbols(&mut self, _format: SymbolFormat, symbols: &[u8]) {
            self.0.symbols.lock().unwrap().push(symbols.to_vec());
        }

        fn finish(&mut self) {
            *self.0.finished.lock().unwrap() = true;
        }
    }

    #[tokio::test]
    async fn test_decodes_until_sender_dropped() {
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (_header_tx, header_rx) = watch::channel(Some(StreamHeader::new(6, 4800, 2, 0)));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stats_tx, stats_rx) = watch::channel(DecodeStats::default());
        let collected = Collected::default();

        queue_tx.send(Bytes::from_static(&[0, 1, 2, 3, 4, 5])).await.unwrap();
        queue_tx.send(Bytes::from_static(&[3, 9])).await.unwrap();
        drop(queue_tx);

        let stats = run_decoder(
            queue_rx,
            header_rx,
            shutdown_rx,
            stats_tx,
            Box::new(CollectSink(collected.clone())),
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(stats.packets_received, 2);
        // Counted per received byte, before dibit filtering.
        assert_eq!(stats.symbols_received, 8);
        assert_eq!(
            *collected.symbols.lock().unwrap(),
            vec![vec![0, 1, 2, 3], vec![3]]
        );
        assert_eq!(*stats_rx.borrow(), stats);
        assert_eq!(collected.headers.lock().unwrap().len(), 1);
        assert!(*collected.finished.lock().unwrap());
    }

    #[tokio::test]
    async fn test_stops_on_shutdown_when_idle() {
        let (_queue_tx, queue_rx) = mpsc::channel::<Bytes>(8);
        let (_header_tx, header_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stats_tx, _stats_rx) = watch::channel(DecodeStats::default());

        let handle = tokio::spawn(run_decoder(
            queue_rx,
            header_rx,
            shutdown_rx,
            stats_tx,
            Box::new(CollectSink(Collected::default())),
            Duration::from_millis(20),
        ));
        shutdown_tx.send_replace(true);

        let stats = time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("decoder should observe shutdown")
            .unwrap();
        assert_eq!(stats, DecodeStats::default());
    }
}
