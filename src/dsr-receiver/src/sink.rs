// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Output sinks for decoded symbols.

use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use dsr_core::recording::{RecordingHeader, RecordingWriter};
use dsr_core::{render_preview, StreamHeader, SymbolFormat};

use crate::config::{OutputConfig, OutputMode};

/// Receives decoded symbols from the decode loop.
///
/// Sinks deal with their own I/O failures; the decode loop never stops
/// because of a sink.
pub trait SymbolSink: Send {
    /// Called once, before the first symbols of a stream.
    fn on_header(&mut self, _header: &StreamHeader) {}

    fn on_symbols(&mut self, format: SymbolFormat, symbols: &[u8]);

    /// Called when the decode loop ends.
    fn finish(&mut self) {}
}

/// Logs a short preview of every decoded chunk.
pub struct ConsoleSink {
    preview_symbols: usize,
}

impl ConsoleSink {
    pub fn new(preview_symbols: usize) -> Self {
        Self { preview_symbols }
    }
}

impl SymbolSink for ConsoleSink {
    fn on_symbols(&mut self, format: SymbolFormat, symbols: &[u8]) {
        if let Some(preview) = render_preview(symbols, format, self.preview_symbols) {
            info!("{}: {}", format.label(), preview);
        }
    }
}

/// Writes symbols to a recording file, opened when the stream header
/// arrives.
pub struct RecordingSink {
    path: PathBuf,
    description: String,
    writer: Option<RecordingWriter<BufWriter<File>>>,
}

impl RecordingSink {
    pub fn new(path: PathBuf, description: String) -> Self {
        Self {
            path,
            description,
            writer: None,
        }
    }

    fn open(&self, header: &StreamHeader) -> std::io::Result<RecordingWriter<BufWriter<File>>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        let start_us = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        let rec_header = RecordingHeader::from_stream(header, start_us, &self.description);
        RecordingWriter::new(BufWriter::new(file), &rec_header)
    }
}

impl SymbolSink for RecordingSink {
    fn on_header(&mut self, header: &StreamHeader) {
        match self.open(header) {
            Ok(writer) => {
                info!(
                    "Recording started: {} ({})",
                    self.path.display(),
                    self.description
                );
                self.writer = Some(writer);
            }
            Err(e) => error!("Failed to open recording {}: {}", self.path.display(), e),
        }
    }

    fn on_symbols(&mut self, _format: SymbolFormat, symbols: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write_symbols(symbols) {
            error!("Recording write error, stopping recording: {}", e);
            self.writer = None;
        }
    }

    fn finish(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let samples = writer.samples();
        match writer.finish() {
            Ok(_) => info!(
                "Recording stopped: {} ({} symbols)",
                self.path.display(),
                samples
            ),
            Err(e) => error!("Failed to finalize recording {}: {}", self.path.display(), e),
        }
    }
}

/// Build the sink selected by `[output].mode`.
pub fn build_sink(cfg: &OutputConfig) -> Box<dyn SymbolSink> {
    match cfg.mode {
        OutputMode::Console => Box::new(ConsoleSink::new(cfg.preview_symbols)),
        OutputMode::File => match &cfg.path {
            Some(path) => Box::new(RecordingSink::new(path.clone(), cfg.description.clone())),
            None => {
                warn!("File output without [output].path, falling back to console");
                Box::new(ConsoleSink::new(cfg.preview_symbols))
            }
        },
        OutputMode::Audio => {
            warn!("Audio output is not available, falling back to console");
            Box::new(ConsoleSink::new(cfg.preview_symbols))
        }
    }
}

#[cfg(test)]
mod tests {
    use dsr_core::recording::{RecordingHeader, RECORDING_HEADER_SIZE};

    use super::*;

    #[test]
    fn test_recording_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("capture.digi");
        let mut sink = RecordingSink::new(path.clone(), "test run".to_string());

        // Symbols before the header have nowhere to go.
        sink.on_symbols(SymbolFormat::Dibits, &[3]);
        sink.on_header(&StreamHeader::new(6, 4800, 2, 0));
        sink.on_symbols(SymbolFormat::Dibits, &[0, 1, 2]);
        sink.on_symbols(SymbolFormat::Dibits, &[3]);
        sink.finish();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), RECORDING_HEADER_SIZE + 4);
        let header = RecordingHeader::read(&data).unwrap();
        assert_eq!(header.protocol_id, 6);
        assert_eq!(header.symbol_rate, 4800);
        assert_eq!(header.bits_per_symbol, 2);
        assert_eq!(header.sample_count, 4);
        assert_eq!(header.description, "test run");
        assert!(header.start_timestamp > 0);
        assert_eq!(&data[RECORDING_HEADER_SIZE..], &[0, 1, 2, 3]);
    }

    #[test]
    fn test_recording_sink_finish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordingSink::new(dir.path().join("a.digi"), String::new());
        sink.finish();
        sink.on_header(&StreamHeader::new(1, 4800, 2, 0));
        sink.finish();
        sink.finish();
    }

    #[test]
    fn test_console_sink_accepts_empty_chunks() {
        let mut sink = ConsoleSink::new(16);
        sink.on_symbols(SymbolFormat::Bits, &[]);
        sink.on_symbols(SymbolFormat::Bits, &[0, 1]);
    }
}
