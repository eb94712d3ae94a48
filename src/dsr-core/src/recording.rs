// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Symbol recording file format.
//!
//! A recording is a 100-byte little-endian header followed by the decoded
//! symbols, one byte each:
//!
//! ```text
//! 0   4  magic ("DIGI")
//! 4   4  version (1)
//! 8   2  protocol_id
//! 10  2  symbol_rate
//! 12  1  bits_per_symbol
//! 13  7  reserved
//! 20  8  start_timestamp (us since epoch)
//! 28  8  sample_count
//! 36 64  description, NUL terminated
//! ```
//!
//! `sample_count` is written as zero up front and patched when the
//! recording is finished.

use std::io::{self, Seek, SeekFrom, Write};

use crate::header::{StreamHeader, STREAM_MAGIC};

pub const RECORDING_VERSION: u32 = 1;
pub const RECORDING_HEADER_SIZE: usize = 100;
pub const DESCRIPTION_LEN: usize = 64;

const SAMPLE_COUNT_OFFSET: u64 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingHeader {
    pub magic: u32,
    pub version: u32,
    pub protocol_id: u16,
    pub symbol_rate: u16,
    pub bits_per_symbol: u8,
    pub start_timestamp: u64,
    pub sample_count: u64,
    pub description: String,
}

impl RecordingHeader {
    pub fn from_stream(header: &StreamHeader, start_timestamp: u64, description: &str) -> Self {
        Self {
            magic: STREAM_MAGIC,
            version: RECORDING_VERSION,
            protocol_id: header.protocol_id,
            symbol_rate: header.symbol_rate,
            bits_per_symbol: header.bits_per_symbol,
            start_timestamp,
            sample_count: 0,
            description: description.to_string(),
        }
    }

    pub fn encode(&self) -> [u8; RECORDING_HEADER_SIZE] {
        let mut buf = [0u8; RECORDING_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..10].copy_from_slice(&self.protocol_id.to_le_bytes());
        buf[10..12].copy_from_slice(&self.symbol_rate.to_le_bytes());
        buf[12] = self.bits_per_symbol;
        buf[20..28].copy_from_slice(&self.start_timestamp.to_le_bytes());
        buf[28..36].copy_from_slice(&self.sample_count.to_le_bytes());
        // Truncate on a char boundary, always leaving room for the NUL.
        let mut end = self.description.len().min(DESCRIPTION_LEN - 1);
        while !self.description.is_char_boundary(end) {
            end -= 1;
        }
        buf[36..36 + end].copy_from_slice(&self.description.as_bytes()[..end]);
        buf
    }

    pub fn read(buf: &[u8]) -> Option<Self> {
        let buf = buf.get(..RECORDING_HEADER_SIZE)?;
        let u16_at = |o: usize| u16::from_le_bytes([buf[o], buf[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        let u64_at = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[o..o + 8]);
            u64::from_le_bytes(b)
        };
        let desc = &buf[36..36 + DESCRIPTION_LEN];
        let desc_end = desc.iter().position(|b| *b == 0).unwrap_or(DESCRIPTION_LEN);
        Some(Self {
            magic: u32_at(0),
            version: u32_at(4),
            protocol_id: u16_at(8),
            symbol_rate: u16_at(10),
            bits_per_symbol: buf[12],
            start_timestamp: u64_at(20),
            sample_count: u64_at(28),
            description: String::from_utf8_lossy(&desc[..desc_end]).into_owned(),
        })
    }
}

/// Streams symbols into a recording and patches the sample count on
/// [`RecordingWriter::finish`].
pub struct RecordingWriter<W: Write + Seek> {
    inner: W,
    samples: u64,
}

impl<W: Write + Seek> RecordingWriter<W> {
    pub fn new(mut inner: W, header: &RecordingHeader) -> io::Result<Self> {
        inner.write_all(&header.encode())?;
        Ok(Self { inner, samples: 0 })
    }

    pub fn write_symbols(&mut self, symbols: &[u8]) -> io::Result<()> {
        self.inner.write_all(symbols)?;
        self.samples += symbols.len() as u64;
        Ok(())
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn finish(mut self) -> io::Result<W> {
        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(SAMPLE_COUNT_OFFSET))?;
        self.inner.write_all(&self.samples.to_le_bytes())?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
