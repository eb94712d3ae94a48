// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Digital stream header codec.
//!
//! Wire format (20 bytes, little-endian):
//! `[4 magic][2 protocol_id][2 symbol_rate][1 bits_per_symbol][3 reserved][8 timestamp]`
//!
//! The header is sent exactly once, at the start of the first data unit of
//! a connection. Everything after it is symbol payload.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::protocol_name;

/// "DIGI" read as a little-endian u32.
pub const STREAM_MAGIC: u32 = 0x4449_4749;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 20;

const RESERVED_LEN: usize = 3;

// Plausible microsecond epoch window (2000-01-01 .. 2100-01-01) for display.
const TS_DISPLAY_MIN_US: u64 = 946_684_800_000_000;
const TS_DISPLAY_MAX_US: u64 = 4_102_444_800_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header truncated: {0} of {size} bytes", size = HEADER_SIZE)]
    Truncated(usize),

    #[error("invalid header magic: {found:08X}, expected {expected:08X}", found = .0.magic, expected = STREAM_MAGIC)]
    InvalidMagic(StreamHeader),
}

/// Stream header as announced by the demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub magic: u32,
    pub protocol_id: u16,
    pub symbol_rate: u16,
    pub bits_per_symbol: u8,
    /// Opaque start marker, microseconds since the Unix epoch on the sender.
    pub timestamp: u64,
}

impl StreamHeader {
    pub fn new(protocol_id: u16, symbol_rate: u16, bits_per_symbol: u8, timestamp: u64) -> Self {
        Self {
            magic: STREAM_MAGIC,
            protocol_id,
            symbol_rate,
            bits_per_symbol,
            timestamp,
        }
    }

    /// Read the header fields from the start of `buf`.
    ///
    /// Returns `None` when `buf` is shorter than [`HEADER_SIZE`]. The magic
    /// is not checked here; see [`StreamHeader::is_valid`].
    pub fn read(buf: &[u8]) -> Option<Self> {
        let buf: &[u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            protocol_id: u16::from_le_bytes([buf[4], buf[5]]),
            symbol_rate: u16::from_le_bytes([buf[6], buf[7]]),
            bits_per_symbol: buf[8],
            timestamp: u64::from_le_bytes([
                buf[12], buf[13], buf[14], buf[15], buf[16], buf[17], buf[18], buf[19],
            ]),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.magic == STREAM_MAGIC
    }

    /// Encode to wire bytes. Reserved bytes are always zero.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.protocol_id.to_le_bytes());
        buf[6..8].copy_from_slice(&self.symbol_rate.to_le_bytes());
        buf[8] = self.bits_per_symbol;
        buf[9..9 + RESERVED_LEN].fill(0);
        buf[12..20].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    pub fn protocol_name(&self) -> String {
        protocol_name(self.protocol_id)
    }

    /// Sender timestamp as UTC, when it looks like a microsecond epoch.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if !(TS_DISPLAY_MIN_US..TS_DISPLAY_MAX_US).contains(&self.timestamp) {
            return None;
        }
        DateTime::from_timestamp_micros(self.timestamp as i64)
    }
}

impl fmt::Display for StreamHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Protocol: {}, Symbol Rate: {} sym/s, Bits/Symbol: {}, Timestamp: {}",
            self.protocol_name(),
            self.symbol_rate,
            self.bits_per_symbol,
            self.timestamp
        )?;
        if let Some(utc) = self.timestamp_utc() {
            write!(f, " ({})", utc.format("%Y-%m-%d %H:%M:%S%.3f UTC"))?;
        }
        Ok(())
    }
}

/// Parse and validate a header at the start of `buf`.
///
/// An invalid magic still yields the decoded fields inside
/// [`HeaderError::InvalidMagic`] so callers can log what arrived.
pub fn parse_header(buf: &[u8]) -> Result<StreamHeader, HeaderError> {
    let header = StreamHeader::read(buf).ok_or(HeaderError::Truncated(buf.len()))?;
    if !header.is_valid() {
        return Err(HeaderError::InvalidMagic(header));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_bytes() -> Vec<u8> {
        let mut buf = vec![0x49, 0x47, 0x49, 0x44];
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&4800u16.to_le_bytes());
        buf.push(1);
        buf.extend_from_slice(&[0, 0, 0]);
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf
    }

    #[test]
    fn test_parse_known_bytes() {
        let header = parse_header(&scenario_bytes()).unwrap();
        assert_eq!(header.magic, STREAM_MAGIC);
        assert_eq!(header.protocol_id, 1);
        assert_eq!(header.symbol_rate, 4800);
        assert_eq!(header.bits_per_symbol, 1);
        assert_eq!(header.timestamp, 0);
    }

    #[test]
    fn test_short_buffers_are_truncated() {
        let full = scenario_bytes();
        for len in 0..HEADER_SIZE {
            assert_eq!(
                parse_header(&full[..len]),
                Err(HeaderError::Truncated(len)),
                "len {}",
                len
            );
            assert!(StreamHeader::read(&full[..len]).is_none());
        }
    }

    #[test]
    fn test_invalid_magic_keeps_fields() {
        let mut buf = scenario_bytes();
        buf[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        match parse_header(&buf) {
            Err(HeaderError::InvalidMagic(header)) => {
                assert_eq!(header.magic, 0xDEAD_BEEF);
                assert_eq!(header.symbol_rate, 4800);
                assert!(!header.is_valid());
            }
            other => panic!("expected InvalidMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_reserved_bytes_ignored_on_parse() {
        let mut buf = scenario_bytes();
        buf[9..12].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        assert!(parse_header(&buf).is_ok());
    }

    #[test]
    fn test_encode_round_trip() {
        let header = StreamHeader::new(9, 2400, 2, 1_700_000_000_123_456);
        let bytes = header.encode();
        assert_eq!(&bytes[9..12], &[0, 0, 0]);
        assert_eq!(parse_header(&bytes).unwrap(), header);
    }

    #[test]
    fn test_parse_ignores_trailing_payload() {
        let mut buf = scenario_bytes();
        buf.extend_from_slice(&[0, 1, 0]);
        assert_eq!(parse_header(&buf).unwrap().protocol_id, 1);
    }

    #[test]
    fn test_display() {
        let header = StreamHeader::new(6, 4800, 2, 42);
        assert_eq!(
            header.to_string(),
            "Protocol: DMR FSK4, Symbol Rate: 4800 sym/s, Bits/Symbol: 2, Timestamp: 42"
        );
    }

    #[test]
    fn test_display_includes_utc_for_epoch_micros() {
        let header = StreamHeader::new(1, 4800, 2, 1_700_000_000_000_000);
        assert!(header.to_string().ends_with("(2023-11-14 22:13:20.000 UTC)"));
    }
}
