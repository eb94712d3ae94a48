// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reception counters and the end-of-session report.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::header::StreamHeader;

/// Counters owned by the receive path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub bytes_received: u64,
    /// Payload chunks shed because the decode queue was full.
    pub chunks_dropped: u64,
    pub header: Option<StreamHeader>,
}

/// Counters owned by the decode path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub packets_received: u64,
    pub symbols_received: u64,
}

/// Combined view, assembled once both loops have finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub receive: ReceiveStats,
    pub decode: DecodeStats,
}

impl SessionStats {
    pub fn new(receive: ReceiveStats, decode: DecodeStats) -> Self {
        Self { receive, decode }
    }

    pub fn header_received(&self) -> bool {
        self.receive.header.is_some()
    }

    pub fn report(&self, runtime: Duration) -> StatsReport {
        let secs = runtime.as_secs_f64();
        let bytes_per_sec = per_second(self.receive.bytes_received, secs);
        let symbols_per_sec = per_second(self.decode.symbols_received, secs);
        let expected_symbol_rate = self.receive.header.map(|h| h.symbol_rate);
        StatsReport {
            runtime_secs: secs,
            bytes: self.receive.bytes_received,
            bytes_per_sec,
            symbols: self.decode.symbols_received,
            symbols_per_sec,
            packets: self.decode.packets_received,
            dropped_chunks: self.receive.chunks_dropped,
            expected_symbol_rate,
            efficiency_pct: expected_symbol_rate.map(|rate| efficiency(symbols_per_sec, rate)),
        }
    }
}

fn per_second(count: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Actual over declared symbol rate, in percent. A zero declared rate
/// yields 0.
pub fn efficiency(symbols_per_sec: f64, symbol_rate: u16) -> f64 {
    if symbol_rate == 0 {
        return 0.0;
    }
    symbols_per_sec / f64::from(symbol_rate) * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub runtime_secs: f64,
    pub bytes: u64,
    pub bytes_per_sec: f64,
    pub symbols: u64,
    pub symbols_per_sec: f64,
    pub packets: u64,
    pub dropped_chunks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_symbol_rate: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency_pct: Option<f64>,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reception Statistics:")?;
        writeln!(f, "   Runtime: {:.1} seconds", self.runtime_secs)?;
        writeln!(f, "   Bytes: {} ({:.1} B/s)", self.bytes, self.bytes_per_sec)?;
        writeln!(
            f,
            "   Symbols: {} ({:.1} sym/s)",
            self.symbols, self.symbols_per_sec
        )?;
        write!(f, "   Packets: {}", self.packets)?;
        if self.dropped_chunks > 0 {
            write!(f, "\n   Dropped: {} chunks (queue full)", self.dropped_chunks)?;
        }
        if let (Some(rate), Some(eff)) = (self.expected_symbol_rate, self.efficiency_pct) {
            write!(f, "\n   Expected Symbol Rate: {} sym/s", rate)?;
            write!(f, "\n   Efficiency: {:.1}%", eff)?;
        }
        Ok(())
    }
}
