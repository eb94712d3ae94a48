// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Raw symbol unpacking.
//!
//! The demodulator emits one symbol per byte. Two-level streams carry bits,
//! everything else is decoded as dibits (0..=3). Out-of-range dibit bytes
//! are dropped rather than rejected.

use std::fmt::Write as _;

/// Default number of symbols rendered by [`render_preview`].
pub const PREVIEW_SYMBOLS: usize = 16;

const MAX_DIBIT: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    /// One bit per symbol (FSK2 / GMSK).
    Bits,
    /// One dibit per symbol (FSK4 / QPSK family).
    Dibits,
}

impl SymbolFormat {
    pub fn from_bits_per_symbol(bits_per_symbol: u8) -> Self {
        if bits_per_symbol == 1 {
            SymbolFormat::Bits
        } else {
            SymbolFormat::Dibits
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SymbolFormat::Bits => "Bits",
            SymbolFormat::Dibits => "Dibits",
        }
    }

    fn accepts(self, byte: u8) -> bool {
        match self {
            SymbolFormat::Bits => true,
            SymbolFormat::Dibits => byte <= MAX_DIBIT,
        }
    }
}

/// Iterator over the symbols of one payload chunk.
#[derive(Debug, Clone)]
pub struct Symbols<'a> {
    format: SymbolFormat,
    inner: std::slice::Iter<'a, u8>,
}

impl Symbols<'_> {
    pub fn format(&self) -> SymbolFormat {
        self.format
    }
}

impl Iterator for Symbols<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let format = self.format;
        self.inner.by_ref().copied().find(|b| format.accepts(*b))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.inner.len();
        match self.format {
            SymbolFormat::Bits => (upper, Some(upper)),
            SymbolFormat::Dibits => (0, Some(upper)),
        }
    }
}

/// Decode one payload chunk. Never fails; invalid dibits are filtered.
pub fn decode_symbols(payload: &[u8], bits_per_symbol: u8) -> Symbols<'_> {
    Symbols {
        format: SymbolFormat::from_bits_per_symbol(bits_per_symbol),
        inner: payload.iter(),
    }
}

/// Render up to `limit` symbols as space separated binary digits, with a
/// trailing `...` when more remain. Returns `None` for an empty sequence.
pub fn render_preview(symbols: &[u8], format: SymbolFormat, limit: usize) -> Option<String> {
    if symbols.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(limit.min(symbols.len()) * 3 + 3);
    for (i, sym) in symbols.iter().take(limit).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = match format {
            SymbolFormat::Bits => write!(out, "{:01b}", sym),
            SymbolFormat::Dibits => write!(out, "{:02b}", sym),
        };
    }
    if symbols.len() > limit {
        out.push_str("...");
    }
    Some(out)
}
