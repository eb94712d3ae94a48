// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod header;
pub mod protocol;
pub mod recording;
pub mod stats;
pub mod symbols;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use header::{parse_header, HeaderError, StreamHeader, HEADER_SIZE, STREAM_MAGIC};
pub use protocol::{lookup_protocol, protocol_name, ProtocolKind, ProtocolMatch};
pub use stats::{DecodeStats, ReceiveStats, SessionStats, StatsReport};
pub use symbols::{decode_symbols, render_preview, SymbolFormat, PREVIEW_SYMBOLS};
