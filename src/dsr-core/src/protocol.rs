// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Known digital voice/data protocol variants and their nominal profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ProtocolKind {
    P25Fsk4 = 1,
    P25Cqpsk4800 = 2,
    P25Cqpsk6000 = 3,
    P25HDqpsk = 4,
    P25HCpm = 5,
    DmrFsk4 = 6,
    M17Fsk4 = 7,
    YsfFsk4 = 8,
    Nxdn4800 = 9,
    Nxdn9600 = 10,
    DstarFsk2 = 11,
    EdacsFsk2 = 12,
    ProvoiceFsk2 = 13,
}

/// Nominal modulation parameters of a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolProfile {
    pub kind: ProtocolKind,
    pub label: &'static str,
    /// Short family name accepted on the command line.
    pub family: &'static str,
    pub symbol_rate: u16,
    pub bits_per_symbol: u8,
    pub differential: bool,
}

const fn profile(
    kind: ProtocolKind,
    label: &'static str,
    family: &'static str,
    symbol_rate: u16,
    bits_per_symbol: u8,
    differential: bool,
) -> ProtocolProfile {
    ProtocolProfile {
        kind,
        label,
        family,
        symbol_rate,
        bits_per_symbol,
        differential,
    }
}

pub const PROTOCOL_PROFILES: [ProtocolProfile; 13] = [
    profile(ProtocolKind::P25Fsk4, "P25 FSK4", "p25", 4800, 2, false),
    profile(ProtocolKind::P25Cqpsk4800, "P25 CQPSK 4800", "p25", 4800, 2, true),
    profile(ProtocolKind::P25Cqpsk6000, "P25 CQPSK 6000", "p25", 6000, 2, true),
    profile(ProtocolKind::P25HDqpsk, "P25 H-DQPSK", "p25", 4800, 2, true),
    profile(ProtocolKind::P25HCpm, "P25 H-CPM", "p25", 4800, 2, false),
    profile(ProtocolKind::DmrFsk4, "DMR FSK4", "dmr", 4800, 2, false),
    profile(ProtocolKind::M17Fsk4, "M17 FSK4", "m17", 4800, 2, false),
    profile(ProtocolKind::YsfFsk4, "YSF Fusion FSK4", "ysf", 4800, 2, false),
    profile(ProtocolKind::Nxdn4800, "NXDN 4800", "nxdn", 2400, 2, false),
    profile(ProtocolKind::Nxdn9600, "NXDN 9600", "nxdn", 4800, 2, false),
    profile(ProtocolKind::DstarFsk2, "D-STAR FSK2", "dstar", 4800, 1, false),
    profile(ProtocolKind::EdacsFsk2, "EDACS FSK2", "edacs", 9600, 1, false),
    profile(ProtocolKind::ProvoiceFsk2, "ProVoice FSK2", "provoice", 9600, 1, false),
];

impl ProtocolKind {
    pub fn from_id(id: u16) -> Option<Self> {
        PROTOCOL_PROFILES
            .iter()
            .find(|p| p.kind as u16 == id)
            .map(|p| p.kind)
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn profile(self) -> &'static ProtocolProfile {
        // Table is indexed by id - 1.
        &PROTOCOL_PROFILES[self as usize - 1]
    }

    pub fn label(self) -> &'static str {
        self.profile().label
    }

    pub fn family(self) -> &'static str {
        self.profile().family
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Human label for a header protocol id.
pub fn protocol_name(id: u16) -> String {
    match ProtocolKind::from_id(id) {
        Some(kind) => kind.label().to_string(),
        None => format!("Unknown Protocol {}", id),
    }
}

fn squash(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// What a user-supplied protocol name selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMatch {
    /// A whole family such as "p25" or "nxdn".
    Family(&'static str),
    /// One exact variant such as "P25 CQPSK 6000".
    Exact(ProtocolKind),
}

impl ProtocolMatch {
    pub fn matches(&self, kind: ProtocolKind) -> bool {
        match self {
            ProtocolMatch::Family(family) => kind.family() == *family,
            ProtocolMatch::Exact(expected) => *expected == kind,
        }
    }
}

/// Resolve an expected-protocol name given on the command line or in
/// config. Matching ignores case and punctuation, so `D-STAR`, `dstar`
/// and `p25-cqpsk-6000` all resolve.
pub fn lookup_protocol(name: &str) -> Option<ProtocolMatch> {
    let wanted = squash(name);
    if wanted.is_empty() {
        return None;
    }
    if let Some(p) = PROTOCOL_PROFILES.iter().find(|p| squash(p.label) == wanted) {
        return Some(ProtocolMatch::Exact(p.kind));
    }
    PROTOCOL_PROFILES
        .iter()
        .find(|p| p.family == wanted)
        .map(|p| ProtocolMatch::Family(p.family))
}
