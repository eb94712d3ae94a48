// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for dsr-receiver.
//!
//! Supports loading configuration from the `[dsr-receiver]` section of a
//! TOML file with the following search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./dsr-rs.toml` (current directory)
//! 3. `~/.config/dsr-rs/dsr-rs.toml` (XDG config)
//! 4. `/etc/dsr-rs/dsr-rs.toml` (system-wide)

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use dsr_app::ConfigFile;
use dsr_core::lookup_protocol;
use dsr_core::HEADER_SIZE;

/// Top-level receiver configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Upstream stream endpoint
    pub stream: StreamConfig,
    /// Where decoded symbols go
    pub output: OutputConfig,
    /// Queue and timing knobs
    pub session: SessionConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connect out to the demodulator's TCP sink
    #[default]
    Tcp,
    /// Bind locally and receive datagrams
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => f.write_str("TCP"),
            TransportKind::Udp => f.write_str("UDP"),
        }
    }
}

/// Stream endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// TCP: remote host to connect to. UDP: local address to bind.
    pub host: String,
    /// Port (0 = ephemeral, UDP only)
    pub port: u16,
    /// Transport kind
    pub transport: TransportKind,
    /// Expected protocol (advisory, e.g. "p25", "dmr", "NXDN 9600")
    pub protocol: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7355,
            transport: TransportKind::Tcp,
            protocol: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Log symbol previews
    #[default]
    Console,
    /// Write a symbol recording file
    File,
    /// Audio output (not available, falls back to console)
    Audio,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// Recording path for file mode
    pub path: Option<PathBuf>,
    /// Description stored in the recording header
    pub description: String,
    /// Symbols shown per chunk in console previews
    pub preview_symbols: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Console,
            path: None,
            description: "dsr-receiver capture".to_string(),
            preview_symbols: dsr_core::PREVIEW_SYMBOLS,
        }
    }
}

/// Session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Payload chunks buffered between receive and decode
    pub queue_capacity: usize,
    /// Maximum bytes per receive call
    pub recv_buffer_size: usize,
    /// Decode loop wake-up interval in milliseconds
    pub poll_timeout_ms: u64,
    /// How long stop waits for the decode loop in milliseconds
    pub stop_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            recv_buffer_size: 4096,
            poll_timeout_ms: 1000,
            stop_timeout_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.stream.host.trim().is_empty() {
            return Err("[stream].host must not be empty".to_string());
        }
        if self.stream.transport == TransportKind::Tcp && self.stream.port == 0 {
            return Err("[stream].port must be > 0 for tcp".to_string());
        }
        if let Some(protocol) = &self.stream.protocol {
            if lookup_protocol(protocol).is_none() {
                return Err(format!("[stream].protocol '{}' is not a known protocol", protocol));
            }
        }

        if self.output.mode == OutputMode::File && self.output.path.is_none() {
            return Err("[output].path is required when mode = \"file\"".to_string());
        }

        if self.session.queue_capacity == 0 {
            return Err("[session].queue_capacity must be > 0".to_string());
        }
        if self.session.recv_buffer_size < HEADER_SIZE || self.session.recv_buffer_size > 65535 {
            return Err(format!(
                "[session].recv_buffer_size must be between {} and 65535",
                HEADER_SIZE
            ));
        }
        if self.session.poll_timeout_ms == 0 {
            return Err("[session].poll_timeout_ms must be > 0".to_string());
        }
        if self.session.stop_timeout_ms == 0 {
            return Err("[session].stop_timeout_ms must be > 0".to_string());
        }

        Ok(())
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        let example = ReceiverConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            stream: StreamConfig {
                host: "localhost".to_string(),
                port: 7355,
                transport: TransportKind::Tcp,
                protocol: Some("p25".to_string()),
            },
            output: OutputConfig {
                mode: OutputMode::Console,
                path: Some(PathBuf::from("capture.digi")),
                ..OutputConfig::default()
            },
            session: SessionConfig::default(),
        };

        let mut table = toml::Table::new();
        match toml::Value::try_from(&example) {
            Ok(value) => {
                table.insert(Self::section_key().to_string(), value);
            }
            Err(_) => return String::new(),
        }
        toml::to_string_pretty(&table).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ReceiverConfig {
    fn section_key() -> &'static str {
        "dsr-receiver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();
        assert_eq!(config.stream.host, "localhost");
        assert_eq!(config.stream.port, 7355);
        assert_eq!(config.stream.transport, TransportKind::Tcp);
        assert!(config.stream.protocol.is_none());
        assert_eq!(config.output.mode, OutputMode::Console);
        assert_eq!(config.output.preview_symbols, 16);
        assert_eq!(config.session.queue_capacity, 1000);
        assert_eq!(config.session.recv_buffer_size, 4096);
        assert_eq!(config.session.poll_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_receiver_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[stream]
host = "0.0.0.0"
port = 7356
transport = "udp"
protocol = "dmr"

[output]
mode = "file"
path = "/tmp/dmr.digi"
"#;

        let config: ReceiverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.stream.transport, TransportKind::Udp);
        assert_eq!(config.stream.port, 7356);
        assert_eq!(config.stream.protocol.as_deref(), Some("dmr"));
        assert_eq!(config.output.mode, OutputMode::File);
        assert_eq!(config.output.path, Some(PathBuf::from("/tmp/dmr.digi")));
        assert_eq!(config.session.queue_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_receiver_section_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsr-rs.toml");
        std::fs::write(
            &path,
            "[dsr-receiver.stream]\nport = 7400\ntransport = \"udp\"\n\n[other]\nkey = 1\n",
        )
        .unwrap();

        let (config, found) = ReceiverConfig::load(Some(&path)).unwrap();
        assert_eq!(found.as_deref(), Some(path.as_path()));
        assert_eq!(config.stream.port, 7400);
        assert_eq!(config.stream.transport, TransportKind::Udp);
        assert_eq!(config.stream.host, "localhost");
        assert_eq!(config.session.queue_capacity, 1000);
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ReceiverConfig::example_toml();
        let table: toml::Table = toml::from_str(&example).unwrap();
        let section = table.get("dsr-receiver").unwrap().clone();
        let config: ReceiverConfig = section.try_into().unwrap();
        assert_eq!(config.stream.protocol.as_deref(), Some("p25"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_protocol() {
        let mut config = ReceiverConfig::default();
        config.stream.protocol = Some("tetra".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_file_mode_needs_path() {
        let mut config = ReceiverConfig::default();
        config.output.mode = OutputMode::File;
        assert!(config.validate().is_err());
        config.output.path = Some(PathBuf::from("out.digi"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_session_limits() {
        let mut config = ReceiverConfig::default();
        config.session.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.session.recv_buffer_size = HEADER_SIZE - 1;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.session.poll_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_port_zero_only_for_udp() {
        let mut config = ReceiverConfig::default();
        config.stream.port = 0;
        assert!(config.validate().is_err());
        config.stream.transport = TransportKind::Udp;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = ReceiverConfig::default();
        config.general.log_level = Some("loud".to_string());
        assert!(config.validate().is_err());
    }
}
