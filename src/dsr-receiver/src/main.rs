// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod decoder;
mod receiver;
mod session;
mod sink;
mod transport;

use std::future::Future;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info};

use dsr_app::{init_logging, ConfigFile};
use dsr_core::{DynResult, StatsReport};

use config::{OutputMode, ReceiverConfig, TransportKind};
use receiver::{Receiver, ReceiverOptions, StreamEnd};
use sink::build_sink;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - digital symbol stream receiver");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Host to connect to (TCP) or bind (UDP)
    #[arg(long = "host")]
    host: Option<String>,
    /// Stream port
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Receive datagrams instead of connecting over TCP
    #[arg(long = "udp")]
    udp: bool,
    /// Expected protocol (e.g. p25, dmr, "NXDN 9600")
    #[arg(long = "protocol")]
    protocol: Option<String>,
    /// Output mode
    #[arg(short = 'o', long = "output", value_enum)]
    output: Option<OutputMode>,
    /// Recording file for file output
    #[arg(long = "output-path", value_name = "FILE")]
    output_path: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn apply_cli(cfg: &mut ReceiverConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        cfg.stream.host = host.clone();
    }
    if let Some(port) = cli.port {
        cfg.stream.port = port;
    }
    if cli.udp {
        cfg.stream.transport = TransportKind::Udp;
    }
    if let Some(protocol) = &cli.protocol {
        cfg.stream.protocol = Some(protocol.clone());
    }
    if let Some(mode) = cli.output {
        cfg.output.mode = mode;
    }
    if let Some(path) = &cli.output_path {
        cfg.output.path = Some(path.clone());
    }
}

/// Wait for `interrupt` or the end of the stream, then stop the receiver
/// and return its report. A failing `interrupt` also stops the receiver.
async fn run_until_interrupted<F>(receiver: &mut Receiver, interrupt: F) -> Option<StatsReport>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        res = interrupt => match res {
            Ok(()) => info!("Ctrl+C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C, shutting down: {}", e),
        },
        _ = receiver.closed() => {}
    }

    receiver.stop().await;
    match receiver.stream_end() {
        Some(StreamEnd::Failed(kind)) => debug!("Receive loop ended on {:?}", kind),
        Some(end) => debug!("Receive loop ended: {:?}", end),
        None => {}
    }
    receiver.report()
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ReceiverConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ReceiverConfig::load(cli.config.as_deref())?;
    apply_cli(&mut cfg, &cli);
    cfg.validate()
        .map_err(|e| format!("Invalid receiver configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref(), cli.verbose);

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    info!(
        "Starting dsr-receiver ({} {}:{}, output: {:?}{})",
        cfg.stream.transport,
        cfg.stream.host,
        cfg.stream.port,
        cfg.output.mode,
        cfg.stream
            .protocol
            .as_deref()
            .map(|p| format!(", expecting {}", p))
            .unwrap_or_default()
    );

    let sink = build_sink(&cfg.output);
    let mut receiver = match Receiver::start(ReceiverOptions::from_config(&cfg), sink).await {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("Failed to start receiver: {}", e);
            return Err(e.into());
        }
    };
    if let Some(addr) = receiver.local_addr() {
        info!("Receiving on {} (Ctrl+C to stop)", addr);
    }

    if let Some(report) = run_until_interrupted(&mut receiver, signal::ctrl_c()).await {
        for line in report.to_string().lines() {
            info!("{}", line);
        }
    }
    info!("Receiver stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "dsr-receiver",
            "--host",
            "0.0.0.0",
            "-p",
            "7400",
            "--udp",
            "--protocol",
            "dmr",
            "--output",
            "file",
            "--output-path",
            "capture.digi",
        ]);
        let mut cfg = ReceiverConfig::default();
        apply_cli(&mut cfg, &cli);

        assert_eq!(cfg.stream.host, "0.0.0.0");
        assert_eq!(cfg.stream.port, 7400);
        assert_eq!(cfg.stream.transport, TransportKind::Udp);
        assert_eq!(cfg.stream.protocol.as_deref(), Some("dmr"));
        assert_eq!(cfg.output.mode, OutputMode::File);
        assert!(cfg.validate().is_ok());
    }

    #[tokio::test]
    async fn test_signal_error_still_stops_and_reports() {
        let mut cfg = ReceiverConfig::default();
        cfg.stream.host = "127.0.0.1".to_string();
        cfg.stream.port = 0;
        cfg.stream.transport = TransportKind::Udp;
        let mut receiver = Receiver::start(ReceiverOptions::from_config(&cfg), build_sink(&cfg.output))
            .await
            .unwrap();

        let interrupt = std::future::ready(Err(io::Error::new(
            io::ErrorKind::Other,
            "signal handler unavailable",
        )));
        let report = run_until_interrupted(&mut receiver, interrupt).await;

        let report = report.expect("report after a failed signal listener");
        assert_eq!(report.bytes, 0);
        assert_eq!(receiver.stream_end(), Some(StreamEnd::Stopped));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["dsr-receiver"]);
        let mut cfg = ReceiverConfig::default();
        cfg.stream.port = 9000;
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.stream.port, 9000);
        assert_eq!(cfg.stream.transport, TransportKind::Tcp);
        assert!(!cli.verbose);
    }
}
