// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a log level name, falling back to INFO if missing or invalid.
pub fn resolve_level(log_level: Option<&str>) -> Level {
    log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Initialize logging with optional level from config.
/// `verbose` forces DEBUG regardless of the configured level.
pub fn init_logging(log_level: Option<&str>, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        resolve_level(log_level)
    };

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(Some("debug")), Level::DEBUG);
        assert_eq!(resolve_level(Some("warn")), Level::WARN);
        assert_eq!(resolve_level(Some("bogus")), Level::INFO);
        assert_eq!(resolve_level(None), Level::INFO);
    }
}
