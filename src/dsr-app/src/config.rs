// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-binary sections of the shared `dsr-rs.toml` file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "dsr-rs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Config file {0} has no [{1}] section")]
    MissingSection(PathBuf, &'static str),
}

/// Default locations, most specific first: current directory, XDG config,
/// then `/etc`.
fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("dsr-rs").join(CONFIG_FILE_NAME));
    }
    paths.push(Path::new("/etc/dsr-rs").join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize `[key]` from the TOML file at `path`; `Ok(None)` when the
/// file has no such section.
fn read_section<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    let mut table: toml::Table = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

    table
        .remove(key)
        .map(|section| {
            section
                .try_into::<T>()
                .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
        })
        .transpose()
}

/// First existing file in `paths` that carries `[key]`, or defaults.
fn load_first<T: DeserializeOwned + Default>(
    paths: &[PathBuf],
    key: &str,
) -> Result<(T, Option<PathBuf>), ConfigError> {
    for path in paths.iter().filter(|p| p.exists()) {
        if let Some(cfg) = read_section(path, key)? {
            return Ok((cfg, Some(path.clone())));
        }
    }
    Ok((T::default(), None))
}

/// A configuration stored as one section of `dsr-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section name, e.g. `"dsr-receiver"`.
    fn section_key() -> &'static str;

    /// Load from `explicit` when given (the section must be present there),
    /// otherwise from the first default location that has the section.
    /// Falls back to `Default` when no file provides it.
    ///
    /// Returns the config together with the file it came from.
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let key = Self::section_key();
        match explicit {
            Some(path) => {
                let cfg = read_section(path, key)?
                    .ok_or_else(|| ConfigError::MissingSection(path.to_path_buf(), key))?;
                Ok((cfg, Some(path.to_path_buf())))
            }
            None => load_first(&search_paths(), key),
        }
    }
}
