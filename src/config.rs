//! Configuration file support
//!
//! Settings come from a TOML file and are overridden by CLI flags.
//! Lookup order: `--config FILE`, `./logo-matte.toml`, then
//! `<config dir>/logo-matte/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::{
    PipelineOptions, DEFAULT_LOAD_TIMEOUT_SECS, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_SOURCE_BYTES,
};
use crate::strip::{StripOptions, DEFAULT_THRESHOLD};

/// Local config file name
pub const LOCAL_CONFIG_FILE: &str = "logo-matte.toml";

/// Config errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Effective settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Whiteness threshold
    pub threshold: u8,
    /// Load + decode timeout in seconds
    pub timeout_secs: u64,
    /// Largest accepted source in bytes
    pub max_source_bytes: u64,
    /// Largest accepted width or height
    pub max_dimension: u32,
    /// Concurrent images in batch mode (None = CPU count)
    pub jobs: Option<usize>,
    /// Use the original image when processing fails
    pub fallback: bool,
    /// Scan rows in parallel
    pub parallel: bool,
    /// Where processed PNGs are written
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jobs: None,
            fallback: true,
            parallel: true,
            output_dir: PathBuf::from("out"),
        }
    }
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub threshold: Option<u8>,
    pub timeout_secs: Option<u64>,
    pub jobs: Option<usize>,
    pub fallback: Option<bool>,
    pub output_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Config {
    /// Candidate config paths, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("logo-matte").join("config.toml"));
        }
        paths
    }

    /// Load the first config found on the search path, or defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply CLI overrides; CLI wins
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(t) = cli.threshold {
            merged.threshold = t;
        }
        if let Some(t) = cli.timeout_secs {
            merged.timeout_secs = t;
        }
        if cli.jobs.is_some() {
            merged.jobs = cli.jobs;
        }
        if let Some(f) = cli.fallback {
            merged.fallback = f;
        }
        if let Some(dir) = &cli.output_dir {
            merged.output_dir = dir.clone();
        }
        merged
    }

    /// Worker count for batch mode
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn to_pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            strip: StripOptions::builder()
                .threshold(self.threshold)
                .parallel(self.parallel)
                .build(),
            load_timeout: Duration::from_secs(self.timeout_secs),
            max_source_bytes: self.max_source_bytes,
            max_dimension: self.max_dimension,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
