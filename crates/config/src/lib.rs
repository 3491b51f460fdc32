//! Configuration loading for the shoebox album cache.
//!
//! Three layers, later ones winning: compiled-in defaults, an optional TOML
//! file, and `SHOEBOX_*` environment variables (nested keys separated with
//! a double underscore, e.g. `SHOEBOX_REMOTE__ENDPOINT`).

pub mod error;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Remote endpoint the original application syncs from.
const DEFAULT_ENDPOINT: &str = "https://static.leboncoin.fr/img/shared/technical-test.json";
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
    pub paging: PagingConfig,
}

/// Where the cache database lives. `path: None` selects an in-memory
/// database (nothing survives the process, useful for tests and demos).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    /// Platform cache directory for a durable on-disk database, when the
    /// platform exposes one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "shoebox").map(|dirs| dirs.cache_dir().join("cache.db"))
    }
}

/// The remote collection endpoint. How it is reached (client, headers,
/// retries) is the embedding application's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { endpoint: DEFAULT_ENDPOINT.to_string() }
    }
}

/// Default page size handed to pagers by the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file, and the
    /// environment, in that order of precedence (environment wins).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed("SHOEBOX_").split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)
    }
}
