//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.
//! A `Config` is read once at construction time; changing limits means
//! building a new cache.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Name of the cache directory created under the platform cache location.
const CACHE_DIR_NAME: &str = "tiered_cache";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum total cost (bytes) of decoded artifacts held in memory
    pub memory_cost_limit: usize,
    /// Maximum number of decoded artifacts held in memory
    pub memory_count_limit: usize,
    /// Maximum total size (bytes) of the disk tier after a maintenance sweep
    pub disk_size_limit: u64,
    /// Maximum age in seconds of a disk record before it expires
    pub disk_max_age_secs: u64,
    /// Directory holding one file per content hash
    pub cache_dir: PathBuf,
    /// Background disk maintenance interval in seconds
    pub maintenance_interval_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMORY_COST_LIMIT` - Memory tier cost limit in bytes (default: 256 MiB)
    /// - `MEMORY_COUNT_LIMIT` - Memory tier entry limit (default: 150)
    /// - `DISK_SIZE_LIMIT` - Disk tier size limit in bytes (default: 1000 MiB)
    /// - `DISK_MAX_AGE` - Disk record lifetime in seconds (default: 7 days)
    /// - `CACHE_DIR` - Disk tier directory (default: platform cache dir)
    /// - `MAINTENANCE_INTERVAL` - Disk sweep frequency in seconds (default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_cost_limit: env_or("MEMORY_COST_LIMIT", defaults.memory_cost_limit),
            memory_count_limit: env_or("MEMORY_COUNT_LIMIT", defaults.memory_count_limit),
            disk_size_limit: env_or("DISK_SIZE_LIMIT", defaults.disk_size_limit),
            disk_max_age_secs: env_or("DISK_MAX_AGE", defaults.disk_max_age_secs),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            maintenance_interval_secs: env_or(
                "MAINTENANCE_INTERVAL",
                defaults.maintenance_interval_secs,
            ),
        }
    }

    /// Same configuration with a different disk directory.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_cost_limit: 256 * 1024 * 1024,
            memory_count_limit: 150,
            disk_size_limit: 1000 * 1024 * 1024,
            disk_max_age_secs: 60 * 60 * 24 * 7,
            cache_dir: default_cache_dir(),
            maintenance_interval_secs: 300,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join(CACHE_DIR_NAME)
}
