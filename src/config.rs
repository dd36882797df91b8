//! Configuration for Chunkpad
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ChunkpadError, Result};

/// Main configuration for a Chunkpad server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all session data
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {room}/
    ///           ├── 0, 1, 2, ...   (one record per chunk)
    ///           └── length         (decimal total length)
    pub data_dir: PathBuf,

    /// Capacity of a single chunk (in bytes)
    pub chunk_size: usize,

    /// Idle time after which a resident chunk is flushed and dropped (milliseconds)
    pub evict_after_ms: u64,

    // -------------------------------------------------------------------------
    // Maintenance Timers
    // -------------------------------------------------------------------------
    /// How often idle chunks are evicted (milliseconds)
    pub cleanup_interval_ms: u64,

    /// How often chunks are repacked (milliseconds)
    pub consolidate_interval_ms: u64,

    /// How often debug statistics are pushed to subscribed clients (milliseconds)
    pub debug_interval_ms: u64,

    /// How long a session may sit with zero clients before it is reclaimed (milliseconds)
    pub reclaim_grace_ms: u64,

    /// How often the registry looks for idle sessions (milliseconds)
    pub reclaim_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// WebSocket listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Frames that may wait for one client's socket before it is dropped
    pub outbox_capacity: usize,
}

/// The subset of configuration a single `ChunkStore` needs
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Capacity of a single chunk (in bytes)
    pub chunk_size: usize,

    /// Idle time after which a resident chunk is evicted
    pub evict_after: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            evict_after: Duration::from_secs(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./chunkpad_data"),
            chunk_size: 4096,
            evict_after_ms: 10_000,
            cleanup_interval_ms: 1_000,
            consolidate_interval_ms: 30_000,
            debug_interval_ms: 500,
            reclaim_grace_ms: 10_000,
            reclaim_interval_ms: 1_000,
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            outbox_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Options handed to every session's `ChunkStore`
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            chunk_size: self.chunk_size,
            evict_after: Duration::from_millis(self.evict_after_ms),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn consolidate_interval(&self) -> Duration {
        Duration::from_millis(self.consolidate_interval_ms)
    }

    pub fn debug_interval(&self) -> Duration {
        Duration::from_millis(self.debug_interval_ms)
    }

    pub fn reclaim_grace(&self) -> Duration {
        Duration::from_millis(self.reclaim_grace_ms)
    }

    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }

    /// Check values that would otherwise break paging or the timers
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkpadError::Config("chunk_size must be non-zero".to_string()));
        }
        if self.chunk_size > u32::MAX as usize {
            return Err(ChunkpadError::Config(format!(
                "chunk_size {} does not fit the wire format (max {})",
                self.chunk_size,
                u32::MAX
            )));
        }

        let timers = [
            ("cleanup_interval_ms", self.cleanup_interval_ms),
            ("consolidate_interval_ms", self.consolidate_interval_ms),
            ("debug_interval_ms", self.debug_interval_ms),
            ("reclaim_interval_ms", self.reclaim_interval_ms),
        ];
        for (name, value) in timers {
            if value == 0 {
                return Err(ChunkpadError::Config(format!("{} must be non-zero", name)));
            }
        }

        if self.max_connections == 0 {
            return Err(ChunkpadError::Config("max_connections must be non-zero".to_string()));
        }
        if self.outbox_capacity == 0 {
            return Err(ChunkpadError::Config("outbox_capacity must be non-zero".to_string()));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all sessions)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the chunk capacity (in bytes)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the chunk eviction threshold (in milliseconds)
    pub fn evict_after_ms(mut self, ms: u64) -> Self {
        self.config.evict_after_ms = ms;
        self
    }

    /// Set the eviction sweep interval (in milliseconds)
    pub fn cleanup_interval_ms(mut self, ms: u64) -> Self {
        self.config.cleanup_interval_ms = ms;
        self
    }

    /// Set the consolidation interval (in milliseconds)
    pub fn consolidate_interval_ms(mut self, ms: u64) -> Self {
        self.config.consolidate_interval_ms = ms;
        self
    }

    /// Set the debug push interval (in milliseconds)
    pub fn debug_interval_ms(mut self, ms: u64) -> Self {
        self.config.debug_interval_ms = ms;
        self
    }

    /// Set the idle-session grace period (in milliseconds)
    pub fn reclaim_grace_ms(mut self, ms: u64) -> Self {
        self.config.reclaim_grace_ms = ms;
        self
    }

    /// Set the idle-session sweep interval (in milliseconds)
    pub fn reclaim_interval_ms(mut self, ms: u64) -> Self {
        self.config.reclaim_interval_ms = ms;
        self
    }

    /// Set the WebSocket listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set how many frames may queue for one slow client
    pub fn outbox_capacity(mut self, frames: usize) -> Self {
        self.config.outbox_capacity = frames;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
