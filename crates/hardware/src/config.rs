//! Configuration system for the prefetcher simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline hardware constants (cache geometry, prefetcher tunables).
//! 2. **Structures:** Hierarchical config for the cache, the prefetcher, and the GHB.
//! 3. **Enums:** Prefetcher selection.
//!
//! Configuration is supplied via JSON from the CLI (`--config`) or use
//! `Config::default()` for a sensible baseline.

use serde::Deserialize;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden in a JSON configuration file.
mod defaults {
    /// Default cache size in bytes (32 KiB).
    pub const CACHE_SIZE: usize = 32 * 1024;

    /// Default cache line size in bytes (64 bytes).
    ///
    /// Matches typical modern processor cache line sizes.
    pub const CACHE_LINE: usize = 64;

    /// Default cache associativity (4 ways).
    pub const CACHE_WAYS: usize = 4;

    /// Default cache access latency in cycles.
    pub const CACHE_LATENCY: u64 = 1;

    /// Default next-level (memory) access latency in cycles.
    pub const MEMORY_LATENCY: u64 = 100;

    /// Default stride-prefetcher reference prediction table size (64 entries).
    pub const PREFETCH_TABLE_SIZE: usize = 64;

    /// Default prefetch degree (predictions per trigger).
    pub const PREFETCH_DEGREE: usize = 2;

    /// Default GHB circular history size (256 entries).
    pub const GHB_HISTORY_SIZE: usize = 256;

    /// Default GHB delta-pattern window length (4 deltas).
    pub const GHB_PATTERN_LENGTH: usize = 4;

    /// Default GHB page granularity in bytes (4 KiB).
    ///
    /// Used both as the page correlation key and for the cross-page
    /// admission policy.
    pub const GHB_PAGE_BYTES: u64 = 4096;

    /// Default GHB baseline confidence threshold in percent.
    pub const GHB_CONFIDENCE_THRESHOLD: u32 = 50;
}

/// Hardware prefetcher types for cache prefetching.
///
/// Prefetchers predict future memory accesses and fetch data
/// into the cache before it is needed to reduce miss penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PrefetcherKind {
    /// No prefetching enabled.
    #[default]
    None,
    /// Next-line prefetcher.
    ///
    /// Prefetches the next sequential cache line(s) after each access.
    NextLine,
    /// Stride prefetcher.
    ///
    /// Detects constant-stride patterns per instruction stream and
    /// prefetches along the detected stride.
    Stride,
    /// Stream prefetcher.
    ///
    /// Detects sequential stream direction (ascending/descending) and
    /// prefetches multiple lines ahead.
    Stream,
    /// Tagged prefetcher.
    ///
    /// Prefetches on demand misses and on hits to previously prefetched lines.
    Tagged,
    /// Global History Buffer correlation prefetcher.
    ///
    /// Correlates accesses by PC and page, learns delta patterns in a
    /// two-delta Markov table, and extrapolates multi-step predictions.
    #[serde(alias = "GHB")]
    Ghb,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use pfsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.cache.line_bytes, 64);
/// assert_eq!(config.memory_latency, 100);
/// ```
///
/// Deserializing from JSON (typical CLI usage):
///
/// ```
/// use pfsim_core::config::{Config, PrefetcherKind};
///
/// let json = r#"{
///     "cache": {
///         "enabled": true,
///         "size_bytes": 16384,
///         "line_bytes": 64,
///         "ways": 4,
///         "latency": 2,
///         "prefetcher": "Ghb",
///         "prefetch_degree": 4,
///         "ghb": {
///             "history_size": 512,
///             "pattern_length": 6,
///             "use_pc": true,
///             "page_bytes": 4096,
///             "confidence_threshold": 40
///         }
///     },
///     "memory_latency": 120
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.cache.prefetcher, PrefetcherKind::Ghb);
/// assert_eq!(config.cache.ghb.history_size, 512);
/// assert_eq!(config.memory_latency, 120);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Data cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Next-level (memory) access latency in cycles
    #[serde(default = "Config::default_memory_latency")]
    pub memory_latency: u64,
}

impl Config {
    /// Returns the default next-level access latency in cycles.
    fn default_memory_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            memory_latency: defaults::MEMORY_LATENCY,
        }
    }
}

/// Data cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enable the cache model
    #[serde(default = "CacheConfig::default_enabled")]
    pub enabled: bool,

    /// Total cache size in bytes
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,

    /// Cache line size in bytes
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity (number of ways)
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,

    /// Access latency in cycles
    #[serde(default = "CacheConfig::default_latency")]
    pub latency: u64,

    /// Hardware prefetcher type
    #[serde(default)]
    pub prefetcher: PrefetcherKind,

    /// Prefetch degree (predictions per trigger)
    #[serde(default = "CacheConfig::default_prefetch_degree")]
    pub prefetch_degree: usize,

    /// Stride prefetcher reference prediction table size
    #[serde(default = "CacheConfig::default_prefetch_table")]
    pub prefetch_table_size: usize,

    /// GHB prefetcher configuration
    #[serde(default)]
    pub ghb: GhbConfig,
}

impl CacheConfig {
    /// The cache model is the point of this simulator, so it defaults to on.
    fn default_enabled() -> bool {
        true
    }

    /// Returns the default cache size in bytes.
    fn default_size() -> usize {
        defaults::CACHE_SIZE
    }

    /// Returns the default cache line size in bytes.
    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    /// Returns the default cache associativity (number of ways).
    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    /// Returns the default cache access latency in cycles.
    fn default_latency() -> u64 {
        defaults::CACHE_LATENCY
    }

    /// Returns the default prefetch degree (predictions per trigger).
    fn default_prefetch_degree() -> usize {
        defaults::PREFETCH_DEGREE
    }

    /// Returns the default stride-prefetcher table size.
    fn default_prefetch_table() -> usize {
        defaults::PREFETCH_TABLE_SIZE
    }
}

impl Default for CacheConfig {
    /// Creates a default cache configuration.
    ///
    /// Cache enabled, 32 KiB, 4-way, 64-byte lines, no prefetching.
    fn default() -> Self {
        Self {
            enabled: true,
            size_bytes: defaults::CACHE_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::CACHE_WAYS,
            latency: defaults::CACHE_LATENCY,
            prefetcher: PrefetcherKind::default(),
            prefetch_degree: defaults::PREFETCH_DEGREE,
            prefetch_table_size: defaults::PREFETCH_TABLE_SIZE,
            ghb: GhbConfig::default(),
        }
    }
}

/// Global History Buffer prefetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GhbConfig {
    /// Circular history buffer size (entries)
    #[serde(default = "GhbConfig::default_history_size")]
    pub history_size: usize,

    /// Delta-pattern window length
    #[serde(default = "GhbConfig::default_pattern_length")]
    pub pattern_length: usize,

    /// Maintain PC-keyed correlation chains
    #[serde(default = "GhbConfig::default_use_pc")]
    pub use_pc: bool,

    /// Page granularity in bytes (correlation key and admission policy)
    #[serde(default = "GhbConfig::default_page_bytes")]
    pub page_bytes: u64,

    /// Baseline confidence threshold in percent, clamped to [0, 100]
    #[serde(default = "GhbConfig::default_confidence")]
    pub confidence_threshold: u32,
}

impl GhbConfig {
    /// Returns the default circular history size.
    fn default_history_size() -> usize {
        defaults::GHB_HISTORY_SIZE
    }

    /// Returns the default pattern window length.
    fn default_pattern_length() -> usize {
        defaults::GHB_PATTERN_LENGTH
    }

    /// PC chains default to on; they are the more specific correlation key.
    fn default_use_pc() -> bool {
        true
    }

    /// Returns the default page granularity in bytes.
    fn default_page_bytes() -> u64 {
        defaults::GHB_PAGE_BYTES
    }

    /// Returns the default baseline confidence threshold in percent.
    fn default_confidence() -> u32 {
        defaults::GHB_CONFIDENCE_THRESHOLD
    }
}

impl Default for GhbConfig {
    fn default() -> Self {
        Self {
            history_size: defaults::GHB_HISTORY_SIZE,
            pattern_length: defaults::GHB_PATTERN_LENGTH,
            use_pc: true,
            page_bytes: defaults::GHB_PAGE_BYTES,
            confidence_threshold: defaults::GHB_CONFIDENCE_THRESHOLD,
        }
    }
}
