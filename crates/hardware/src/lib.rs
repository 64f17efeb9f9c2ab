//! Data-cache prefetcher simulation library.
//!
//! This crate implements a trace-driven model of a hardware data cache and its
//! prefetchers, with the following:
//! 1. **Prefetchers:** A Global History Buffer (GHB) correlation prefetcher plus
//!    the classic spatial family (next-line, stride, stream, tagged).
//! 2. **Cache:** A set-associative LRU cache model that drives the configured
//!    prefetcher and accounts for prefetch usefulness.
//! 3. **Configuration:** Hierarchical config with defaults, deserializable from JSON.
//! 4. **Statistics:** Access, miss, and prefetch counters with a report printer.

/// Cache model (set-associative LRU, prefetcher hook, usefulness tracking).
pub mod cache;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Prefetcher implementations (GHB, next-line, stride, stream, tagged).
pub mod prefetch;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Cache model; construct with `CacheSim::new` from a `CacheConfig`.
pub use crate::cache::CacheSim;
/// Simulation statistics; printed by the CLI after a trace run.
pub use crate::stats::SimStats;
