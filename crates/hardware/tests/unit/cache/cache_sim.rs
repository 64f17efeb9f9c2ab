//! Cache Model (CacheSim) Unit Tests.
//!
//! Verifies the set-associative LRU cache model: hit/miss logic, eviction,
//! write-back penalties, flushing, disabled-cache behavior, and the
//! prefetcher hook with its install deduplication and usefulness
//! accounting.

use pfsim_core::cache::CacheSim;
use pfsim_core::config::{CacheConfig, GhbConfig, PrefetcherKind};

// ──────────────────────────────────────────────────────────
// Helper: build a simple test cache
// ──────────────────────────────────────────────────────────

/// Creates a small, deterministic test cache.
///
/// Default: 256 bytes, 64-byte lines, 2-way set-associative, no
/// prefetcher, enabled, 1-cycle latency.
///
/// With these parameters:
///   - num_lines = 256 / 64 = 4
///   - num_sets  = 4 / 2 = 2
///
/// Set index = (addr / 64) % 2
/// Tag       = addr / 128
fn test_config() -> CacheConfig {
    CacheConfig {
        enabled: true,
        size_bytes: 256,
        line_bytes: 64,
        ways: 2,
        latency: 1,
        prefetcher: PrefetcherKind::None,
        prefetch_degree: 1,
        prefetch_table_size: 64,
        ghb: GhbConfig::default(),
    }
}

/// Next-level (memory) latency for miss penalty calculations.
const NEXT_LEVEL_LATENCY: u64 = 10;

// ══════════════════════════════════════════════════════════
// 1. Hit and miss basics
// ══════════════════════════════════════════════════════════

/// First access to any address is a compulsory (cold) miss.
#[test]
fn cold_miss_returns_miss_no_penalty() {
    let mut cache = CacheSim::new(&test_config());
    let (hit, penalty) = cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);

    assert!(!hit, "First access should be a miss");
    assert_eq!(penalty, 0, "No dirty victim to write back on cold miss");
}

/// Second access to the same address hits with 0 penalty.
#[test]
fn warm_hit_returns_hit_zero_penalty() {
    let mut cache = CacheSim::new(&test_config());
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);

    let (hit, penalty) = cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);
    assert!(hit);
    assert_eq!(penalty, 0);
}

/// A different offset within the same cache line hits.
#[test]
fn same_line_different_offset_hits() {
    let mut cache = CacheSim::new(&test_config());
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);

    let (hit, _) = cache.access(0x1000 + 32, None, false, NEXT_LEVEL_LATENCY);
    assert!(hit, "Different offset in same line should hit");
}

// ══════════════════════════════════════════════════════════
// 2. Set conflict / LRU eviction
// ══════════════════════════════════════════════════════════

/// Filling both ways of a set and accessing a third conflicting address
/// evicts the least recently used line.
#[test]
fn set_conflict_evicts_lru() {
    let mut cache = CacheSim::new(&test_config());

    // Three addresses mapping to set 0 with distinct tags.
    let addr_a = 0u64; // set 0, tag 0
    let addr_b = 128u64; // set 0, tag 1
    let addr_c = 256u64; // set 0, tag 2

    cache.access(addr_a, None, false, NEXT_LEVEL_LATENCY);
    cache.access(addr_b, None, false, NEXT_LEVEL_LATENCY);
    assert!(cache.contains(addr_a));
    assert!(cache.contains(addr_b));

    let (hit, _) = cache.access(addr_c, None, false, NEXT_LEVEL_LATENCY);
    assert!(!hit);
    assert!(!cache.contains(addr_a), "LRU victim should be evicted");
    assert!(cache.contains(addr_b));
    assert!(cache.contains(addr_c));
}

// ══════════════════════════════════════════════════════════
// 3. Write-back accounting
// ══════════════════════════════════════════════════════════

/// Evicting a dirty line incurs the next-level write-back penalty.
#[test]
fn dirty_writeback_penalty_on_eviction() {
    let mut cache = CacheSim::new(&test_config());

    cache.access(0, None, true, NEXT_LEVEL_LATENCY); // dirty
    cache.access(128, None, false, NEXT_LEVEL_LATENCY); // clean
    let (hit, penalty) = cache.access(256, None, false, NEXT_LEVEL_LATENCY);
    assert!(!hit);
    assert_eq!(penalty, NEXT_LEVEL_LATENCY);
    assert_eq!(cache.stats.writebacks, 1);
}

/// Evicting a clean line incurs no penalty.
#[test]
fn clean_eviction_no_penalty() {
    let mut cache = CacheSim::new(&test_config());

    cache.access(0, None, false, NEXT_LEVEL_LATENCY);
    cache.access(128, None, false, NEXT_LEVEL_LATENCY);
    let (hit, penalty) = cache.access(256, None, false, NEXT_LEVEL_LATENCY);
    assert!(!hit);
    assert_eq!(penalty, 0);
    assert_eq!(cache.stats.writebacks, 0);
}

// ══════════════════════════════════════════════════════════
// 4. Flush
// ══════════════════════════════════════════════════════════

/// Flushing invalidates dirty lines; clean lines survive.
#[test]
fn flush_invalidates_only_dirty_lines() {
    let mut cache = CacheSim::new(&test_config());

    cache.access(0x1000, None, true, NEXT_LEVEL_LATENCY); // dirty
    cache.access(0x2000, None, false, NEXT_LEVEL_LATENCY); // clean

    cache.flush();

    assert!(!cache.contains(0x1000), "Dirty line invalidated by flush");
    assert!(cache.contains(0x2000), "Clean line survives flush");
}

// ══════════════════════════════════════════════════════════
// 5. Disabled cache
// ══════════════════════════════════════════════════════════

/// A disabled cache reports (false, 0) and contains nothing.
#[test]
fn disabled_cache_bypasses_everything() {
    let mut config = test_config();
    config.enabled = false;
    let mut cache = CacheSim::new(&config);

    let (hit, penalty) = cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);
    assert!(!hit);
    assert_eq!(penalty, 0);
    assert!(!cache.contains(0x1000));
    assert_eq!(cache.stats.accesses, 0, "Disabled cache records nothing");
}

// ══════════════════════════════════════════════════════════
// 6. Demand stream statistics
// ══════════════════════════════════════════════════════════

/// Hits and misses are tallied per demand access.
#[test]
fn stats_count_hits_and_misses() {
    let mut cache = CacheSim::new(&test_config());
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY); // miss
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY); // hit
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY); // hit

    assert_eq!(cache.stats.accesses, 3);
    assert_eq!(cache.stats.misses, 1);
    assert_eq!(cache.stats.hits, 2);
    assert!((cache.stats.hit_rate() - 66.66).abs() < 0.1);
}

// ══════════════════════════════════════════════════════════
// 7. Prefetcher hook
// ══════════════════════════════════════════════════════════

/// Prefetch config with a next-line prefetcher and a roomy cache so the
/// install stream does not evict the demand stream.
fn next_line_config() -> CacheConfig {
    CacheConfig {
        size_bytes: 4096,
        ways: 4,
        prefetcher: PrefetcherKind::NextLine,
        ..test_config()
    }
}

/// A prefetched line turns the following demand access into a hit and is
/// counted as useful exactly once.
#[test]
fn prefetch_install_serves_next_access() {
    let mut cache = CacheSim::new(&next_line_config());

    // Miss at 0x1000; the next-line prefetcher installs 0x1040.
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);
    assert_eq!(cache.stats.prefetch_candidates, 1);
    assert_eq!(cache.stats.prefetch_installs, 1);
    assert!(cache.contains(0x1040));

    // The demand stream reaches the prefetched line: a useful prefetch.
    let (hit, _) = cache.access(0x1040, None, false, NEXT_LEVEL_LATENCY);
    assert!(hit, "Prefetched line serves the demand access");
    assert_eq!(cache.stats.useful_prefetches, 1);

    // A second hit on the same line is not counted again.
    cache.access(0x1040, None, false, NEXT_LEVEL_LATENCY);
    assert_eq!(cache.stats.useful_prefetches, 1);
}

/// Candidates already resident are deduplicated, not re-installed.
#[test]
fn resident_candidates_are_not_reinstalled() {
    let mut cache = CacheSim::new(&next_line_config());

    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);
    assert_eq!(cache.stats.prefetch_installs, 1);

    // Same trigger again: the candidate 0x1040 is already resident.
    cache.access(0x1000, None, false, NEXT_LEVEL_LATENCY);
    assert_eq!(cache.stats.prefetch_candidates, 2);
    assert_eq!(cache.stats.prefetch_installs, 1);
}

/// The GHB prefetcher wired through the cache turns a sequential stream
/// into hits after a short warmup.
#[test]
fn ghb_prefetcher_covers_sequential_stream() {
    let config = CacheConfig {
        size_bytes: 4096,
        ways: 4,
        prefetcher: PrefetcherKind::Ghb,
        prefetch_degree: 4,
        ..test_config()
    };
    let mut cache = CacheSim::new(&config);

    // Warmup: three sequential accesses at one PC.
    for addr in [0u64, 64, 128] {
        cache.access(addr, Some(0x400), false, NEXT_LEVEL_LATENCY);
    }
    // The stride detector has installed the next lines by now.
    let (hit, _) = cache.access(192, Some(0x400), false, NEXT_LEVEL_LATENCY);
    assert!(hit, "GHB covered the next line of the stream");
    assert!(cache.stats.useful_prefetches >= 1);
}
