//! Set-Associative Cache Model.
//!
//! This module implements a configurable set-associative, LRU-replacement
//! cache model. Its job in this crate is to drive prefetchers: every demand
//! access is forwarded to the configured prefetcher, returned candidates
//! are deduplicated against resident lines and installed, and a per-line
//! tag bit tracks whether a prefetch later served a demand hit.

use crate::config::{CacheConfig, PrefetcherKind};
use crate::prefetch::{
    AddrPriority, GhbPrefetcher, NextLinePrefetcher, PrefetchInfo, Prefetcher, StreamPrefetcher,
    StridePrefetcher, TaggedPrefetcher,
};
use crate::stats::SimStats;

/// Cache line entry containing tag, validity, dirty, and prefetch bits.
#[derive(Clone, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
    /// Set when the line was installed by a prefetch and has not yet
    /// served a demand hit.
    prefetched: bool,
}

/// Cache model implementing a set-associative cache with LRU replacement
/// and an optional hardware prefetcher.
///
/// Models cache hits, misses, write-back penalties, prefetch installation,
/// and prefetch usefulness.
pub struct CacheSim {
    /// Access latency in cycles (added on hit; miss adds next-level latency).
    pub latency: u64,
    /// When false, accesses bypass this cache and use next-level latency only.
    pub enabled: bool,
    /// Optional hardware prefetcher (boxed for dynamic dispatch).
    pub prefetcher: Option<Box<dyn Prefetcher + Send + Sync>>,
    /// Counters collected over the run.
    pub stats: SimStats,
    lines: Vec<CacheLine>,
    /// Per-set LRU stacks; index 0 is MRU, last is LRU.
    usage: Vec<Vec<usize>>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
}

impl CacheSim {
    /// Creates a new cache model from the configuration.
    ///
    /// Degenerate geometry is clamped to safe values (1 way, 64-byte
    /// lines, 4 KiB capacity) and the configured prefetcher is
    /// constructed.
    pub fn new(config: &CacheConfig) -> Self {
        let safe_ways = if config.ways == 0 { 1 } else { config.ways };
        let safe_line = if config.line_bytes == 0 {
            64
        } else {
            config.line_bytes
        };
        let safe_size = if config.size_bytes == 0 {
            4096
        } else {
            config.size_bytes
        };

        let num_lines = safe_size / safe_line;
        let num_sets = (num_lines / safe_ways).max(1);

        let prefetcher: Option<Box<dyn Prefetcher + Send + Sync>> = match config.prefetcher {
            PrefetcherKind::NextLine => Some(Box::new(NextLinePrefetcher::new(
                safe_line,
                config.prefetch_degree,
            ))),
            PrefetcherKind::Stride => Some(Box::new(StridePrefetcher::new(
                safe_line,
                config.prefetch_table_size,
                config.prefetch_degree,
            ))),
            PrefetcherKind::Stream => Some(Box::new(StreamPrefetcher::new(
                safe_line,
                config.prefetch_degree,
            ))),
            PrefetcherKind::Tagged => Some(Box::new(TaggedPrefetcher::new(
                safe_line,
                config.prefetch_degree,
            ))),
            PrefetcherKind::Ghb => Some(Box::new(GhbPrefetcher::new(
                safe_line,
                config.prefetch_degree,
                &config.ghb,
            ))),
            PrefetcherKind::None => None,
        };

        Self {
            latency: config.latency,
            enabled: config.enabled,
            prefetcher,
            stats: SimStats::default(),
            lines: vec![CacheLine::default(); num_sets * safe_ways],
            usage: (0..num_sets).map(|_| (0..safe_ways).collect()).collect(),
            num_sets,
            ways: safe_ways,
            line_bytes: safe_line,
        }
    }

    /// Set index and tag for an address.
    fn locate(&self, addr: u64) -> (usize, u64) {
        let set_index = ((addr as usize) / self.line_bytes) % self.num_sets;
        let tag = addr / (self.line_bytes * self.num_sets) as u64;
        (set_index, tag)
    }

    /// Moves `way` to the MRU position of its set.
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Checks if the cache contains the specified address.
    pub fn contains(&self, addr: u64) -> bool {
        if !self.enabled {
            return false;
        }

        let (set_index, tag) = self.locate(addr);
        let base_idx = set_index * self.ways;

        (0..self.ways).any(|i| {
            let line = &self.lines[base_idx + i];
            line.valid && line.tag == tag
        })
    }

    /// Installs a cache line for the specified address.
    ///
    /// Selects the LRU victim of the set, counts a write-back when the
    /// victim is dirty, and installs the new line.
    ///
    /// # Returns
    ///
    /// The penalty in cycles for writing back a dirty victim line.
    fn install_line(
        &mut self,
        addr: u64,
        is_write: bool,
        prefetched: bool,
        next_level_latency: u64,
    ) -> u64 {
        let (set_index, tag) = self.locate(addr);
        let victim_way = *self.usage[set_index]
            .last()
            .expect("every set has at least one way");
        let victim_idx = set_index * self.ways + victim_way;
        let mut penalty = 0;

        if self.lines[victim_idx].valid && self.lines[victim_idx].dirty {
            self.stats.writebacks += 1;
            penalty += next_level_latency;
        }

        self.lines[victim_idx] = CacheLine {
            tag,
            valid: true,
            dirty: is_write,
            prefetched,
        };
        self.touch(set_index, victim_way);

        penalty
    }

    /// Accesses the cache for the specified address.
    ///
    /// Performs the lookup, updates LRU state and usefulness accounting on
    /// hit, installs the line on miss, and then lets the prefetcher observe
    /// the access and install its candidates.
    ///
    /// # Arguments
    ///
    /// * `addr` - The byte address accessed
    /// * `pc` - Program counter of the access, when known
    /// * `is_write` - Whether this is a write operation
    /// * `next_level_latency` - Latency of the next memory level
    ///
    /// # Returns
    ///
    /// A tuple `(hit, penalty)` where `penalty` is the write-back penalty
    /// in cycles (0 on hit).
    pub fn access(
        &mut self,
        addr: u64,
        pc: Option<u64>,
        is_write: bool,
        next_level_latency: u64,
    ) -> (bool, u64) {
        if !self.enabled {
            return (false, 0);
        }

        self.stats.accesses += 1;

        let (set_index, tag) = self.locate(addr);
        let base_idx = set_index * self.ways;

        let mut hit = false;
        let mut penalty = 0;

        for i in 0..self.ways {
            let idx = base_idx + i;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                if self.lines[idx].prefetched {
                    // First demand use of a prefetched line.
                    self.stats.useful_prefetches += 1;
                    self.lines[idx].prefetched = false;
                }
                if is_write {
                    self.lines[idx].dirty = true;
                }
                self.touch(set_index, i);
                hit = true;
                break;
            }
        }

        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            penalty += self.install_line(addr, is_write, false, next_level_latency);
        }

        let mut prefetches: Vec<AddrPriority> = Vec::new();
        if let Some(ref mut pref) = self.prefetcher {
            prefetches = pref.observe(&PrefetchInfo { addr, pc, hit });
        }
        self.stats.prefetch_candidates += prefetches.len() as u64;

        // Dedup against resident lines (and against earlier candidates of
        // this batch, which become resident as they install).
        for request in prefetches {
            if !self.contains(request.addr) {
                self.install_line(request.addr, false, true, next_level_latency);
                self.stats.prefetch_installs += 1;
            }
        }

        (hit, penalty)
    }

    /// Flushes all dirty cache lines, invalidating them.
    pub fn flush(&mut self) {
        if !self.enabled {
            return;
        }
        for line in &mut self.lines {
            if line.valid && line.dirty {
                line.dirty = false;
                line.valid = false;
            }
        }
    }
}
