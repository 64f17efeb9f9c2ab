//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for a trace run. It provides:
//! 1. **Demand stream:** Access, hit, and miss counts with derived rates.
//! 2. **Prefetching:** Candidates emitted, lines installed, useful prefetches,
//!    and derived accuracy/coverage.
//! 3. **Write-backs:** Dirty evictions observed by the cache model.

use std::time::Instant;

/// Simulation statistics structure tracking all performance metrics.
///
/// Collected by [`CacheSim`](crate::cache::CacheSim) during a trace run and
/// printed by the CLI afterwards.
#[derive(Clone)]
pub struct SimStats {
    start_time: Instant,

    /// Demand accesses observed by the cache.
    pub accesses: u64,
    /// Demand accesses that hit.
    pub hits: u64,
    /// Demand accesses that missed.
    pub misses: u64,
    /// Dirty lines written back on eviction.
    pub writebacks: u64,

    /// Prefetch candidates emitted by the prefetcher.
    pub prefetch_candidates: u64,
    /// Prefetched lines actually installed (not already resident).
    pub prefetch_installs: u64,
    /// Prefetched lines that later served a demand hit.
    pub useful_prefetches: u64,
}

impl Default for SimStats {
    /// Returns the default value.
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            accesses: 0,
            hits: 0,
            misses: 0,
            writebacks: 0,
            prefetch_candidates: 0,
            prefetch_installs: 0,
            useful_prefetches: 0,
        }
    }
}

impl SimStats {
    /// Demand hit rate in percent (0 when no accesses were recorded).
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            return 0.0;
        }
        (self.hits as f64 / self.accesses as f64) * 100.0
    }

    /// Fraction of installed prefetches that served a demand hit, in percent.
    pub fn prefetch_accuracy(&self) -> f64 {
        if self.prefetch_installs == 0 {
            return 0.0;
        }
        (self.useful_prefetches as f64 / self.prefetch_installs as f64) * 100.0
    }

    /// Prints the full statistics report to stdout.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let rate = if seconds > 0.0 {
            self.accesses as f64 / seconds
        } else {
            0.0
        };

        println!("\n==========================================================");
        println!("PREFETCHER SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {:.4} s", seconds);
        println!("accesses                 {}", self.accesses);
        println!("access_rate              {:.0} /s", rate);
        println!("----------------------------------------------------------");
        println!("DEMAND STREAM");
        println!("  hits                   {}", self.hits);
        println!("  misses                 {}", self.misses);
        println!("  hit_rate               {:.2}%", self.hit_rate());
        println!("  writebacks             {}", self.writebacks);
        println!("----------------------------------------------------------");
        println!("PREFETCHING");
        println!("  candidates             {}", self.prefetch_candidates);
        println!("  installs               {}", self.prefetch_installs);
        println!("  useful                 {}", self.useful_prefetches);
        println!("  accuracy               {:.2}%", self.prefetch_accuracy());
    }
}
