//! Next-Line Prefetcher.
//!
//! A simple spatial prefetcher that requests the next sequential cache
//! line(s) on every observed access. This exploits the spatial locality
//! common in instruction streams and sequential data arrays.

use super::{block_address, AddrPriority, PrefetchInfo, Prefetcher};

/// Next-Line Prefetcher state.
pub struct NextLinePrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of subsequent lines to prefetch (prefetch degree).
    degree: usize,
}

impl NextLinePrefetcher {
    /// Creates a new Next-Line prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - The number of lines to prefetch ahead.
    pub fn new(line_bytes: usize, degree: usize) -> Self {
        Self {
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for NextLinePrefetcher {
    /// Requests the `degree` cache lines following the accessed line.
    fn observe(&mut self, info: &PrefetchInfo) -> Vec<AddrPriority> {
        let base = block_address(info.addr, self.line_bytes);

        (1..=self.degree)
            .map(|k| AddrPriority::new(base.wrapping_add(self.line_bytes * k as u64)))
            .collect()
    }
}
