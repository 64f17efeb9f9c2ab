//! Tagged Prefetcher.
//!
//! A prefetcher that reduces cache pollution by acting only on demand
//! misses or on hits to lines it prefetched itself.
//!
//! It maintains a small filter of addresses it has issued, simulating the
//! tag bit usually stored in cache line metadata:
//! * On a **miss**: assume a new stream and prefetch the next line(s).
//! * On a **hit** to a previously prefetched line (a useful prefetch):
//!   extend the stream. On an ordinary hit, stay idle to save bandwidth.

use super::{block_address, AddrPriority, PrefetchInfo, Prefetcher};

/// Tagged Prefetcher state.
pub struct TaggedPrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of lines to prefetch ahead.
    degree: usize,
    /// Filter of line addresses issued by this prefetcher.
    prefetched_filter: Vec<u64>,
    /// Mask for indexing the filter.
    filter_mask: usize,
}

impl TaggedPrefetcher {
    /// Creates a new Tagged prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - The number of lines to prefetch ahead.
    pub fn new(line_bytes: usize, degree: usize) -> Self {
        let filter_size = 64;

        Self {
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
            prefetched_filter: vec![0; filter_size],
            filter_mask: filter_size - 1,
        }
    }

    /// Checks if a line address was recently issued by this prefetcher.
    fn was_prefetched(&self, addr: u64) -> bool {
        let idx = ((addr >> 6) as usize) & self.filter_mask;
        self.prefetched_filter[idx] == addr
    }

    /// Records a line address as issued.
    fn mark_prefetched(&mut self, addr: u64) {
        let idx = ((addr >> 6) as usize) & self.filter_mask;
        self.prefetched_filter[idx] = addr;
    }
}

impl Prefetcher for TaggedPrefetcher {
    /// Prefetches the next `degree` lines on a miss or on a hit to a line
    /// this prefetcher issued; stays idle on ordinary hits.
    fn observe(&mut self, info: &PrefetchInfo) -> Vec<AddrPriority> {
        let mut prefetches = Vec::new();
        let aligned = block_address(info.addr, self.line_bytes);

        if !info.hit || self.was_prefetched(aligned) {
            for k in 1..=self.degree {
                let target = aligned.wrapping_add(self.line_bytes * k as u64);
                prefetches.push(AddrPriority::new(target));
                self.mark_prefetched(target);
            }
        }

        prefetches
    }

    fn reset(&mut self) {
        for slot in &mut self.prefetched_filter {
            *slot = 0;
        }
    }
}
