//! Stride Prefetcher.
//!
//! A prefetcher that detects constant stride patterns in memory accesses.
//! It maintains a Reference Prediction Table (RPT) tracking the last
//! address and stride per instruction stream, indexed by the access PC
//! when one is present and by a hash of the address otherwise.
//!
//! Prefetching is triggered only when a stable stride pattern is
//! established (confidence threshold is met).

use super::{block_address, AddrPriority, PrefetchInfo, Prefetcher};

/// Entry in the Reference Prediction Table.
#[derive(Default, Clone, Copy)]
struct RptEntry {
    /// The last address accessed by this stream.
    last_addr: u64,
    /// The detected stride (difference between consecutive accesses).
    stride: i64,
    /// Confidence counter (2-bit saturating).
    confidence: u8,
}

/// Stride Prefetcher state.
pub struct StridePrefetcher {
    /// Reference Prediction Table.
    table: Vec<RptEntry>,
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Mask used to index the table.
    table_mask: usize,
    /// Number of strides to prefetch ahead.
    degree: usize,
}

impl StridePrefetcher {
    /// Creates a new Stride prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `table_size` - Number of entries in the RPT (must be a power of 2).
    /// * `degree` - The number of strides to prefetch ahead.
    pub fn new(line_bytes: usize, table_size: usize, degree: usize) -> Self {
        let safe_size = if table_size > 0 && table_size.is_power_of_two() {
            table_size
        } else {
            64
        };

        Self {
            table: vec![RptEntry::default(); safe_size],
            line_bytes: line_bytes as u64,
            table_mask: safe_size - 1,
            degree: degree.max(1),
        }
    }

    /// Table index for an access: the PC when the access carries one,
    /// otherwise the line number of the address.
    fn index(&self, info: &PrefetchInfo) -> usize {
        let key = match info.pc {
            Some(pc) => pc >> 2,
            None => info.addr >> 6,
        };
        (key as usize) & self.table_mask
    }
}

impl Prefetcher for StridePrefetcher {
    /// Updates the RPT with the current access and, once the stride for
    /// the stream is stable (confidence saturated), requests `degree`
    /// stride-ahead lines.
    fn observe(&mut self, info: &PrefetchInfo) -> Vec<AddrPriority> {
        let idx = self.index(info);
        let entry = &mut self.table[idx];

        let current_stride = (info.addr as i64).wrapping_sub(entry.last_addr as i64);
        let mut prefetches = Vec::new();

        if current_stride == entry.stride {
            if entry.confidence < 3 {
                entry.confidence += 1;
            } else {
                for k in 1..=self.degree {
                    let lookahead = entry.stride.wrapping_mul(k as i64);
                    let target = (info.addr as i64).wrapping_add(lookahead) as u64;
                    prefetches.push(AddrPriority::new(block_address(target, self.line_bytes)));
                }
            }
        } else if entry.confidence > 0 {
            entry.confidence -= 1;
        } else {
            entry.stride = current_stride;
        }

        entry.last_addr = info.addr;
        prefetches
    }

    fn reset(&mut self) {
        for entry in &mut self.table {
            *entry = RptEntry::default();
        }
    }
}
