//! Stream Prefetcher.
//!
//! A prefetcher designed to detect and lock onto sequential access
//! streams. Unlike the stride prefetcher, which tracks arbitrary deltas
//! per stream, this one specifically optimizes for contiguous forward or
//! backward patterns (one cache line up or down per access).
//!
//! It keeps the previous access to determine direction; once a direction
//! is established with enough confidence, it prefetches multiple lines
//! ahead in that direction.

use super::{block_address, AddrPriority, PrefetchInfo, Prefetcher};

/// Direction of the memory stream.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// No stable direction detected.
    None,
    /// Ascending memory addresses.
    Ascending,
    /// Descending memory addresses.
    Descending,
}

/// Stream Prefetcher state.
pub struct StreamPrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of lines to prefetch ahead.
    degree: usize,
    /// The address accessed previously.
    last_addr: u64,
    /// The current detected stream direction.
    direction: Direction,
    /// Confidence counter for the current stream.
    confidence: u8,
}

impl StreamPrefetcher {
    /// Creates a new Stream prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - The number of lines to prefetch ahead.
    pub fn new(line_bytes: usize, degree: usize) -> Self {
        Self {
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
            last_addr: 0,
            direction: Direction::None,
            confidence: 0,
        }
    }
}

impl Prefetcher for StreamPrefetcher {
    /// Compares the access against the previous one to track stream
    /// direction, and prefetches `degree` lines along the stream once
    /// confidence reaches 2.
    fn observe(&mut self, info: &PrefetchInfo) -> Vec<AddrPriority> {
        let mut prefetches = Vec::new();
        let diff = (info.addr as i64).wrapping_sub(self.last_addr as i64);
        let line = self.line_bytes as i64;

        let current_dir = if diff == line {
            Direction::Ascending
        } else if diff == -line {
            Direction::Descending
        } else {
            Direction::None
        };

        if current_dir != Direction::None {
            if current_dir == self.direction {
                if self.confidence < 3 {
                    self.confidence += 1;
                }
            } else {
                self.direction = current_dir;
                self.confidence = 1;
            }
        } else if self.confidence > 0 {
            self.confidence -= 1;
        } else {
            self.direction = Direction::None;
        }

        if self.confidence >= 2 {
            let base = block_address(info.addr, self.line_bytes);
            for k in 1..=self.degree {
                let offset = if self.direction == Direction::Ascending {
                    (k as i64) * line
                } else {
                    (k as i64) * -line
                };
                prefetches.push(AddrPriority::new((base as i64).wrapping_add(offset) as u64));
            }
        }

        self.last_addr = info.addr;
        prefetches
    }

    fn reset(&mut self) {
        self.last_addr = 0;
        self.direction = Direction::None;
        self.confidence = 0;
    }
}
