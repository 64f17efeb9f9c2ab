//! Global History Buffer correlation prefetcher.
//!
//! The GHB prefetcher keeps a circular history of recent accesses threaded
//! by two correlation keys (PC and page) and learns two-delta Markov
//! transitions between consecutive address deltas. On each access it picks
//! the PC-keyed delta chain when one exists (it is the more specific key),
//! falling back to the page-keyed chain, then predicts future deltas via a
//! cascade: cheap stride detectors first, the pattern table next, and a
//! frequency/recency fallback last. Predicted deltas are materialized into
//! block addresses subject to a page-boundary admission policy.

/// History buffer, correlation chains, and the delta-pattern table.
pub mod history;

pub use self::history::{AccessInfo, CorrelationKey, GhbHistory};

use super::{block_address, same_page, AddrPriority, PrefetchInfo, Prefetcher};
use crate::config::GhbConfig;

/// GHB prefetcher state: configuration plus the history helper.
pub struct GhbPrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Page size in bytes, for the cross-page admission policy.
    page_bytes: u64,
    /// Nominal number of predictions per access.
    degree: usize,
    /// Whether PC-keyed chains are maintained.
    use_pc: bool,
    /// History buffer and pattern table.
    history: GhbHistory,
}

impl GhbPrefetcher {
    /// Creates a new GHB prefetcher.
    ///
    /// Degenerate tunables are clamped to safe values: `line_bytes` must be
    /// a power of two (64 otherwise), `degree` to at least 1, and the
    /// [`GhbConfig`] fields as documented on [`GhbHistory::new`].
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - Nominal number of predictions per access.
    /// * `config` - GHB tunables (history size, pattern length, keys, page
    ///   size, confidence threshold).
    pub fn new(line_bytes: usize, degree: usize, config: &GhbConfig) -> Self {
        let safe_line = if line_bytes > 0 && line_bytes.is_power_of_two() {
            line_bytes
        } else {
            64
        };
        let safe_degree = degree.max(1);

        Self {
            line_bytes: safe_line as u64,
            page_bytes: config.page_bytes.max(1),
            degree: safe_degree,
            use_pc: config.use_pc,
            history: GhbHistory::new(
                config.history_size,
                config.pattern_length,
                safe_degree,
                config.use_pc,
                config.page_bytes,
                config.confidence_threshold,
            ),
        }
    }

    /// Read access to the history helper, for statistics and inspection.
    pub fn history(&self) -> &GhbHistory {
        &self.history
    }

    /// Cheap detectors that catch regular patterns before the pattern table
    /// is consulted: a constant stride, an alternating (A, B, A, B) pair,
    /// and a constant stride interrupted by a matching earlier triple.
    ///
    /// Returns the predicted deltas, empty when no detector fires.
    fn early_stride(&self, c: &[i64]) -> Vec<i64> {
        let mut predicted = Vec::new();
        let n = c.len();
        if n < 2 {
            return predicted;
        }
        let last = c[n - 1];
        let prev = c[n - 2];

        if last == prev && last != 0 && last.abs() < 200 {
            // Constant stride. Longer runs earn a deeper lookahead.
            let mut stride_count = 2usize;
            for j in (0..n - 2).rev() {
                if c[j] == last {
                    stride_count += 1;
                } else {
                    break;
                }
            }
            let degree = self.degree;
            let prefetch_count = if stride_count >= 6 {
                (degree * 2).min(stride_count)
            } else if stride_count >= 4 {
                (degree + 2).min(stride_count)
            } else if stride_count >= 3 {
                (degree + 1).min(stride_count)
            } else {
                degree
            };
            for i in 0..prefetch_count {
                predicted.push(last.wrapping_mul(i as i64 + 1));
            }
        } else if n >= 4 {
            // Alternating pair (A, B, A, B): extend along the last delta.
            let pp = c[n - 3];
            let ppp = c[n - 4];
            if last == pp && prev == ppp && last != 0 && last.abs() < 200 {
                for i in 0..self.degree.min(3) {
                    predicted.push(last.wrapping_mul(i as i64 + 1));
                }
            }

            // Small stride with a periodic gap, matrix-walk style: the last
            // two triples must agree element-wise and with each other.
            if predicted.is_empty() && n >= 6 {
                let (d1, d2, d3) = (c[n - 1], c[n - 2], c[n - 3]);
                let (d4, d5, d6) = (c[n - 4], c[n - 5], c[n - 6]);
                if d1 == d2
                    && d2 == d3
                    && d4 == d5
                    && d5 == d6
                    && d1 == d4
                    && d1.abs() < 64
                    && d3.abs() < 200
                {
                    for i in 0..self.degree {
                        predicted.push(d1.wrapping_mul(i as i64 + 1));
                    }
                }
            }
        }
        predicted
    }

    /// Turns predicted deltas into prefetch addresses.
    ///
    /// Deltas are ordered positive-first then by magnitude. When the head
    /// of the list forms a `1x, 2x, 3x` progression of a small stride, the
    /// whole batch is laid out cumulatively from the trigger block;
    /// otherwise each delta applies to the trigger block directly. A
    /// prefetch that leaves the trigger's page is admitted only for small
    /// sequential strides, very small deltas, or small backward deltas.
    fn materialize(
        &self,
        block_addr: u64,
        predicted: &mut Vec<i64>,
        addresses: &mut Vec<AddrPriority>,
    ) {
        predicted.sort_by(|a, b| {
            (*b > 0)
                .cmp(&(*a > 0))
                .then_with(|| a.abs().cmp(&b.abs()))
        });

        let mut is_sequential = false;
        let mut base_stride = 0i64;
        if predicted.len() >= 2 {
            base_stride = predicted[0];
            if base_stride != 0 && base_stride.abs() < 200 {
                is_sequential = true;
                for i in 1..predicted.len().min(3) {
                    if predicted[i] != base_stride.wrapping_mul(i as i64 + 1) {
                        is_sequential = false;
                        break;
                    }
                }
            }
        }

        let mut current_base = block_addr;
        for (i, &delta) in predicted.iter().enumerate() {
            if delta == 0 {
                continue;
            }

            let next_addr = if is_sequential && base_stride != 0 {
                // Cumulative layout reaches further ahead than re-applying
                // each raw delta to the trigger block.
                let cumulative = base_stride.wrapping_mul(i as i64 + 1);
                let addr = (block_addr as i64).wrapping_add(cumulative) as u64;
                current_base = addr;
                addr
            } else if is_sequential && i > 0 {
                let addr = (current_base as i64).wrapping_add(delta) as u64;
                current_base = addr;
                addr
            } else {
                (block_addr as i64).wrapping_add(delta) as u64
            };

            if !same_page(block_addr, next_addr, self.page_bytes) {
                let allow = (is_sequential && base_stride.abs() < 64)
                    || delta.abs() < 32
                    || (delta < 0 && delta.abs() < 128);
                if !allow {
                    continue;
                }
            }

            addresses.push(AddrPriority::new(next_addr));
        }
    }
}

impl Prefetcher for GhbPrefetcher {
    /// Observes a memory access and generates prefetch requests.
    ///
    /// Runs the full per-access pipeline: record the block-aligned access,
    /// build the PC- and page-keyed delta chains, train the pattern table
    /// on the selected chain, then predict via the early stride detectors,
    /// the pattern table (retrying on the page chain when it differs), or
    /// the fallback, and finally materialize addresses.
    ///
    /// Absence of a prediction is a silent no-op: the returned vector is
    /// empty and only the learned state has changed.
    fn observe(&mut self, info: &PrefetchInfo) -> Vec<AddrPriority> {
        let mut addresses = Vec::new();
        if self.history.is_empty() {
            return addresses;
        }

        let block_addr = block_address(info.addr, self.line_bytes);
        let access = AccessInfo {
            addr: block_addr,
            pc: if self.use_pc { info.pc } else { None },
        };
        let idx = match self.history.insert(&access) {
            Some(idx) => idx,
            None => return addresses,
        };

        // PC chains are more specific; the page chain is the fallback.
        let pc_deltas = self.history.build_pattern(idx, CorrelationKey::Pc);
        let page_deltas = self.history.build_pattern(idx, CorrelationKey::Page);
        let deltas = if !pc_deltas.is_empty() {
            &pc_deltas
        } else if !page_deltas.is_empty() {
            &page_deltas
        } else {
            return addresses;
        };

        let chronological: Vec<i64> = deltas.iter().rev().copied().collect();
        self.history.update_pattern_table(&chronological);

        let mut predicted = self.early_stride(&chronological);

        if predicted.is_empty() {
            predicted = self.history.find_pattern_match(&chronological);
        }

        // The PC chain came up empty-handed; retrain and retry on the page
        // chain when it is a genuinely different sequence.
        if predicted.is_empty()
            && !page_deltas.is_empty()
            && (pc_deltas.is_empty() || page_deltas != pc_deltas)
        {
            let page_chronological: Vec<i64> = page_deltas.iter().rev().copied().collect();
            self.history.update_pattern_table(&page_chronological);
            predicted = self.history.find_pattern_match(&page_chronological);
        }

        if predicted.is_empty() {
            predicted = self.history.fallback_pattern(&chronological);
        }
        if predicted.is_empty() {
            return addresses;
        }

        self.materialize(block_addr, &mut predicted, &mut addresses);
        addresses
    }

    fn reset(&mut self) {
        self.history.reset();
    }
}
