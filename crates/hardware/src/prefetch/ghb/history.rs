//! Global History Buffer bookkeeping and delta-pattern learning.
//!
//! [`GhbHistory`] owns the circular access history, the per-key last-index
//! maps that thread correlation chains through it, and the two-delta Markov
//! pattern table. The dispatcher in the parent module drives it once per
//! observed access.
//!
//! The history is an arena: entries link backwards by slot index, and each
//! link carries the sequence number the predecessor had when the link was
//! written. A chain walk compares that snapshot against the slot's current
//! sequence number, so a reused slot truncates the chain lazily instead of
//! requiring back-pointer scrubbing on every eviction.

use std::collections::{BTreeMap, HashMap};

/// Correlation keys used to chain accesses through the history.
///
/// The set is closed; links and last-index maps are fixed-size arrays
/// indexed by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKey {
    /// Program counter of the triggering instruction.
    Pc = 0,
    /// Page number of the accessed block (`addr / page_bytes`).
    Page = 1,
}

/// Number of correlation keys (size of the per-entry link array).
pub const NUM_CORRELATION_KEYS: usize = 2;

impl CorrelationKey {
    /// Index of this key into link and last-index arrays.
    fn index(self) -> usize {
        self as usize
    }
}

/// One observed access, as recorded into the history.
#[derive(Debug, Clone, Copy)]
pub struct AccessInfo {
    /// Block address of the access.
    pub addr: u64,
    /// Program counter, when the access carried one.
    pub pc: Option<u64>,
}

/// Back-link from a history entry to its predecessor under one key.
#[derive(Debug, Clone, Copy, Default)]
struct LinkInfo {
    /// Slot index of the previous access sharing this key value.
    prev: Option<usize>,
    /// Sequence number `prev` held when this link was written. A mismatch
    /// at walk time means the slot was reused and the chain ends here.
    prev_seq: u64,
    /// Key value this entry is chained under, if any.
    key: Option<u64>,
}

/// One slot of the circular history buffer.
#[derive(Debug, Clone, Default)]
struct GhbEntry {
    addr: u64,
    seq: u64,
    links: [LinkInfo; NUM_CORRELATION_KEYS],
}

/// Pair of consecutive deltas; the lookup key of the pattern table.
type DeltaPair = (i64, i64);

/// Observed next-delta distribution for one delta pair.
///
/// Invariant: `total` equals the sum of `counts` values, and no entry with
/// `total == 0` is kept in the table.
#[derive(Debug, Clone, Default)]
struct PatternEntry {
    counts: BTreeMap<i64, u32>,
    total: u32,
}

/// Global History Buffer state: circular history, correlation chains, and
/// the delta-pattern table.
///
/// All tunables are clamped to safe values at construction; see
/// [`GhbHistory::new`].
pub struct GhbHistory {
    pattern_length: usize,
    degree: usize,
    use_pc: bool,
    page_bytes: u64,
    confidence_threshold: u32,

    history: Vec<GhbEntry>,
    last_index: [HashMap<u64, usize>; NUM_CORRELATION_KEYS],
    head: usize,
    filled: bool,
    sequence_counter: u64,
    pattern_table: HashMap<DeltaPair, PatternEntry>,
}

impl GhbHistory {
    /// Creates a new history helper.
    ///
    /// Degenerate tunables are clamped silently: `history_size`,
    /// `pattern_length`, `degree`, and `page_bytes` to at least 1, and
    /// `confidence_threshold` to at most 100.
    ///
    /// # Arguments
    ///
    /// * `history_size` - Number of slots in the circular buffer.
    /// * `pattern_length` - Maximum deltas per chain walk.
    /// * `degree` - Nominal number of predictions per access.
    /// * `use_pc` - Whether PC-keyed chains are maintained.
    /// * `page_bytes` - Page granularity for the page correlation key.
    /// * `confidence_threshold` - Baseline confidence threshold in percent.
    pub fn new(
        history_size: usize,
        pattern_length: usize,
        degree: usize,
        use_pc: bool,
        page_bytes: u64,
        confidence_threshold: u32,
    ) -> Self {
        let safe_size = history_size.max(1);
        Self {
            pattern_length: pattern_length.max(1),
            degree: degree.max(1),
            use_pc,
            page_bytes: page_bytes.max(1),
            confidence_threshold: confidence_threshold.min(100),
            history: vec![GhbEntry::default(); safe_size],
            last_index: [HashMap::new(), HashMap::new()],
            head: 0,
            filled: false,
            sequence_counter: 1,
            pattern_table: HashMap::new(),
        }
    }

    /// Returns everything to post-construction state: history cleared,
    /// chains broken, pattern table emptied.
    pub fn reset(&mut self) {
        for entry in &mut self.history {
            *entry = GhbEntry::default();
        }
        for map in &mut self.last_index {
            map.clear();
        }
        self.head = 0;
        self.filled = false;
        self.sequence_counter = 1;
        self.pattern_table.clear();
    }

    /// True iff the buffer has no slots (only possible for a zero-sized
    /// construction request before clamping; kept as the dispatcher's guard).
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of distinct delta pairs currently in the pattern table.
    pub fn pattern_table_len(&self) -> usize {
        self.pattern_table.len()
    }

    /// Total observation count for the `(prev, cur)` delta pair, 0 if absent.
    pub fn pattern_total(&self, prev: i64, cur: i64) -> u32 {
        self.pattern_table
            .get(&(prev, cur))
            .map_or(0, |entry| entry.total)
    }

    /// Observation count for `next` following the `(prev, cur)` delta pair.
    pub fn pattern_count(&self, prev: i64, cur: i64, next: i64) -> u32 {
        self.pattern_table
            .get(&(prev, cur))
            .and_then(|entry| entry.counts.get(&next).copied())
            .unwrap_or(0)
    }

    /// Number of live chain heads for `key`.
    pub fn last_index_len(&self, key: CorrelationKey) -> usize {
        self.last_index[key.index()].len()
    }

    /// Drops the victim slot's last-index mappings before reuse.
    ///
    /// Only mappings that still point at the victim are erased; a newer
    /// entry with the same key value keeps its mapping, and any chain
    /// passing through the victim is truncated lazily by the seq guard.
    fn remove_index_mappings(&mut self, slot: usize) {
        for idx in 0..NUM_CORRELATION_KEYS {
            if let Some(value) = self.history[slot].links[idx].key {
                if self.last_index[idx].get(&value).copied() == Some(slot) {
                    self.last_index[idx].remove(&value);
                }
                self.history[slot].links[idx].key = None;
            }
        }
    }

    /// Chains `slot` under `key = value`: links it to the previous holder
    /// of the value (snapshotting that slot's seq) and takes over as the
    /// chain head.
    fn assign_correlation(&mut self, slot: usize, key: CorrelationKey, value: u64) {
        let idx = key.index();
        let (prev, prev_seq) = match self.last_index[idx].get(&value).copied() {
            Some(p) => (Some(p), self.history[p].seq),
            None => (None, 0),
        };
        let link = &mut self.history[slot].links[idx];
        link.prev = prev;
        link.prev_seq = prev_seq;
        link.key = Some(value);
        self.last_index[idx].insert(value, slot);
    }

    /// Records an access into the history.
    ///
    /// Evicts the outgoing occupant of the head slot (once the buffer has
    /// wrapped), writes the new entry with a fresh sequence number, and
    /// chains it under the PC key (when enabled and present) and the page
    /// key.
    ///
    /// # Returns
    ///
    /// The slot index written, or `None` if the buffer has no slots.
    pub fn insert(&mut self, access: &AccessInfo) -> Option<usize> {
        if self.history.is_empty() {
            return None;
        }

        if self.filled {
            self.remove_index_mappings(self.head);
        }

        let slot = self.head;
        self.history[slot] = GhbEntry {
            addr: access.addr,
            seq: self.sequence_counter,
            links: [LinkInfo::default(); NUM_CORRELATION_KEYS],
        };
        self.sequence_counter += 1;

        if self.use_pc {
            if let Some(pc) = access.pc {
                self.assign_correlation(slot, CorrelationKey::Pc, pc);
            }
        }
        self.assign_correlation(slot, CorrelationKey::Page, access.addr / self.page_bytes);

        self.head = (self.head + 1) % self.history.len();
        if self.head == 0 {
            self.filled = true;
        }
        Some(slot)
    }

    /// Walks the `key` chain backwards from `index` and returns the deltas
    /// in reverse-chronological order (newest first), at most
    /// `pattern_length` of them.
    ///
    /// The walk stops at a missing link or at a predecessor whose sequence
    /// number no longer matches the link snapshot (the slot was reused).
    pub fn build_pattern(&self, index: usize, key: CorrelationKey) -> Vec<i64> {
        let mut deltas = Vec::new();
        if index >= self.history.len() {
            return deltas;
        }

        let idx = key.index();
        let mut current = index;
        while deltas.len() < self.pattern_length {
            let link = self.history[current].links[idx];
            let prev = match link.prev {
                Some(p) => p,
                None => break,
            };
            let prev_entry = &self.history[prev];
            if prev_entry.seq != link.prev_seq {
                break;
            }
            deltas.push((self.history[current].addr as i64).wrapping_sub(prev_entry.addr as i64));
            current = prev;
        }
        deltas
    }

    /// Bumps the count for `next` following the `(prev, cur)` pair.
    fn learn(&mut self, prev: i64, cur: i64, next: i64) {
        let entry = self.pattern_table.entry((prev, cur)).or_default();
        *entry.counts.entry(next).or_insert(0) += 1;
        entry.total += 1;
    }

    /// Trains the pattern table on a forward-temporal delta window.
    ///
    /// Besides the plain two-delta transition at each position, the table
    /// learns the next three forward transitions, two overlapping windows
    /// reaching back one and two deltas, and the sign-negated (reverse)
    /// transition. The extra scales speed up learning on short windows at
    /// the cost of extra table entries.
    pub fn update_pattern_table(&mut self, chronological: &[i64]) {
        let n = chronological.len();
        if n < 3 {
            return;
        }
        let c = chronological;

        for i in 0..n - 2 {
            self.learn(c[i], c[i + 1], c[i + 2]);

            // Forward chains: the following one, two, and three transitions.
            if i + 3 < n {
                self.learn(c[i + 1], c[i + 2], c[i + 3]);
                if i + 4 < n {
                    self.learn(c[i + 2], c[i + 3], c[i + 4]);
                    if i + 5 < n {
                        self.learn(c[i + 3], c[i + 4], c[i + 5]);
                    }
                }
            }

            // Overlapping windows reaching back one and two positions.
            if i + 3 < n && i >= 1 {
                self.learn(c[i - 1], c[i], c[i + 2]);
                if i >= 2 && i + 4 < n {
                    self.learn(c[i - 2], c[i - 1], c[i + 2]);
                }
            }

            // Reverse training: the mirrored transition for backward walks.
            if i >= 1 {
                self.learn(-c[i], -c[i + 1], -c[i + 2]);
            }
        }
    }

    /// Per-entry confidence threshold: entries with more observations may
    /// match at a lower confidence, down to a floor.
    fn adaptive_threshold(&self, total: u32) -> u32 {
        let base = self.confidence_threshold;
        if total >= 50 {
            base.saturating_sub(30).max(12)
        } else if total >= 40 {
            base.saturating_sub(25).max(15)
        } else if total >= 30 {
            base.saturating_sub(22).max(18)
        } else if total >= 20 {
            base.saturating_sub(18).max(20)
        } else if total >= 12 {
            base.saturating_sub(15).max(22)
        } else if total >= 6 {
            base.saturating_sub(10).max(25)
        } else if total >= 3 {
            base.saturating_sub(8).max(30)
        } else {
            base.saturating_sub(5).max(35)
        }
    }

    /// Predicts future deltas from the pattern table.
    ///
    /// Candidate generation tries up to three delta-pair keys (the last two
    /// deltas, then the pairs one and two positions earlier), weighting the
    /// primary key 5x. The number of predictions scales with the primary
    /// entry's confidence and observation count, then three refill stages
    /// run: a lenient re-scan of the keys, chained extrapolation through
    /// the table, and stride amplification when a prediction agrees with
    /// the most recent delta.
    ///
    /// # Returns
    ///
    /// Predicted deltas, best first. Empty when no candidate clears its
    /// entry's adaptive threshold.
    pub fn find_pattern_match(&self, chronological: &[i64]) -> Vec<i64> {
        let mut predicted = Vec::new();
        let n = chronological.len();
        if n < 2 {
            return predicted;
        }
        let c = chronological;

        let mut keys: Vec<DeltaPair> = vec![(c[n - 2], c[n - 1])];
        if n >= 3 {
            keys.push((c[n - 3], c[n - 2]));
        }
        if n >= 4 {
            keys.push((c[n - 4], c[n - 3]));
        }

        // Weighted candidates merged across keys, best score per delta.
        let mut candidates: Vec<(i64, u32)> = Vec::new();
        let mut best_adaptive = self.confidence_threshold;
        let mut best_entry: Option<&PatternEntry> = None;
        let mut best_confidence = 0u32;

        for (key_idx, key) in keys.iter().enumerate() {
            let entry = match self.pattern_table.get(key) {
                Some(e) => e,
                None => continue,
            };
            if entry.total < 2 {
                continue;
            }

            let adaptive = self.adaptive_threshold(entry.total);
            if adaptive < best_adaptive {
                best_adaptive = adaptive;
            }

            let entry_best = entry
                .counts
                .values()
                .map(|&count| count * 100 / entry.total)
                .max()
                .unwrap_or(0);
            if key_idx == 0 && entry_best >= adaptive && entry_best > best_confidence {
                best_entry = Some(entry);
                best_confidence = entry_best;
            }

            let weight = if key_idx == 0 { 5 } else { 1 };
            for (&delta, &count) in &entry.counts {
                let confidence = count * 100 / entry.total;
                if confidence < adaptive {
                    continue;
                }
                let mut score = confidence;
                if count >= 5 {
                    score += 8;
                } else if count >= 3 {
                    score += 3;
                }
                score *= weight;
                match candidates.iter_mut().find(|(d, _)| *d == delta) {
                    Some(existing) => existing.1 = existing.1.max(score),
                    None => candidates.push((delta, score)),
                }
            }
        }

        if candidates.is_empty() {
            return predicted;
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let degree = self.degree;
        let mut effective_degree = degree + 2;
        if let Some(entry) = best_entry {
            effective_degree = if best_confidence >= 90 && entry.total >= 20 {
                degree * 10
            } else if best_confidence >= 85 && entry.total >= 15 {
                degree * 8
            } else if best_confidence >= 80 && entry.total >= 10 {
                degree * 6
            } else if best_confidence >= 70 && entry.total >= 5 {
                degree * 4
            } else if best_confidence >= 60 && entry.total >= 3 {
                degree * 2
            } else if best_confidence >= 50 && entry.total >= 2 {
                degree * 2
            } else if best_confidence >= 40 {
                (degree + 4).min(degree * 9 / 5)
            } else if best_confidence >= 30 {
                (degree + 2).min(degree * 3 / 2)
            } else {
                degree + 2
            };
        }

        for &(delta, _) in &candidates {
            if predicted.len() >= effective_degree {
                break;
            }
            predicted.push(delta);
        }

        // Lenient backfill: re-scan the primary entry, then the secondary
        // entries, at reduced thresholds.
        if predicted.len() < effective_degree {
            if let Some(entry) = self.pattern_table.get(&keys[0]) {
                let lenient = best_adaptive.saturating_sub(10).max(25);
                for (&delta, &count) in &entry.counts {
                    if predicted.len() >= effective_degree {
                        break;
                    }
                    let confidence = count * 100 / entry.total;
                    if confidence >= lenient && delta != 0 && !predicted.contains(&delta) {
                        predicted.push(delta);
                    }
                }
            }
            if predicted.len() < effective_degree && keys.len() > 1 {
                let lenient = best_adaptive.saturating_sub(5).max(25);
                for key in &keys[1..] {
                    if predicted.len() >= effective_degree {
                        break;
                    }
                    let entry = match self.pattern_table.get(key) {
                        Some(e) => e,
                        None => continue,
                    };
                    if entry.total < 3 {
                        continue;
                    }
                    for (&delta, &count) in &entry.counts {
                        if predicted.len() >= effective_degree {
                            break;
                        }
                        let confidence = count * 100 / entry.total;
                        if confidence >= lenient && delta != 0 && !predicted.contains(&delta) {
                            predicted.push(delta);
                        }
                    }
                }
            }
        }

        // Chained extrapolation: treat the newest predictions as the next
        // delta pair and follow the table forward, one delta per attempt.
        let max_chain_attempts = effective_degree * 3;
        if !predicted.is_empty() && predicted.len() < effective_degree {
            let last_delta = c[n - 1];
            for attempt in 0..max_chain_attempts {
                if predicted.len() >= effective_degree {
                    break;
                }
                let chain_base = if attempt == 0 {
                    predicted[0]
                } else {
                    predicted[predicted.len() - 1]
                };
                let chain_prev = if attempt == 0 || predicted.len() < 2 {
                    last_delta
                } else {
                    predicted[predicted.len() - 2]
                };
                let entry = match self.pattern_table.get(&(chain_prev, chain_base)) {
                    Some(e) => e,
                    None => break,
                };
                let threshold = if attempt == 0 {
                    best_adaptive.max(25)
                } else {
                    best_adaptive.saturating_sub(10).max(20)
                };
                let mut chain_candidates: Vec<(i64, u32)> = entry
                    .counts
                    .iter()
                    .map(|(&delta, &count)| (delta, count * 100 / entry.total))
                    .filter(|&(_, confidence)| confidence >= threshold)
                    .collect();
                chain_candidates.sort_by(|a, b| b.1.cmp(&a.1));
                for (delta, _) in chain_candidates {
                    if predicted.len() >= effective_degree {
                        break;
                    }
                    if delta != 0 && !predicted.contains(&delta) {
                        predicted.push(delta);
                        break;
                    }
                }
            }
        }

        // Stride amplification: a prediction that agrees with the most
        // recent delta (within +-2) is treated as a confirmed stride and
        // extended multiplicatively toward the effective degree.
        if predicted.len() < effective_degree {
            let last_delta = c[n - 1];
            let stride = predicted
                .iter()
                .copied()
                .find(|&p| (p - last_delta).abs() <= 2 && p != 0 && p.abs() < 300);
            if let Some(stride) = stride {
                let mut i = predicted.len();
                while i < effective_degree {
                    let amplified = stride.wrapping_mul(i as i64 + 1);
                    if predicted.iter().any(|&e| (e - amplified).abs() <= 2) {
                        break;
                    }
                    predicted.push(amplified);
                    i += 1;
                }
            }

            // The history itself can confirm a stride: a trailing run of
            // near-equal deltas is extended the same way.
            if predicted.len() < effective_degree && n >= 3 {
                let candidate = c[n - 1];
                if candidate != 0 && candidate.abs() < 300 {
                    let mut run = 1usize;
                    for j in (0..n - 1).rev().take(5) {
                        if (c[j] - candidate).abs() <= 2 {
                            run += 1;
                        } else {
                            break;
                        }
                    }
                    if run >= 2 {
                        let amplify_count = effective_degree - predicted.len();
                        for k in 0..amplify_count {
                            if predicted.len() >= effective_degree {
                                break;
                            }
                            let amplified = candidate.wrapping_mul(k as i64 + 1);
                            if !predicted.iter().any(|&e| (e - amplified).abs() <= 2) {
                                predicted.push(amplified);
                            }
                        }
                    }
                }
            }
        }

        predicted
    }

    /// Frequency/recency fallback used when pattern matching produces
    /// nothing.
    ///
    /// Tallies the non-zero deltas of the recent window, scores them by
    /// `3*frequency + 2*recency`, and either extends a trailing run of the
    /// top delta as a stride (run length scales the prediction count) or
    /// emits the scored deltas up to `degree`, backfilled with the
    /// remaining unique recent deltas.
    pub fn fallback_pattern(&self, chronological: &[i64]) -> Vec<i64> {
        let mut predicted = Vec::new();
        if chronological.is_empty() {
            return predicted;
        }
        let c = chronological;
        let n = c.len();

        let lookback = n.min(self.pattern_length);
        let mut freq: HashMap<i64, u32> = HashMap::new();
        let mut recency: HashMap<i64, u32> = HashMap::new();
        for (j, &delta) in c.iter().enumerate().skip(n - lookback) {
            if delta != 0 {
                *freq.entry(delta).or_insert(0) += 1;
                let age = (n - j) as u32;
                let slot = recency.entry(delta).or_insert(0);
                *slot = (*slot).max(age);
            }
        }

        let mut sorted: Vec<(i64, u32)> = freq.into_iter().collect();
        sorted.sort_by(|a, b| {
            let score_a = a.1 * 3 + recency.get(&a.0).copied().unwrap_or(0) * 2;
            let score_b = b.1 * 3 + recency.get(&b.0).copied().unwrap_or(0) * 2;
            score_b
                .cmp(&score_a)
                .then_with(|| (b.0 > 0).cmp(&(a.0 > 0)))
                .then_with(|| a.0.abs().cmp(&b.0.abs()))
        });

        // A trailing run of the top-scored delta is a stride; extend it
        // with a count that grows with the run length.
        if let Some(&(candidate, count)) = sorted.first() {
            if count >= 1 {
                let mut consecutive = 0usize;
                for j in (0..n).rev().take(8) {
                    if c[j] == candidate {
                        consecutive += 1;
                    } else {
                        break;
                    }
                }
                if consecutive >= 1 && candidate.abs() < 300 {
                    let degree = self.degree;
                    let prefetch_count = if consecutive >= 8 {
                        degree * 6
                    } else if consecutive >= 6 {
                        degree * 5
                    } else if consecutive >= 4 {
                        degree * 4
                    } else if consecutive >= 2 {
                        degree * 2
                    } else {
                        (degree + 2).min(degree * 3 / 2)
                    };
                    for i in 0..prefetch_count {
                        predicted.push(candidate.wrapping_mul(i as i64 + 1));
                    }
                    return predicted;
                }
            }
        }

        for &(delta, _) in &sorted {
            if predicted.len() >= self.degree {
                break;
            }
            predicted.push(delta);
        }

        if predicted.len() < self.degree {
            for j in (0..n).rev() {
                if predicted.len() >= self.degree {
                    break;
                }
                let delta = c[j];
                if delta != 0 && !predicted.contains(&delta) {
                    predicted.push(delta);
                }
            }
        }

        predicted
    }
}
