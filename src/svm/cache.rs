//! Kernel cache and binary model state.
//!
//! [`CachedKernelEvaluator`] is the heart of the trainer. For the current
//! binary subproblem it owns the dual coefficients, the decision outputs
//! over every sample, the support-vector prefix of the sample array and a
//! bounded store of previously computed kernel-row slices.
//!
//! The sample array is partitioned into three segments:
//!
//! ```text
//! [ 0 .. sv_count )             support vectors
//! [ sv_count .. current_size )  in-problem candidates
//! [ current_size .. n )         held out for this fold / label pair
//! ```
//!
//! The only promotion rule is `swap(w, sv_count); sv_count += 1`, and every
//! structure that indexes samples by position is kept consistent through
//! [`CachedKernelEvaluator::swap_samples`].

use crate::svm::kernel::{GaussParams, RbfKernelEvaluator};
use crate::svm::strategy::SelectionStrategy;

/// Marks a sample without a cached kernel row.
pub const INVALID_ENTRY: usize = usize::MAX;

const INITIAL_CACHE_DEPTH: usize = 256;
const CACHE_DEPTH_INCREASE: f64 = 1.5;

/// Index and margin score of the current worst violator.
#[derive(Clone, Copy, Debug)]
pub struct WorstViolator {
    pub index: usize,
    pub error: f64,
}

/// Observer of sample exchanges, used to keep externally owned
/// position-indexed state (fold memberships) in lock-step.
pub trait SwapListener {
    fn notify(&mut self, u: usize, v: usize);
}

/// One node of the LRU cycle. `line` is the slot of the backing buffer the
/// entry owns, `mapping` the sample whose row currently lives there.
#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    prev: usize,
    next: usize,
    line: usize,
    mapping: usize,
}

struct CacheDimension {
    lines: usize,
    depth: usize,
}

/// Kernel cache plus the mutable state of one binary training.
pub struct CachedKernelEvaluator {
    evaluator: RbfKernelEvaluator,
    strategy: Box<dyn SelectionStrategy>,
    listeners: Vec<Box<dyn SwapListener>>,

    output: Vec<f64>,
    alphas: Vec<f64>,
    sv_count: usize,

    kernel_buffer: Vec<f64>,

    problem_size: usize,
    current_size: usize,

    cache_slots: usize,
    cache_lines: usize,
    cache_depth: usize,
    cache: Vec<f64>,
    line_len: Vec<usize>,
    max_line_len: usize,

    forward: Vec<usize>,
    backward: Vec<usize>,

    mappings: Vec<usize>,
    entries: Vec<CacheEntry>,
    lru_entry: usize,
}

impl CachedKernelEvaluator {
    /// Builds the cache for `problem_size` samples within a byte budget.
    ///
    /// The budget is carved into `lines × depth` slots of `f64`; rows are
    /// stored truncated to `depth` columns and anything beyond is computed
    /// on the fly.
    pub fn new(
        evaluator: RbfKernelEvaluator,
        strategy: Box<dyn SelectionStrategy>,
        cache_bytes: usize,
    ) -> CachedKernelEvaluator {
        let problem_size = evaluator.size();
        let mut cache_slots =
            (cache_bytes / std::mem::size_of::<f64>()).max(2 * problem_size);
        if cache_slots / problem_size > problem_size {
            cache_slots = problem_size * problem_size;
        }
        let dim = Self::find_cache_dimension(cache_slots, problem_size);

        let mut cache = CachedKernelEvaluator {
            evaluator,
            strategy,
            listeners: Vec::new(),
            output: vec![0.0; problem_size],
            alphas: vec![0.0; problem_size],
            sv_count: 1,
            kernel_buffer: vec![0.0; problem_size],
            problem_size,
            current_size: problem_size,
            cache_slots,
            cache_lines: dim.lines,
            cache_depth: dim.depth,
            cache: vec![0.0; cache_slots],
            line_len: vec![0; dim.lines],
            max_line_len: 0,
            forward: (0..problem_size).collect(),
            backward: (0..problem_size).collect(),
            mappings: vec![INVALID_ENTRY; problem_size],
            entries: Vec::new(),
            lru_entry: 0,
        };
        cache.initialize();
        cache
    }

    fn find_cache_dimension(cache_slots: usize, problem_size: usize) -> CacheDimension {
        if cache_slots / problem_size < problem_size {
            let depth = INITIAL_CACHE_DEPTH.max(cache_slots / problem_size);
            CacheDimension {
                depth,
                lines: (cache_slots / depth).min(problem_size).max(1),
            }
        } else {
            CacheDimension {
                depth: problem_size,
                lines: problem_size,
            }
        }
    }

    /// Zeroes the model state and rebuilds the LRU cycle.
    ///
    /// The first sample becomes a seed support vector so that the first
    /// violator search can scan from index 1. Its cache line holds the one
    /// value that is always known, the self-kernel.
    pub fn reset(&mut self) {
        let dim = Self::find_cache_dimension(self.cache_slots, self.problem_size);
        self.cache_lines = dim.lines;
        self.cache_depth = dim.depth;
        self.initialize();
    }

    fn initialize(&mut self) {
        for i in 0..self.problem_size {
            self.alphas[i] = 0.0;
            self.output[i] = 0.0;
        }
        self.sv_count = 1;

        self.line_len.clear();
        self.line_len.resize(self.cache_lines, 0);
        self.line_len[0] = 1;
        self.cache[0] = 1.0;
        self.max_line_len = 1;

        self.entries.clear();
        for i in 0..self.cache_lines {
            self.entries.push(CacheEntry {
                prev: i + 1,
                next: i.wrapping_sub(1),
                line: i,
                mapping: i,
            });
        }
        self.entries[self.cache_lines - 1].prev = 0;
        self.entries[0].next = self.cache_lines - 1;
        self.lru_entry = self.cache_lines - 1;

        for i in 0..self.problem_size {
            self.mappings[i] = if i < self.cache_lines { i } else { INVALID_ENTRY };
        }

        self.evaluator.reset_bias();
    }

    /// Margin score `o[v]·ẏ(v)` of one sample.
    pub fn check_violation(&self, v: usize) -> f64 {
        self.output[v] * self.evaluator.binary_label(v)
    }

    /// The candidate with the smallest margin score. Ties keep the lowest
    /// index, which makes runs deterministic. An exhausted candidate
    /// segment reports an infinite score.
    pub fn find_worst_violator(&self) -> WorstViolator {
        let mut worst = WorstViolator {
            index: self.sv_count,
            error: f64::INFINITY,
        };
        for i in self.sv_count..self.current_size {
            let error = self.output[i] * self.evaluator.binary_label(i);
            if error < worst.error {
                worst = WorstViolator { index: i, error };
            }
        }
        worst
    }

    /// One SGD step: evaluates the violator's kernel row over the candidate
    /// segment, then folds the coefficient and bias gradients into the
    /// outputs. Afterwards `output` on `[sv_count, current_size)` is again
    /// consistent with `(alphas, bias)`; the SV segment is not maintained.
    pub fn sgd_step(&mut self, worst_violator: usize, gradient: f64, bias_gradient: f64) {
        self.evaluator.eval_kernel(
            worst_violator,
            self.sv_count,
            self.current_size,
            &mut self.kernel_buffer,
        );

        for i in self.sv_count..self.current_size {
            self.output[i] += self.kernel_buffer[i] * gradient + bias_gradient;
        }

        self.alphas[worst_violator] += gradient;
        self.evaluator.update_bias(bias_gradient);
    }

    /// Moves the violator into the support-vector prefix and returns its
    /// new position. When the prefix would outgrow the cache depth the
    /// cache is re-carved instead and the violator stays in place for this
    /// round.
    pub fn promote_sv(&mut self, v: usize) -> usize {
        let v = if self.sv_count >= self.cache_depth {
            self.grow_cache();
            v
        } else if v > self.sv_count {
            self.swap_samples(v, self.sv_count);
            self.sv_count
        } else {
            v
        };
        self.sv_count += 1;
        v
    }

    /// Exchanges two samples everywhere position-indexed state lives.
    ///
    /// `alphas` deliberately stay put: the only callers either guarantee a
    /// zero coefficient on one side (SV promotion) or run against freshly
    /// reset state (fold and pair reordering).
    pub fn swap_samples(&mut self, u: usize, v: usize) {
        if u == v {
            return;
        }
        self.evaluator.swap_samples(u, v);
        self.output.swap(u, v);

        self.strategy.notify_exchange(u, v);
        for listener in &mut self.listeners {
            listener.notify(u, v);
        }

        self.mappings.swap(u, v);
        if self.mappings[u] != INVALID_ENTRY {
            let entry = self.mappings[u];
            self.entries[entry].mapping = u;
        }
        if self.mappings[v] != INVALID_ENTRY {
            let entry = self.mappings[v];
            self.entries[entry].mapping = v;
        }

        // cached rows cover column ranges by position; any row reaching past
        // the lower swapped position just went stale
        let cut = u.min(v);
        if cut < self.max_line_len {
            for len in &mut self.line_len {
                if *len > cut {
                    *len = cut;
                }
            }
            self.max_line_len = cut;
        }

        self.forward[self.backward[u]] = v;
        self.forward[self.backward[v]] = u;
        self.backward.swap(u, v);
    }

    /// Registers an observer for future sample exchanges.
    pub fn add_swap_listener(&mut self, listener: Box<dyn SwapListener>) {
        self.listeners.push(listener);
    }

    /// Single kernel value, served from a cached row when one covers it.
    pub fn kernel_value(&self, u: usize, v: usize) -> f64 {
        if let Some(value) = self.cached_value(u, v) {
            value
        } else if let Some(value) = self.cached_value(v, u) {
            value
        } else {
            self.evaluator.kernel(u, v)
        }
    }

    fn cached_value(&self, row: usize, column: usize) -> Option<f64> {
        let entry = self.mappings[row];
        if entry == INVALID_ENTRY {
            return None;
        }
        let line = self.entries[entry].line;
        if self.line_len[line] > column {
            Some(self.cache[line * self.cache_depth + column])
        } else {
            None
        }
    }

    /// Fills `out[0..upto]` with the kernel row of `sample`.
    ///
    /// The leading `min(upto, depth)` columns go through the LRU store;
    /// columns beyond the cache depth are evaluated on the fly.
    pub fn kernel_row(&mut self, sample: usize, upto: usize, out: &mut [f64]) {
        let cached_span = upto.min(self.cache_depth);
        if cached_span > 0 {
            let line = self.fetch_row(sample, cached_span);
            let start = line * self.cache_depth;
            out[..cached_span].copy_from_slice(&self.cache[start..start + cached_span]);
        }
        if upto > cached_span {
            self.evaluator.eval_kernel(sample, cached_span, upto, out);
        }
    }

    /// Cache line holding at least `want` columns of `sample`'s row,
    /// touched to the MRU position. Misses evict the LRU victim.
    fn fetch_row(&mut self, sample: usize, want: usize) -> usize {
        debug_assert!(want <= self.cache_depth);
        let entry = self.mappings[sample];
        if entry != INVALID_ENTRY {
            let line = self.entries[entry].line;
            if self.line_len[line] < want {
                self.fill_line(sample, line, self.line_len[line], want);
                self.line_len[line] = want;
                self.max_line_len = self.max_line_len.max(want);
            }
            self.touch(entry);
            line
        } else {
            let entry = self.evict_lru(sample);
            let line = self.entries[entry].line;
            self.fill_line(sample, line, 0, want);
            self.line_len[line] = want;
            self.max_line_len = self.max_line_len.max(want);
            line
        }
    }

    fn fill_line(&mut self, sample: usize, line: usize, from: usize, to: usize) {
        self.evaluator
            .eval_kernel(sample, from, to, &mut self.kernel_buffer);
        let start = line * self.cache_depth;
        self.cache[start + from..start + to].copy_from_slice(&self.kernel_buffer[from..to]);
    }

    /// Reuses the LRU victim's line for `sample` and advances the LRU hand.
    fn evict_lru(&mut self, sample: usize) -> usize {
        let released = self.lru_entry;
        let previous = self.entries[released].mapping;
        self.mappings[previous] = INVALID_ENTRY;
        self.entries[released].mapping = sample;
        self.mappings[sample] = released;
        self.lru_entry = self.entries[released].next;
        released
    }

    /// Moves a live entry to the MRU end of the cycle.
    fn touch(&mut self, id: usize) {
        if id == self.lru_entry {
            self.lru_entry = self.entries[id].next;
            return;
        }

        let prev = self.entries[id].prev;
        let next = self.entries[id].next;
        self.entries[prev].next = next;
        self.entries[next].prev = prev;

        let lru = self.lru_entry;
        let lru_prev = self.entries[lru].prev;
        self.entries[id].next = lru;
        self.entries[id].prev = lru_prev;
        self.entries[lru].prev = id;
        self.entries[lru_prev].next = id;
    }

    /// Re-carves the backing buffer with half again as much depth, keeping
    /// the most recently used rows and invalidating the rest.
    fn grow_cache(&mut self) {
        let new_depth = ((CACHE_DEPTH_INCREASE * self.cache_depth as f64).ceil() as usize)
            .min(self.problem_size);
        let new_lines = (self.cache_slots / new_depth)
            .min(self.problem_size)
            .max(1);
        let mut new_cache = vec![0.0; self.cache_slots];

        // walk the cycle MRU-first
        let mut kept: Vec<(usize, usize, usize)> = Vec::with_capacity(self.cache_lines);
        let mut entry = self.entries[self.lru_entry].prev;
        for _ in 0..self.cache_lines {
            let e = self.entries[entry];
            kept.push((e.mapping, e.line, self.line_len[e.line]));
            entry = self.entries[entry].prev;
        }

        for m in self.mappings.iter_mut() {
            *m = INVALID_ENTRY;
        }
        self.entries.clear();
        let mut new_len = vec![0; new_lines];
        self.max_line_len = 0;
        for (i, &(sample, old_line, len)) in kept.iter().take(new_lines).enumerate() {
            let old_start = old_line * self.cache_depth;
            let new_start = i * new_depth;
            new_cache[new_start..new_start + len]
                .copy_from_slice(&self.cache[old_start..old_start + len]);
            new_len[i] = len;
            self.max_line_len = self.max_line_len.max(len);

            self.entries.push(CacheEntry {
                prev: i + 1,
                next: i.wrapping_sub(1),
                line: i,
                mapping: sample,
            });
            self.mappings[sample] = i;
        }
        self.entries[new_lines - 1].prev = 0;
        self.entries[0].next = new_lines - 1;
        self.lru_entry = new_lines - 1;

        self.cache = new_cache;
        self.line_len = new_len;
        self.cache_depth = new_depth;
        self.cache_lines = new_lines;
    }

    pub fn set_pivot(&mut self, label: usize) {
        self.evaluator.set_pivot(label);
    }

    pub fn set_kernel_params(&mut self, c: f64, params: GaussParams) {
        self.evaluator.set_params(c, params);
        self.reset();
    }

    pub fn set_current_size(&mut self, size: usize) {
        self.current_size = size;
        self.strategy
            .reset_generator(self.evaluator.labels(), size);
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn problem_size(&self) -> usize {
        self.problem_size
    }

    pub fn sv_count(&self) -> usize {
        self.sv_count
    }

    pub fn label(&self, v: usize) -> usize {
        self.evaluator.label(v)
    }

    pub fn binary_label(&self, v: usize) -> f64 {
        self.evaluator.binary_label(v)
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub fn bias(&self) -> f64 {
        self.evaluator.bias()
    }

    pub fn c(&self) -> f64 {
        self.evaluator.c()
    }

    pub fn use_bias(&self) -> f64 {
        self.evaluator.use_bias()
    }

    pub fn epochs(&self) -> f64 {
        self.evaluator.epochs()
    }

    pub fn margin(&self) -> f64 {
        self.evaluator.margin()
    }

    /// `forward[original_id]` is the current position of a sample.
    pub fn forward_order(&self) -> &[usize] {
        &self.forward
    }

    /// `backward[position]` is the original id of the sample there.
    pub fn backward_order(&self) -> &[usize] {
        &self.backward
    }

    #[cfg(test)]
    pub(crate) fn cache_geometry(&self) -> (usize, usize) {
        (self.cache_lines, self.cache_depth)
    }

    #[cfg(test)]
    pub(crate) fn lru_cycle(&self) -> Vec<usize> {
        let mut seen = Vec::with_capacity(self.cache_lines);
        let mut entry = self.lru_entry;
        for _ in 0..self.cache_lines {
            seen.push(entry);
            entry = self.entries[entry].next;
        }
        assert_eq!(entry, self.lru_entry, "the entry list must be a cycle");
        seen
    }

    #[cfg(test)]
    pub(crate) fn cached_rows(&self) -> Vec<(usize, Vec<f64>)> {
        let mut rows = Vec::new();
        for sample in 0..self.problem_size {
            let entry = self.mappings[sample];
            if entry == INVALID_ENTRY {
                continue;
            }
            assert_eq!(self.entries[entry].mapping, sample);
            let line = self.entries[entry].line;
            let start = line * self.cache_depth;
            rows.push((
                sample,
                self.cache[start..start + self.line_len[line]].to_vec(),
            ));
        }
        rows
    }
}
