//! Pairwise (one-vs-one) multi-class training.

use tracing::debug;

use crate::errors::SvmError;
use crate::matrix::{MatrixEvaluator, SparseMatrix};
use crate::svm::cache::{CachedKernelEvaluator, SwapListener};
use crate::svm::kernel::{GaussParams, RbfKernelEvaluator};
use crate::svm::predict::PairwiseClassifier;
use crate::svm::solver::train_binary;
use crate::svm::strategy::WorstViolatorStrategy;
use crate::TrainParams;

/// One trained binary decision function.
///
/// `yalphas` are label-signed dual coefficients and `samples` the positions
/// of the corresponding support vectors, both indexed by support-vector
/// slot; `size` bounds the slots that carry weight. After
/// [`PairwiseSolver::train`] finishes, `samples` points into the merged
/// support-vector prefix shared by all models.
#[derive(Clone, Debug, Default)]
pub struct PairwiseModel {
    pub labels: (usize, usize),
    pub yalphas: Vec<f64>,
    pub bias: f64,
    pub samples: Vec<usize>,
    pub size: usize,
}

impl PairwiseModel {
    fn new(labels: (usize, usize)) -> PairwiseModel {
        PairwiseModel {
            labels,
            ..PairwiseModel::default()
        }
    }

    /// Decision value against a kernel row over the merged prefix.
    pub fn decision(&self, kernel_row: &[f64]) -> f64 {
        let mut decision = self.bias;
        for i in 0..self.size {
            decision += self.yalphas[i] * kernel_row[self.samples[i]];
        }
        decision
    }
}

/// The assembled multi-class state: one model per unordered label pair and
/// the size of the merged support-vector prefix they index into.
#[derive(Clone, Debug, Default)]
pub struct PairwiseResult {
    pub models: Vec<PairwiseModel>,
    pub max_sv_count: usize,
    pub class_count: usize,
}

/// Trains one binary model per label pair over a shared sample array.
pub struct PairwiseSolver {
    cache: CachedKernelEvaluator,
    state: PairwiseResult,
    label_names: Vec<String>,
    size: usize,
    current_size: usize,
}

impl std::fmt::Debug for PairwiseSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairwiseSolver")
            .field("state", &self.state)
            .field("label_names", &self.label_names)
            .field("size", &self.size)
            .field("current_size", &self.current_size)
            .finish()
    }
}

impl PairwiseSolver {
    /// Validates the data set and prepares the solver.
    ///
    /// Pairs are enumerated by descending combined class size so the
    /// largest subproblems run first and reuse the warmest cache.
    pub fn new(
        label_names: Vec<String>,
        samples: SparseMatrix,
        labels: Vec<usize>,
        params: TrainParams,
    ) -> Result<PairwiseSolver, SvmError> {
        let size = samples.height();
        if size < 2 || label_names.len() < 2 {
            return Err(SvmError::DegenerateProblem {
                samples: size,
                labels: label_names.len(),
            });
        }

        let mut class_sizes = vec![0usize; label_names.len()];
        for &label in &labels {
            class_sizes[label] += 1;
        }
        let mut sizes: Vec<(usize, usize)> = class_sizes.iter().copied().enumerate().collect();
        sizes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut state = PairwiseResult {
            models: Vec::new(),
            max_sv_count: 0,
            class_count: label_names.len(),
        };
        for (i, &(first, _)) in sizes.iter().enumerate() {
            for &(second, _) in &sizes[i + 1..] {
                state.models.push(PairwiseModel::new((first, second)));
            }
        }

        // parameters are placeholders until `set_kernel_params` is called
        let evaluator = RbfKernelEvaluator::new(
            MatrixEvaluator::new(samples),
            labels,
            params.bias.weight(),
            1.0,
            GaussParams::new(1.0),
            params.epochs,
            params.margin,
        );
        let cache = CachedKernelEvaluator::new(
            evaluator,
            Box::new(WorstViolatorStrategy),
            params.cache_bytes,
        );

        Ok(PairwiseSolver {
            cache,
            state,
            label_names,
            size,
            current_size: size,
        })
    }

    /// Trains every label pair, then rewrites all per-model support-vector
    /// references into one shared prefix of the sample array.
    pub fn train(&mut self) {
        let total_size = self.current_size;

        for m in 0..self.state.models.len() {
            let pair = self.state.models[m].labels;
            let pair_size = self.reorder_samples(total_size, pair);

            self.cache.set_pivot(pair.1);
            self.set_current_size(pair_size);
            self.cache.reset();
            let iterations = train_binary(&mut self.cache);

            self.state.models[m].yalphas = self.cache.alphas().to_vec();
            self.state.models[m].samples = self.cache.backward_order().to_vec();
            self.state.models[m].bias = self.cache.bias();
            self.state.models[m].size = self.cache.sv_count() - 1;

            debug!(
                pair = ?pair,
                size = pair_size,
                sv = self.state.models[m].size,
                iterations,
                "pair trained"
            );
        }

        // merge the per-pair support vectors into one shared prefix
        let mut free = 0;
        for m in 0..self.state.models.len() {
            for k in 0..self.state.models[m].size {
                let original = self.state.models[m].samples[k];
                let mut position = self.cache.forward_order()[original];
                if position >= free {
                    self.cache.swap_samples(position, free);
                    position = free;
                    free += 1;
                }
                self.state.models[m].samples[k] = position;
            }
        }
        self.state.max_sv_count = free;

        self.set_current_size(total_size);
    }

    /// Moves every sample of the pair to the front of the active segment
    /// and returns how many there are.
    fn reorder_samples(&mut self, size: usize, (first, second): (usize, usize)) -> usize {
        let mut train = 0;
        let mut test = size;
        loop {
            while train < size && {
                let label = self.cache.label(train);
                label == first || label == second
            } {
                train += 1;
            }
            while test > 0 && {
                let label = self.cache.label(test - 1);
                label != first && label != second
            } {
                test -= 1;
            }
            if train + 1 < test {
                self.cache.swap_samples(train, test - 1);
                train += 1;
                test -= 1;
            } else {
                break;
            }
        }
        train
    }

    /// Classifier borrowing this solver's state. Valid until the solver is
    /// trained again.
    pub fn classifier(&mut self) -> PairwiseClassifier<'_> {
        PairwiseClassifier::new(&mut self.cache, &self.state)
    }

    pub fn set_kernel_params(&mut self, c: f64, params: GaussParams) {
        self.cache.set_kernel_params(c, params);
    }

    pub fn set_current_size(&mut self, size: usize) {
        self.current_size = size;
        self.cache.set_current_size(size);
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn swap_samples(&mut self, u: usize, v: usize) {
        self.cache.swap_samples(u, v);
    }

    pub fn add_swap_listener(&mut self, listener: Box<dyn SwapListener>) {
        self.cache.add_swap_listener(listener);
    }

    pub fn label(&self, v: usize) -> usize {
        self.cache.label(v)
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn result(&self) -> &PairwiseResult {
        &self.state
    }

    pub fn sv_number(&self) -> usize {
        self.state.max_sv_count
    }
}
