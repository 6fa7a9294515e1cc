//! Cross-validation over the shared sample array.
//!
//! Fold membership is position-indexed state, so the driver registers a
//! swap listener with the trainer: whenever two samples exchange places —
//! during reordering, support-vector promotion or the pairwise merge —
//! their fold assignments follow.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{rngs::StdRng, Rng};
use tracing::debug;

use crate::svm::cache::SwapListener;
use crate::svm::kernel::GaussParams;
use crate::svm::pairwise::PairwiseSolver;

/// How samples are distributed over folds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldPolicy {
    /// Round-robin per class, so every fold mirrors the overall class mix.
    Fair,
    /// Independent uniform draws from the caller's RNG.
    Uniform,
}

/// Accuracy of one testing pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestingResult {
    pub accuracy: f64,
}

struct FoldMemberships {
    inner: Vec<usize>,
    outer: Vec<usize>,
}

struct FoldSwapListener {
    memberships: Rc<RefCell<FoldMemberships>>,
}

impl SwapListener for FoldSwapListener {
    fn notify(&mut self, u: usize, v: usize) {
        let mut m = self.memberships.borrow_mut();
        m.inner.swap(u, v);
        m.outer.swap(u, v);
    }
}

/// Drives repeated training and testing over inner and outer folds.
pub struct CrossValidationSolver {
    solver: PairwiseSolver,
    memberships: Rc<RefCell<FoldMemberships>>,
    inner_fold_sizes: Vec<usize>,
    outer_fold_sizes: Vec<usize>,
    inner_folds: usize,
    outer_folds: usize,
    outer_fold: usize,
    outer_problem_size: usize,
}

impl CrossValidationSolver {
    /// Assigns fold memberships and hooks the swap listener up.
    pub fn new(
        mut solver: PairwiseSolver,
        inner_folds: usize,
        outer_folds: usize,
        policy: FoldPolicy,
        rng: &mut StdRng,
    ) -> CrossValidationSolver {
        let size = solver.size();
        let mut inner = vec![0usize; size];
        let mut outer = vec![0usize; size];
        let mut inner_fold_sizes = vec![size; inner_folds];
        let mut outer_fold_sizes = vec![size; outer_folds];

        match policy {
            FoldPolicy::Fair => {
                let class_count = solver.label_names().len();
                let fold_count = inner_folds * outer_folds;
                let step = inner_folds + 1;
                let increase = (fold_count / class_count).max(1);
                let mut offsets: Vec<usize> = (0..class_count)
                    .map(|label| (label * increase * step) % fold_count)
                    .collect();

                for i in 0..size {
                    let label = solver.label(i);

                    let inner_fold = offsets[label] % inner_folds;
                    inner[i] = inner_fold;
                    inner_fold_sizes[inner_fold] -= 1;

                    let outer_fold = offsets[label] / inner_folds;
                    outer[i] = outer_fold;
                    if outer_folds > 1 {
                        outer_fold_sizes[outer_fold] -= 1;
                    }

                    offsets[label] = (offsets[label] + step) % fold_count;
                }
            }
            FoldPolicy::Uniform => {
                for i in 0..size {
                    let fold = rng.gen_range(0..inner_folds);
                    inner[i] = fold;
                    inner_fold_sizes[fold] -= 1;
                }
                for i in 0..size {
                    let fold = rng.gen_range(0..outer_folds);
                    outer[i] = fold;
                    if outer_folds > 1 {
                        outer_fold_sizes[fold] -= 1;
                    }
                }
            }
        }

        let memberships = Rc::new(RefCell::new(FoldMemberships { inner, outer }));
        solver.add_swap_listener(Box::new(FoldSwapListener {
            memberships: Rc::clone(&memberships),
        }));

        CrossValidationSolver {
            solver,
            memberships,
            inner_fold_sizes,
            outer_fold_sizes,
            inner_folds,
            outer_folds,
            outer_fold: 0,
            outer_problem_size: size,
        }
    }

    fn membership_at(&self, inner: bool, i: usize) -> usize {
        let m = self.memberships.borrow();
        if inner {
            m.inner[i]
        } else {
            m.outer[i]
        }
    }

    /// Moves every member of `fold` behind the first `num` positions.
    fn sort_vectors(&mut self, inner: bool, fold: usize, num: usize) {
        let mut train = 0;
        let mut test = num;
        loop {
            while train < num && self.membership_at(inner, train) != fold {
                train += 1;
            }
            while test > 0 && self.membership_at(inner, test - 1) == fold {
                test -= 1;
            }
            if train + 1 < test {
                self.solver.swap_samples(train, test - 1);
                train += 1;
                test -= 1;
            } else {
                break;
            }
        }
    }

    fn reset_inner_fold(&mut self, fold: usize) {
        let active = self.outer_fold_sizes[self.outer_fold];
        self.sort_vectors(true, fold, active);
        self.solver.reset();
        self.solver.set_current_size(self.inner_fold_sizes[fold]);
    }

    /// Selects the active outer fold: its members move to the back of the
    /// array and the inner fold sizes are recomputed over what remains.
    pub fn reset_outer_fold(&mut self, fold: usize) {
        self.outer_fold = fold;
        self.sort_vectors(false, fold, self.solver.size());

        let active = self.outer_fold_sizes[fold];
        for size in self.inner_fold_sizes.iter_mut() {
            *size = active;
        }
        for i in 0..active {
            let inner_fold = self.membership_at(true, i);
            self.inner_fold_sizes[inner_fold] -= 1;
        }

        self.outer_problem_size = active;
        self.solver.reset();
    }

    /// Mean accuracy over the inner folds of the active outer problem.
    pub fn do_cross_validation(&mut self) -> TestingResult {
        let mut result = TestingResult::default();
        for fold in 0..self.inner_folds {
            self.reset_inner_fold(fold);
            self.solver.train();

            let fold_result = self.test(
                self.inner_fold_sizes[fold],
                self.outer_fold_sizes[self.outer_fold],
            );
            debug!(
                outer = self.outer_fold,
                inner = fold,
                sv = self.solver.sv_number(),
                accuracy = fold_result.accuracy,
                "inner fold done"
            );
            result.accuracy += fold_result.accuracy / self.inner_folds as f64;
        }
        result
    }

    /// Trains on the whole active outer problem.
    pub fn train_outer(&mut self) {
        self.solver.reset();
        self.solver
            .set_current_size(self.outer_fold_sizes[self.outer_fold]);
        self.solver.train();
    }

    /// Accuracy on the held-out members of the active outer fold.
    pub fn test_outer(&mut self) -> TestingResult {
        self.test(self.outer_fold_sizes[self.outer_fold], self.solver.size())
    }

    /// Classifies positions `[from, to)` against their known labels.
    pub fn test(&mut self, from: usize, to: usize) -> TestingResult {
        if to <= from {
            return TestingResult::default();
        }
        let truth: Vec<usize> = (from..to).map(|i| self.solver.label(i)).collect();
        let mut classifier = self.solver.classifier();
        let mut correct = 0;
        for (expected, sample) in truth.iter().zip(from..to) {
            if classifier.classify(sample) == *expected {
                correct += 1;
            }
        }
        TestingResult {
            accuracy: correct as f64 / (to - from) as f64,
        }
    }

    pub fn set_kernel_params(&mut self, c: f64, params: GaussParams) {
        self.solver.set_kernel_params(c, params);
    }

    pub fn inner_folds(&self) -> usize {
        self.inner_folds
    }

    pub fn outer_folds(&self) -> usize {
        self.outer_folds
    }

    pub fn outer_fold(&self) -> usize {
        self.outer_fold
    }

    pub fn outer_problem_size(&self) -> usize {
        self.outer_problem_size
    }

    pub fn solver(&self) -> &PairwiseSolver {
        &self.solver
    }
}
