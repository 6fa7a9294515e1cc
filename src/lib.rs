//! An online kernel SVM trainer built around the worst-violator update
//! rule.
//!
//! Given a labeled sparse data set and a Gaussian kernel, the trainer
//! produces one binary decision function per pair of class labels and
//! votes them together at prediction time. A single shared sample array
//! backs everything: binary subproblems, cross-validation folds and the
//! merged support-vector prefix all carve it up by swapping samples in
//! place.
//!
//! # Training a model
//!
//! ```ignore
//! let mut dataset = Dataset::load(Path::new("iris.scale"))?;
//! dataset.normalize();
//!
//! let (matrix, labels, names) = dataset.into_parts();
//! let mut solver = PairwiseSolver::new(names, matrix, labels, TrainParams::default())?;
//! solver.set_kernel_params(1.0, GaussParams::new(0.5));
//! solver.train();
//!
//! let mut classifier = solver.classifier();
//! let label = classifier.classify(0);
//! ```
//!
//! The [`ApplicationLauncher`] drives the full pipeline instead — nested
//! cross-validation with pattern search over `(C, γ)` — from a
//! [`Configuration`].

pub mod config;
pub mod dataset;
pub mod errors;
pub mod launcher;
pub mod matrix;
pub mod model;
pub mod parser;
pub mod svm;

pub use crate::config::{BiasPolicy, Configuration, TrainParams};
pub use crate::dataset::Dataset;
pub use crate::errors::SvmError;
pub use crate::launcher::{ApplicationLauncher, RunReport};
pub use crate::matrix::{MatrixEvaluator, SparseMatrix};
pub use crate::model::{ModelDocument, ModelEntry};
pub use crate::svm::cache::{CachedKernelEvaluator, SwapListener, WorstViolator};
pub use crate::svm::kernel::{GaussParams, RbfKernelEvaluator};
pub use crate::svm::pairwise::{PairwiseModel, PairwiseResult, PairwiseSolver};
pub use crate::svm::predict::PairwiseClassifier;
pub use crate::svm::selection::{
    GridSelector, ModelSelectionResults, ModelSelector, Pattern, PatternSelector, SearchRange,
};
pub use crate::svm::validation::{CrossValidationSolver, FoldPolicy, TestingResult};
