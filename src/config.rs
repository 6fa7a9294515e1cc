//! Run configuration and its pre-flight validation.
//!
//! Every misconfiguration is rejected here, before any training starts;
//! the numeric paths below never produce errors.

use std::path::PathBuf;

use crate::errors::SvmError;
use crate::svm::selection::SearchRange;
use crate::svm::validation::FoldPolicy;

/// Whether the decision functions learn a bias term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BiasPolicy {
    Yes,
    No,
}

impl BiasPolicy {
    /// The multiplier applied to every bias gradient.
    pub fn weight(&self) -> f64 {
        match self {
            BiasPolicy::Yes => 1.0,
            BiasPolicy::No => 0.0,
        }
    }
}

/// Hyperparameters of one binary training.
#[derive(Clone, Copy, Debug)]
pub struct TrainParams {
    pub bias: BiasPolicy,
    /// SGD iteration budget as a fraction of the problem size.
    pub epochs: f64,
    /// Early-exit threshold in units of `C`.
    pub margin: f64,
    /// Kernel cache budget in bytes.
    pub cache_bytes: usize,
}

impl Default for TrainParams {
    fn default() -> TrainParams {
        TrainParams {
            bias: BiasPolicy::Yes,
            epochs: 0.5,
            margin: 0.1,
            cache_bytes: 200 << 20,
        }
    }
}

/// Everything one run needs: data location, search bounds, training and
/// validation parameters.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub input: PathBuf,
    pub search: SearchRange,
    pub train: TrainParams,
    pub inner_folds: usize,
    pub outer_folds: usize,
    pub fold_policy: FoldPolicy,
    pub seed: u64,
    pub shuffle: bool,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            input: PathBuf::new(),
            search: SearchRange {
                c_low: 0.001,
                c_high: 10000.0,
                c_resolution: 8,
                gamma_low: 0.0009765625,
                gamma_high: 16.0,
                gamma_resolution: 8,
            },
            train: TrainParams::default(),
            inner_folds: 10,
            outer_folds: 1,
            fold_policy: FoldPolicy::Fair,
            seed: 0,
            shuffle: true,
        }
    }
}

impl Configuration {
    /// Checks option consistency; called once before a run.
    pub fn validate(&self) -> Result<(), SvmError> {
        fn invalid(message: impl Into<String>) -> SvmError {
            SvmError::InvalidConfiguration(message.into())
        }

        if self.input.as_os_str().is_empty() {
            return Err(invalid("input file not specified"));
        }
        if self.search.c_resolution < 1 || self.search.gamma_resolution < 1 {
            return Err(invalid("resolution must be at least 1"));
        }
        if self.search.c_resolution > 1 && self.search.c_low >= self.search.c_high {
            return Err(invalid(format!(
                "C range [{}, {}] is empty at resolution {}",
                self.search.c_low, self.search.c_high, self.search.c_resolution
            )));
        }
        if self.search.gamma_resolution > 1 && self.search.gamma_low >= self.search.gamma_high {
            return Err(invalid(format!(
                "gamma range [{}, {}] is empty at resolution {}",
                self.search.gamma_low, self.search.gamma_high, self.search.gamma_resolution
            )));
        }
        if self.search.c_low <= 0.0 || self.search.gamma_low <= 0.0 {
            return Err(invalid("C and gamma bounds must be positive"));
        }
        if self.inner_folds < 1 || self.outer_folds < 1 {
            return Err(invalid("fold counts must be at least 1"));
        }
        if self.outer_folds > 1 && self.inner_folds < 2 {
            return Err(invalid(
                "nested cross-validation needs at least 2 inner folds",
            ));
        }
        if !(self.train.epochs > 0.0) {
            return Err(invalid("epochs must be positive"));
        }
        if !(self.train.margin > 0.0) {
            return Err(invalid("margin must be positive"));
        }
        if self.train.cache_bytes == 0 {
            return Err(invalid("cache size must be positive"));
        }
        Ok(())
    }
}
