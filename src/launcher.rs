//! Ties configuration, data and solvers into one run.

use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use crate::config::Configuration;
use crate::dataset::Dataset;
use crate::errors::SvmError;
use crate::model::ModelDocument;
use crate::svm::kernel::GaussParams;
use crate::svm::pairwise::PairwiseSolver;
use crate::svm::selection::{ModelSelector, PatternSelector};
use crate::svm::validation::CrossValidationSolver;

/// Summary of one run.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    pub accuracy: f64,
    pub c: f64,
    pub gamma: f64,
    pub sv_count: usize,
}

/// Loads the data set and runs the mode the fold and resolution options
/// imply: nested cross-validation, model selection, plain cross-validation
/// or a single training pass.
pub struct ApplicationLauncher {
    conf: Configuration,
}

impl ApplicationLauncher {
    pub fn new(conf: Configuration) -> Result<ApplicationLauncher, SvmError> {
        conf.validate()?;
        Ok(ApplicationLauncher { conf })
    }

    pub fn run(&self) -> Result<(RunReport, ModelDocument), SvmError> {
        let conf = &self.conf;

        let mut dataset = Dataset::load(&conf.input)?;
        dataset.normalize();
        let mut rng = StdRng::seed_from_u64(conf.seed);
        if conf.shuffle {
            dataset.shuffle(&mut rng);
        }

        let (matrix, labels, label_names) = dataset.into_parts();
        let solver = PairwiseSolver::new(label_names, matrix, labels, conf.train)?;
        let mut cross_validation = CrossValidationSolver::new(
            solver,
            conf.inner_folds,
            conf.outer_folds,
            conf.fold_policy,
            &mut rng,
        );

        let range = &conf.search;
        let searching = range.c_resolution > 1 || range.gamma_resolution > 1;

        let (accuracy, c, gamma) = if conf.outer_folds > 1 {
            let mut selector = PatternSelector::cross();
            let result = selector.nested_cross_validation(&mut cross_validation, range);
            (result.accuracy, range.c_low, range.gamma_low)
        } else if conf.inner_folds > 1 && searching {
            let mut selector = PatternSelector::cross();
            let params = selector.select_parameters(&mut cross_validation, range);
            cross_validation.set_kernel_params(params.c, GaussParams::new(params.gamma));
            cross_validation.train_outer();
            (params.best.accuracy, params.c, params.gamma)
        } else if conf.inner_folds > 1 {
            cross_validation.set_kernel_params(range.c_low, GaussParams::new(range.gamma_low));
            let result = cross_validation.do_cross_validation();
            cross_validation.train_outer();
            (result.accuracy, range.c_low, range.gamma_low)
        } else {
            cross_validation.set_kernel_params(range.c_low, GaussParams::new(range.gamma_low));
            cross_validation.train_outer();
            let size = cross_validation.solver().size();
            let result = cross_validation.test(0, size);
            (result.accuracy, range.c_low, range.gamma_low)
        };

        let solver = cross_validation.solver();
        let report = RunReport {
            accuracy,
            c,
            gamma,
            sv_count: solver.sv_number(),
        };
        let document = ModelDocument::from_result(solver.result(), solver.label_names());

        info!(
            accuracy = report.accuracy,
            c = report.c,
            gamma = report.gamma,
            sv = report.sv_count,
            "run finished"
        );
        Ok((report, document))
    }
}
