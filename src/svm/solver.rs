//! The OLLAWV training loop.

use tracing::debug;

use crate::svm::cache::{CachedKernelEvaluator, WorstViolator};

/// Runs one binary training against the prepared cache state and returns
/// the number of SGD iterations performed.
///
/// Each round updates the current worst violator with the learning rate
/// `2/√t`, refreshes the decision outputs over the candidate segment, then
/// searches for the next violator and promotes it into the support-vector
/// prefix. The loop stops when the iteration budget `⌈epochs·n⌉` runs out
/// or the worst margin score clears `margin·C`.
pub fn train_binary(cache: &mut CachedKernelEvaluator) -> usize {
    let c = cache.c();
    let use_bias = cache.use_bias();
    let margin = cache.margin() * c;
    let current_size = cache.current_size();
    let iteration_budget = (cache.epochs() * current_size as f64).ceil() as usize;

    // seeded so the first round fires on the seed support vector
    let mut worst = WorstViolator {
        index: 0,
        error: 0.0,
    };
    let mut iteration = 0;

    while iteration < iteration_budget && worst.error < margin {
        iteration += 1;
        let rate = 2.0 / (iteration as f64).sqrt();

        let gradient = rate * c * cache.binary_label(worst.index);
        let bias_gradient = (gradient * use_bias) / current_size as f64;

        cache.sgd_step(worst.index, gradient, bias_gradient);
        worst = cache.find_worst_violator();
        worst.index = cache.promote_sv(worst.index);
    }

    debug!(
        iterations = iteration,
        sv = cache.sv_count(),
        size = current_size,
        "binary training finished"
    );
    iteration
}
