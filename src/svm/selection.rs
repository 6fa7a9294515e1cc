//! Model selection over the `(C, γ)` plane.
//!
//! Both selectors walk a log-spaced grid. [`GridSelector`] evaluates every
//! cell; [`PatternSelector`] probes a cross-shaped neighborhood, recenters
//! on improvement, halves its scale otherwise, and restarts from the
//! coordinate farthest from everything already evaluated until the grid
//! offers no sufficiently distant start anymore.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::svm::kernel::GaussParams;
use crate::svm::validation::{CrossValidationSolver, TestingResult};

/// Log-spaced search bounds for the penalty and the kernel width.
#[derive(Clone, Debug)]
pub struct SearchRange {
    pub c_low: f64,
    pub c_high: f64,
    pub c_resolution: usize,
    pub gamma_low: f64,
    pub gamma_high: f64,
    pub gamma_resolution: usize,
}

/// Outcome of one parameter search.
#[derive(Clone, Copy, Debug)]
pub struct ModelSelectionResults {
    pub c: f64,
    pub gamma: f64,
    pub best: TestingResult,
    /// Distinct `(C, γ)` points actually cross-validated.
    pub evaluations: usize,
}

fn log_step(from: f64, to: f64, steps: usize) -> f64 {
    if to > from && steps > 1 {
        ((to / from).ln() / (steps - 1) as f64).exp()
    } else {
        1.0
    }
}

fn validate(
    solver: &mut CrossValidationSolver,
    c: f64,
    gamma: f64,
) -> TestingResult {
    solver.set_kernel_params(c, GaussParams::new(gamma));
    let result = solver.do_cross_validation();
    debug!(c, gamma, accuracy = result.accuracy, "validated");
    result
}

/// A `(C, γ)` optimizer over a cross-validation solver.
pub trait ModelSelector {
    fn select_parameters(
        &mut self,
        solver: &mut CrossValidationSolver,
        range: &SearchRange,
    ) -> ModelSelectionResults;

    /// Outer folds estimate generalization; inner folds pick parameters.
    /// Each outer round selects on the outer-train split, retrains on all
    /// of it and tests on the held-out fold.
    fn nested_cross_validation(
        &mut self,
        solver: &mut CrossValidationSolver,
        range: &SearchRange,
    ) -> TestingResult {
        let mut result = TestingResult::default();
        solver.set_kernel_params(range.c_low, GaussParams::new(range.gamma_low));

        for fold in 0..solver.outer_folds() {
            solver.reset_outer_fold(fold);

            let params = self.select_parameters(solver, range);
            info!(
                fold,
                c = params.c,
                gamma = params.gamma,
                accuracy = params.best.accuracy,
                evaluations = params.evaluations,
                "outer fold selection"
            );

            solver.set_kernel_params(params.c, GaussParams::new(params.gamma));
            solver.train_outer();
            let current = solver.test_outer();
            info!(fold, accuracy = current.accuracy, "outer fold testing");

            result.accuracy += current.accuracy / solver.outer_folds() as f64;
        }
        result
    }
}

/// Exhaustive sweep of the grid.
#[derive(Debug, Default)]
pub struct GridSelector;

impl ModelSelector for GridSelector {
    fn select_parameters(
        &mut self,
        solver: &mut CrossValidationSolver,
        range: &SearchRange,
    ) -> ModelSelectionResults {
        let c_ratio = log_step(range.c_low, range.c_high, range.c_resolution);
        let gamma_ratio = log_step(range.gamma_low, range.gamma_high, range.gamma_resolution);

        let mut results = ModelSelectionResults {
            c: range.c_low,
            gamma: range.gamma_low,
            best: TestingResult::default(),
            evaluations: 0,
        };

        for c_iter in 0..range.c_resolution {
            let c = range.c_low * c_ratio.powi(c_iter as i32);
            for gamma_iter in 0..range.gamma_resolution {
                let gamma = range.gamma_low * gamma_ratio.powi(gamma_iter as i32);

                let result = validate(solver, c, gamma);
                results.evaluations += 1;

                if result.accuracy > results.best.accuracy {
                    results.best = result;
                    results.c = c;
                    results.gamma = gamma;
                }
            }
        }
        results
    }
}

/// The probing shape of a pattern search: coordinate shifts in grid steps.
#[derive(Clone, Debug)]
pub struct Pattern {
    coords: Vec<(i64, i64)>,
    spread: usize,
}

impl Pattern {
    /// The five-point cross `{(0,0), (±1,0), (0,±1)}`.
    pub fn cross() -> Pattern {
        Pattern {
            coords: vec![(0, 0), (-1, 0), (0, -1), (1, 0), (0, 1)],
            spread: 2,
        }
    }
}

/// Coarse-to-fine pattern search with a farthest-point restart rule.
pub struct PatternSelector {
    pattern: Pattern,
    results: BTreeMap<(usize, usize), f64>,
}

impl PatternSelector {
    pub fn new(pattern: Pattern) -> PatternSelector {
        PatternSelector {
            pattern,
            results: BTreeMap::new(),
        }
    }

    /// Selector probing the standard cross pattern.
    pub fn cross() -> PatternSelector {
        PatternSelector::new(Pattern::cross())
    }

    fn initial_scale(&self, range: &SearchRange) -> usize {
        let range_spread = range.c_resolution.min(range.gamma_resolution);
        // largest power of two not above (spread − 1) / pattern spread
        let quotient = range_spread.saturating_sub(1) / self.pattern.spread;
        let mut scale = 1;
        while scale * 2 <= quotient {
            scale *= 2;
        }
        scale
    }

    fn min_restart_distance(range: &SearchRange) -> usize {
        let range_spread = range.c_resolution.min(range.gamma_resolution) as f64;
        (range_spread.sqrt() / 2.0).ceil() as usize
    }

    /// L1 distance from a coordinate to the nearest evaluated point.
    fn evaluate_distance(&self, c: usize, gamma: usize, range: &SearchRange) -> usize {
        let mut dist = range.c_resolution + range.gamma_resolution;
        for &(rc, rg) in self.results.keys() {
            let c_diff = c.abs_diff(rc);
            let g_diff = gamma.abs_diff(rg);
            dist = dist.min(c_diff + g_diff);
        }
        dist
    }

    /// Greedy farthest point among grid coordinates, coarsened by the same
    /// scale schedule the search itself uses. `None` once every candidate
    /// is too close to an evaluated point to be worth a restart.
    fn find_starting_point(&self, range: &SearchRange) -> Option<(usize, usize)> {
        let c_center = (range.c_resolution - 1) / 2;
        let gamma_center = (range.gamma_resolution - 1) / 2;

        if self.results.is_empty() {
            return Some((c_center, gamma_center));
        }

        let min_dist = Self::min_restart_distance(range);
        let mut scale = self.initial_scale(range);
        let mut start = None;
        let mut max_dist = 0;

        loop {
            let mut c = c_center % scale;
            while c < range.c_resolution {
                let mut gamma = gamma_center % scale;
                while gamma < range.gamma_resolution {
                    let dist = self.evaluate_distance(c, gamma, range);
                    if dist > max_dist {
                        max_dist = dist;
                        if dist >= min_dist {
                            start = Some((c, gamma));
                        }
                    }
                    gamma += scale;
                }
                c += scale;
            }
            scale /= 2;
            if scale <= min_dist {
                break;
            }
        }
        start
    }
}

impl ModelSelector for PatternSelector {
    fn select_parameters(
        &mut self,
        solver: &mut CrossValidationSolver,
        range: &SearchRange,
    ) -> ModelSelectionResults {
        self.results.clear();

        let c_ratio = log_step(range.c_low, range.c_high, range.c_resolution);
        let gamma_ratio = log_step(range.gamma_low, range.gamma_high, range.gamma_resolution);

        let mut global = ModelSelectionResults {
            c: range.c_low,
            gamma: range.gamma_low,
            best: TestingResult::default(),
            evaluations: 0,
        };

        while let Some((start_c, start_gamma)) = self.find_starting_point(range) {
            let mut c_offset = start_c;
            let mut gamma_offset = start_gamma;
            let mut scale = self.initial_scale(range);

            while scale > 0 {
                let mut best_position = (c_offset, gamma_offset);
                let mut best_accuracy = f64::NEG_INFINITY;

                for &(shift_c, shift_gamma) in &self.pattern.coords {
                    let c = c_offset as i64 + scale as i64 * shift_c;
                    let gamma = gamma_offset as i64 + scale as i64 * shift_gamma;
                    if c < 0
                        || c >= range.c_resolution as i64
                        || gamma < 0
                        || gamma >= range.gamma_resolution as i64
                    {
                        continue;
                    }
                    let coord = (c as usize, gamma as usize);

                    let accuracy = match self.results.get(&coord) {
                        Some(&accuracy) => accuracy,
                        None => {
                            let c_value = range.c_low * c_ratio.powi(coord.0 as i32);
                            let gamma_value =
                                range.gamma_low * gamma_ratio.powi(coord.1 as i32);
                            let result = validate(solver, c_value, gamma_value);
                            self.results.insert(coord, result.accuracy);
                            global.evaluations += 1;
                            result.accuracy
                        }
                    };

                    if accuracy > best_accuracy {
                        best_accuracy = accuracy;
                        best_position = coord;
                    }
                }

                if best_accuracy > global.best.accuracy {
                    global.best.accuracy = best_accuracy;
                    global.c = range.c_low * c_ratio.powi(best_position.0 as i32);
                    global.gamma = range.gamma_low * gamma_ratio.powi(best_position.1 as i32);
                }

                if best_position == (c_offset, gamma_offset) {
                    scale /= 2;
                } else {
                    c_offset = best_position.0;
                    gamma_offset = best_position.1;
                }
            }
        }
        global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(resolution: usize) -> SearchRange {
        SearchRange {
            c_low: 0.001,
            c_high: 10000.0,
            c_resolution: resolution,
            gamma_low: 0.0009765625,
            gamma_high: 16.0,
            gamma_resolution: resolution,
        }
    }

    #[test]
    fn log_step_spans_the_range() {
        let ratio = log_step(0.001, 10000.0, 8);
        let top = 0.001 * ratio.powi(7);
        assert!((top - 10000.0).abs() / 10000.0 < 1e-9);
        assert_eq!(log_step(1.0, 1.0, 8), 1.0);
        assert_eq!(log_step(0.1, 10.0, 1), 1.0);
    }

    #[test]
    fn first_start_is_the_grid_center() {
        let selector = PatternSelector::cross();
        assert_eq!(selector.find_starting_point(&range(8)), Some((3, 3)));
    }

    #[test]
    fn restart_avoids_visited_neighborhoods() {
        let mut selector = PatternSelector::cross();
        // pretend the center region is fully explored
        for c in 2..=4 {
            for g in 2..=4 {
                selector.results.insert((c, g), 0.5);
            }
        }
        let start = selector.find_starting_point(&range(8)).unwrap();
        let min_dist = PatternSelector::min_restart_distance(&range(8));
        assert!(selector.evaluate_distance(start.0, start.1, &range(8)) >= min_dist);
    }

    #[test]
    fn no_start_remains_once_the_grid_is_saturated() {
        let mut selector = PatternSelector::cross();
        for c in 0..4 {
            for g in 0..4 {
                selector.results.insert((c, g), 0.1);
            }
        }
        assert_eq!(selector.find_starting_point(&range(4)), None);
    }

    #[test]
    fn initial_scale_follows_the_resolution() {
        let selector = PatternSelector::cross();
        assert_eq!(selector.initial_scale(&range(8)), 2);
        assert_eq!(selector.initial_scale(&range(4)), 1);
        assert_eq!(selector.initial_scale(&range(16)), 4);
        assert_eq!(selector.initial_scale(&range(2)), 1);
    }

    #[test]
    fn distance_is_l1_to_the_nearest_result() {
        let mut selector = PatternSelector::cross();
        selector.results.insert((3, 3), 0.9);
        selector.results.insert((0, 7), 0.2);
        assert_eq!(selector.evaluate_distance(3, 3, &range(8)), 0);
        assert_eq!(selector.evaluate_distance(5, 4, &range(8)), 3);
        assert_eq!(selector.evaluate_distance(0, 6, &range(8)), 1);
    }
}
