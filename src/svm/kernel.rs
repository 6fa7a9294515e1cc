//! Gaussian RBF kernel evaluation over the shared sample array.

use crate::matrix::MatrixEvaluator;

/// Gaussian kernel parameters, stored as `−γ` so that evaluation is a
/// single multiply and `exp`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussParams {
    negative_gamma: f64,
}

impl GaussParams {
    pub fn new(gamma: f64) -> GaussParams {
        GaussParams {
            negative_gamma: -gamma,
        }
    }

    pub fn gamma(&self) -> f64 {
        -self.negative_gamma
    }

    /// `exp(−γ·d²)`. A non-finite result (an `exp` overflow on a degenerate
    /// distance) is treated as the kernel of an infinitely far point.
    pub fn eval(&self, dist2: f64) -> f64 {
        let k = (self.negative_gamma * dist2).exp();
        if k.is_finite() {
            k
        } else {
            0.0
        }
    }
}

/// Evaluates RBF kernel rows for the current binary subproblem.
///
/// Owns the distance evaluator and the multi-class label array, plus the
/// scalars of one binary training: the pivot label (which side of the pair
/// maps to −1), the penalty `C`, the bias and the loop hyperparameters.
/// Keeping the pivot here makes every two-class label lookup branch-free
/// for callers.
pub struct RbfKernelEvaluator {
    eval: MatrixEvaluator,
    labels: Vec<usize>,
    c: f64,
    pivot: usize,
    use_bias: f64,
    bias: f64,
    params: GaussParams,
    epochs: f64,
    margin: f64,
}

impl RbfKernelEvaluator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eval: MatrixEvaluator,
        labels: Vec<usize>,
        use_bias: f64,
        c: f64,
        params: GaussParams,
        epochs: f64,
        margin: f64,
    ) -> RbfKernelEvaluator {
        RbfKernelEvaluator {
            eval,
            labels,
            c,
            pivot: 0,
            use_bias,
            bias: 0.0,
            params,
            epochs,
            margin,
        }
    }

    /// Fills `out[r] = exp(−γ·dist(id, r))` for `r` in `[from, to)`.
    pub fn eval_kernel(&mut self, id: usize, from: usize, to: usize, out: &mut [f64]) {
        self.eval.dist_range(id, from, to, out);
        for r in from..to {
            out[r] = self.params.eval(out[r]);
        }
    }

    /// Single kernel value, computed on the fly.
    pub fn kernel(&self, u: usize, v: usize) -> f64 {
        self.params.eval(self.eval.dist(u, v))
    }

    /// Multi-class label id of the sample at position `v`.
    pub fn label(&self, v: usize) -> usize {
        self.labels[v]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Binary label of the sample at position `v`: −1 for the pivot class,
    /// +1 for the other side of the pair.
    pub fn binary_label(&self, v: usize) -> f64 {
        if self.labels[v] == self.pivot {
            -1.0
        } else {
            1.0
        }
    }

    /// Selects which label of the current training pair maps to −1.
    pub fn set_pivot(&mut self, label: usize) {
        self.pivot = label;
    }

    pub fn set_params(&mut self, c: f64, params: GaussParams) {
        self.c = c;
        self.params = params;
    }

    pub fn params(&self) -> GaussParams {
        self.params
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn use_bias(&self) -> f64 {
        self.use_bias
    }

    pub fn epochs(&self) -> f64 {
        self.epochs
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn update_bias(&mut self, gradient: f64) {
        self.bias += gradient;
    }

    pub fn reset_bias(&mut self) {
        self.bias = 0.0;
    }

    /// Exchanges two samples: labels swap here, offsets and norms below.
    pub fn swap_samples(&mut self, u: usize, v: usize) {
        self.labels.swap(u, v);
        self.eval.swap_samples(u, v);
    }

    pub fn evaluator(&self) -> &MatrixEvaluator {
        &self.eval
    }

    pub fn size(&self) -> usize {
        self.eval.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    fn rbf(gamma: f64) -> RbfKernelEvaluator {
        let rows = vec![
            vec![(0, 0.0)],
            vec![(0, 1.0)],
            vec![(0, 3.0)],
            vec![(0, 6.0)],
        ];
        let eval = MatrixEvaluator::new(SparseMatrix::from_rows(&rows, 1));
        RbfKernelEvaluator::new(eval, vec![0, 0, 1, 1], 1.0, 1.0, GaussParams::new(gamma), 0.5, 0.1)
    }

    #[test]
    fn kernel_row_matches_closed_form() {
        let mut rbf = rbf(0.5);
        let mut out = vec![0.0; 4];
        rbf.eval_kernel(1, 0, 4, &mut out);
        for (v, k) in out.iter().enumerate() {
            let d = (v as f64 - 1.0).abs();
            let expected = (-0.5 * d * d).exp();
            assert!((k - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn self_kernel_is_one() {
        let rbf = rbf(2.0);
        assert!((rbf.kernel(2, 2) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn non_finite_kernel_clamps_to_zero() {
        let params = GaussParams::new(-1.0);
        assert_eq!(params.eval(f64::INFINITY), 0.0);
    }

    #[test]
    fn binary_label_follows_pivot() {
        let mut rbf = rbf(1.0);
        rbf.set_pivot(1);
        assert_eq!(rbf.binary_label(0), 1.0);
        assert_eq!(rbf.binary_label(2), -1.0);
        rbf.set_pivot(0);
        assert_eq!(rbf.binary_label(0), -1.0);
        assert_eq!(rbf.binary_label(2), 1.0);
    }

    #[test]
    fn swap_exchanges_labels_and_geometry() {
        let mut rbf = rbf(1.0);
        let k03 = rbf.kernel(0, 3);
        rbf.swap_samples(0, 2);
        assert_eq!(rbf.label(0), 1);
        assert_eq!(rbf.label(2), 0);
        assert!((rbf.kernel(2, 3) - k03).abs() < 1e-15);
    }
}
