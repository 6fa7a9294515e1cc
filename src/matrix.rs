//! Sparse sample storage and squared-distance evaluation.
//!
//! Samples are stored row-major as `(feature, value)` runs terminated by a
//! sentinel feature id. Row offsets live in a separate array so that
//! exchanging two samples is O(1): the offsets swap, the row contents never
//! move. Everything that indexes samples by position (labels, squared
//! norms) is kept in lock-step by [`MatrixEvaluator::swap_samples`].

/// Sentinel feature id terminating every row.
pub const INVALID_FEATURE: u32 = u32::MAX;

/// Sparse row-major matrix of training samples.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    values: Vec<f64>,
    features: Vec<u32>,
    offsets: Vec<usize>,
    height: usize,
    width: usize,
}

impl SparseMatrix {
    /// Builds a matrix from one `(feature, value)` list per sample.
    ///
    /// Feature ids must already be dense and strictly increasing within a
    /// row; `width` is the number of feature columns.
    pub fn from_rows(rows: &[Vec<(u32, f64)>], width: usize) -> SparseMatrix {
        let total: usize = rows.iter().map(Vec::len).sum();

        let mut values = Vec::with_capacity(total + rows.len());
        let mut features = Vec::with_capacity(total + rows.len());
        let mut offsets = Vec::with_capacity(rows.len());

        for row in rows {
            offsets.push(values.len());
            for &(feature, value) in row {
                features.push(feature);
                values.push(value);
            }
            features.push(INVALID_FEATURE);
            values.push(0.0);
        }

        SparseMatrix {
            values,
            features,
            offsets,
            height: rows.len(),
            width,
        }
    }

    /// Number of samples.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The `(feature, value)` run of one sample, sentinel excluded.
    pub fn row(&self, sample: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let offset = self.offsets[sample];
        self.features[offset..]
            .iter()
            .zip(&self.values[offset..])
            .take_while(|(&f, _)| f != INVALID_FEATURE)
            .map(|(&f, &v)| (f, v))
    }

    fn swap_rows(&mut self, u: usize, v: usize) {
        self.offsets.swap(u, v);
    }
}

/// Distance evaluator over a [`SparseMatrix`].
///
/// Precomputes per-sample squared norms so that
/// `‖u−v‖² = ‖u‖² + ‖v‖² − 2⟨u,v⟩` turns every distance into a sparse dot
/// product. A dense scratch row of `width` zeros backs the range variant.
pub struct MatrixEvaluator {
    matrix: SparseMatrix,
    x2: Vec<f64>,
    workspace: Vec<f64>,
}

impl MatrixEvaluator {
    pub fn new(matrix: SparseMatrix) -> MatrixEvaluator {
        let workspace = vec![0.0; matrix.width()];
        let mut evaluator = MatrixEvaluator {
            x2: Vec::new(),
            matrix,
            workspace,
        };
        evaluator.x2 = (0..evaluator.matrix.height())
            .map(|id| evaluator.squared_norm(id))
            .collect();
        evaluator
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    pub fn size(&self) -> usize {
        self.matrix.height()
    }

    fn squared_norm(&self, u: usize) -> f64 {
        self.matrix.row(u).map(|(_, value)| value * value).sum()
    }

    /// Sparse dot product via a two-pointer merge on feature ids.
    pub fn dot(&self, u: usize, v: usize) -> f64 {
        let m = &self.matrix;
        let mut ui = m.offsets[u];
        let mut vi = m.offsets[v];

        let mut sum = 0.0;
        loop {
            let fu = m.features[ui];
            let fv = m.features[vi];
            if fu == INVALID_FEATURE || fv == INVALID_FEATURE {
                break;
            }
            if fu == fv {
                sum += m.values[ui] * m.values[vi];
                ui += 1;
                vi += 1;
            } else if fu < fv {
                ui += 1;
            } else {
                vi += 1;
            }
        }
        sum
    }

    /// Squared euclidean distance between two samples.
    pub fn dist(&self, u: usize, v: usize) -> f64 {
        self.x2[u] + self.x2[v] - 2.0 * self.dot(u, v)
    }

    /// Fills `out[r] = dist(v, r)` for every `r` in `[from, to)`.
    ///
    /// Sample `v` is scattered into the dense workspace once, so each row in
    /// the range costs only its own non-zeros.
    pub fn dist_range(&mut self, v: usize, from: usize, to: usize, out: &mut [f64]) {
        let offset = self.matrix.offsets[v];
        let mut i = offset;
        while self.matrix.features[i] != INVALID_FEATURE {
            self.workspace[self.matrix.features[i] as usize] = self.matrix.values[i];
            i += 1;
        }

        let v2 = self.x2[v];
        for r in from..to {
            let mut j = self.matrix.offsets[r];
            let mut sum = 0.0;
            while self.matrix.features[j] != INVALID_FEATURE {
                sum += self.matrix.values[j] * self.workspace[self.matrix.features[j] as usize];
                j += 1;
            }
            out[r] = self.x2[r] + v2 - 2.0 * sum;
        }

        // clear the workspace for the next caller
        let mut i = offset;
        while self.matrix.features[i] != INVALID_FEATURE {
            self.workspace[self.matrix.features[i] as usize] = 0.0;
            i += 1;
        }
    }

    /// O(1) sample exchange: row offsets and squared norms swap together.
    pub fn swap_samples(&mut self, u: usize, v: usize) {
        self.matrix.swap_rows(u, v);
        self.x2.swap(u, v);
    }
}
