//! Deterministic synthetic data sets for the end-to-end scenarios.

use ollawv::SparseMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Interleaved point clouds, one per class, drawn uniformly around the
/// given centers. Returns the matrix, labels and label names.
pub fn clustered_data(
    seed: u64,
    per_class: usize,
    centers: &[&[f64]],
    radius: f64,
) -> (SparseMatrix, Vec<usize>, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let dimension = centers[0].len();

    let mut rows = Vec::with_capacity(per_class * centers.len());
    let mut labels = Vec::with_capacity(per_class * centers.len());
    for _ in 0..per_class {
        for (class, center) in centers.iter().enumerate() {
            let row: Vec<(u32, f64)> = center
                .iter()
                .enumerate()
                .map(|(feature, &value)| {
                    (feature as u32, value + rng.gen_range(-radius..radius))
                })
                .collect();
            rows.push(row);
            labels.push(class);
        }
    }

    let names = (0..centers.len()).map(|class| format!("c{class}")).collect();
    (SparseMatrix::from_rows(&rows, dimension), labels, names)
}

/// Random permutation of a label vector.
pub fn shuffled_labels(seed: u64, labels: &[usize]) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled = labels.to_vec();
    for i in 0..shuffled.len() {
        let other = rng.gen_range(0..shuffled.len());
        shuffled.swap(i, other);
    }
    shuffled
}
