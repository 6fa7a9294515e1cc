//! In-memory data set and the preprocessing the trainer expects.

use std::path::Path;

use rand::{rngs::StdRng, Rng};
use tracing::info;

use crate::errors::SvmError;
use crate::matrix::SparseMatrix;
use crate::parser::{parse_records, DataRecord};

/// Labeled sparse samples plus the label-name table.
///
/// Labels are mapped to contiguous ids in order of first appearance.
pub struct Dataset {
    samples: Vec<Vec<(u32, f64)>>,
    labels: Vec<usize>,
    label_names: Vec<String>,
    dimension: usize,
}

impl Dataset {
    /// Reads and parses a data set file.
    pub fn load(path: &Path) -> Result<Dataset, SvmError> {
        let input = std::fs::read_to_string(path).map_err(|source| SvmError::InputMissing {
            path: path.to_owned(),
            source,
        })?;
        Dataset::parse(&input)
    }

    /// Builds a data set from LIBSVM-format text.
    pub fn parse(input: &str) -> Result<Dataset, SvmError> {
        Ok(Dataset::from_records(parse_records(input)?))
    }

    pub fn from_records(records: Vec<DataRecord>) -> Dataset {
        let mut label_names: Vec<String> = Vec::new();
        let mut labels = Vec::with_capacity(records.len());
        let mut samples = Vec::with_capacity(records.len());
        let mut dimension = 0;

        for record in records {
            let label = match label_names.iter().position(|n| *n == record.label) {
                Some(id) => id,
                None => {
                    label_names.push(record.label);
                    label_names.len() - 1
                }
            };
            labels.push(label);
            for &(feature, _) in &record.features {
                dimension = dimension.max(feature as usize + 1);
            }
            samples.push(record.features);
        }

        Dataset {
            samples,
            labels,
            label_names,
            dimension,
        }
    }

    /// Drops constant features, remaps the survivors to a dense id space
    /// and scales every feature by its maximum absolute value, so all
    /// values land in `[−1, 1]`.
    pub fn normalize(&mut self) {
        let mut max = vec![0.0f64; self.dimension];
        let mut min = vec![0.0f64; self.dimension];
        for row in &self.samples {
            for &(feature, value) in row {
                let f = feature as usize;
                max[f] = max[f].max(value);
                min[f] = min[f].min(value);
            }
        }

        let mut mapping = vec![None; self.dimension];
        let mut scale = Vec::new();
        for f in 0..self.dimension {
            if max[f] != min[f] {
                mapping[f] = Some(scale.len() as u32);
                scale.push(max[f].abs().max(min[f].abs()));
            }
        }

        let mut kept = 0usize;
        for row in self.samples.iter_mut() {
            row.retain_mut(|entry| match mapping[entry.0 as usize] {
                Some(id) => {
                    entry.1 /= scale[id as usize];
                    entry.0 = id;
                    true
                }
                None => false,
            });
            kept += row.len();
        }
        self.dimension = scale.len();

        let density = if self.samples.is_empty() || self.dimension == 0 {
            0.0
        } else {
            100.0 * kept as f64 / (self.samples.len() * self.dimension) as f64
        };
        info!(
            samples = self.samples.len(),
            features = self.dimension,
            density,
            "data set normalized"
        );
    }

    /// Random row exchanges, matching the trainer's swap discipline.
    pub fn shuffle(&mut self, rng: &mut StdRng) {
        let n = self.samples.len();
        for row in 0..n {
            let other = rng.gen_range(0..n);
            self.samples.swap(row, other);
            self.labels.swap(row, other);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.label_names.len()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Consumes the data set into matrix, labels and label names.
    pub fn into_parts(self) -> (SparseMatrix, Vec<usize>, Vec<String>) {
        let matrix = SparseMatrix::from_rows(&self.samples, self.dimension);
        (matrix, self.labels, self.label_names)
    }
}
