//! Serializable form of a trained pairwise model.

use serde::{Deserialize, Serialize};

use crate::svm::pairwise::PairwiseResult;

/// On-disk layout of one trained run.
///
/// `alphas` and `samples` are stored aligned with length `max_sv_count`;
/// `size` is authoritative for how many slots actually carry weight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDocument {
    pub label_names: Vec<String>,
    pub max_sv_count: usize,
    pub models: Vec<ModelEntry>,
}

/// One binary decision function of the document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelEntry {
    pub labels: [usize; 2],
    pub bias: f64,
    pub size: usize,
    pub alphas: Vec<f64>,
    pub samples: Vec<usize>,
}

impl ModelDocument {
    pub fn from_result(result: &PairwiseResult, label_names: &[String]) -> ModelDocument {
        let max_sv_count = result.max_sv_count;
        let models = result
            .models
            .iter()
            .map(|model| {
                let mut alphas = model.yalphas.clone();
                alphas.resize(max_sv_count, 0.0);
                let mut samples = model.samples.clone();
                samples.resize(max_sv_count, 0);
                ModelEntry {
                    labels: [model.labels.0, model.labels.1],
                    bias: model.bias,
                    size: model.size,
                    alphas,
                    samples,
                }
            })
            .collect();

        ModelDocument {
            label_names: label_names.to_vec(),
            max_sv_count,
            models,
        }
    }
}
