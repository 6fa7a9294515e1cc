//! Multi-class prediction by pairwise voting.

use crate::svm::cache::CachedKernelEvaluator;
use crate::svm::pairwise::PairwiseResult;

/// Votes the stored binary models into a class label.
///
/// Borrows the trainer's kernel state and pairwise result, so it is only
/// valid while the solver that produced it is alive and untrained since.
pub struct PairwiseClassifier<'a> {
    cache: &'a mut CachedKernelEvaluator,
    state: &'a PairwiseResult,
    buffer: Vec<f64>,
    votes: Vec<u32>,
    evidence: Vec<f64>,
}

impl<'a> PairwiseClassifier<'a> {
    pub fn new(
        cache: &'a mut CachedKernelEvaluator,
        state: &'a PairwiseResult,
    ) -> PairwiseClassifier<'a> {
        let buffer = vec![0.0; cache.problem_size()];
        PairwiseClassifier {
            cache,
            state,
            buffer,
            votes: vec![0; state.class_count],
            evidence: vec![0.0; state.class_count],
        }
    }

    /// Classifies the sample at the given position of the shared array.
    ///
    /// The kernel row against the merged support-vector prefix is computed
    /// once and reused across all models. Every model votes for the label
    /// on its winning side; the raw decision value is banked as evidence
    /// for both labels of the pair and only breaks voting ties.
    pub fn classify(&mut self, sample: usize) -> usize {
        self.votes.iter_mut().for_each(|v| *v = 0);
        self.evidence.iter_mut().for_each(|e| *e = 0.0);

        self.cache
            .kernel_row(sample, self.state.max_sv_count, &mut self.buffer);

        for model in &self.state.models {
            let decision = model.decision(&self.buffer);
            let label = if decision > 0.0 {
                model.labels.0
            } else {
                model.labels.1
            };
            self.votes[label] += 1;
            self.evidence[model.labels.0] += decision;
            self.evidence[model.labels.1] += decision;
        }

        let mut best = 0;
        for label in 1..self.state.class_count {
            if self.votes[label] > self.votes[best]
                || (self.votes[label] == self.votes[best]
                    && self.evidence[label] > self.evidence[best])
            {
                best = label;
            }
        }
        best
    }

    /// Per-model decision values for one sample, in model order.
    pub fn decisions(&mut self, sample: usize) -> Vec<f64> {
        self.cache
            .kernel_row(sample, self.state.max_sv_count, &mut self.buffer);
        self.state
            .models
            .iter()
            .map(|model| model.decision(&self.buffer))
            .collect()
    }

    /// Size of the merged support-vector prefix.
    pub fn sv_number(&self) -> usize {
        self.state.max_sv_count
    }
}
