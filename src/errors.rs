use std::path::PathBuf;

/// Possible errors raised while loading data, validating options or
/// assembling a trainer.
///
/// Training itself never fails: once a [`crate::PairwiseSolver`] has been
/// built every numeric path is total (kernel overflow is clamped to `0.0`).
#[derive(Debug, thiserror::Error)]
pub enum SvmError {
    /// An option value or a combination of option values is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The input data set could not be opened.
    #[error("cannot open input file '{}': {source}", path.display())]
    InputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data set line could not be parsed as `label index:value ...`.
    #[error("malformed record on line {line}")]
    MalformedRecord { line: usize },

    /// Feature indices within a record must be strictly increasing.
    #[error("feature index {index} on line {line} is out of order")]
    UnorderedFeature { line: usize, index: u32 },

    /// Training requires at least two samples carrying at least two
    /// distinct labels.
    #[error("degenerate problem: {samples} sample(s), {labels} label(s)")]
    DegenerateProblem { samples: usize, labels: usize },
}
