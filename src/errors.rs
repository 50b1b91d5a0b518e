// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("a batch must contain at least one datum")]
    EmptyBatch,
    #[error("batch may not mix labeled and unlabeled data (datum {index} differs from datum 0)")]
    MixedLabels { index: usize },
    #[error("dataset must contain at least one datum")]
    EmptyDataset,
    #[error("inconsistent {what} width: expected {expected}, found {found}")]
    FeatureWidthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid alt count {alt_count} for depth {depth}")]
    InvalidCounts { depth: u32, alt_count: u32 },
    #[error("unknown mixture mode '{mode}', must be 'beta', 'gamma' or 'none'")]
    UnknownMixtureMode { mode: String },
    #[error("moments of the underlying beta mixture are only defined in beta mode (mode is {mode})")]
    MomentsRequireBetaMode { mode: String },
    #[error("invalid distribution parameters: {msg}")]
    InvalidDistribution { msg: String },
    #[error("batch size must be positive")]
    InvalidBatchSize,
    #[error("invalid training fraction {fraction}, must be in [0, 1]")]
    InvalidTrainingFraction { fraction: f64 },
    #[error("invalid checkpoint: {msg}")]
    InvalidCheckpoint { msg: String },
}

pub(crate) fn invalid_distribution<E: std::fmt::Display>(err: E) -> Error {
    Error::InvalidDistribution {
        msg: err.to_string(),
    }
}
