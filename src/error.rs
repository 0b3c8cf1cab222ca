use std::io;

use thiserror::Error;

/// Fatal failures of the preprocessing stages.
///
/// Rows dropped for missing fields or unparseable timestamps, and records whose
/// date is in neither allowlist, are not errors: they are counted and logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("no rows survived normalization ({rows_read} read, {dropped} dropped)")]
    EmptyDataset { rows_read: usize, dropped: usize },
    #[error("input is missing required column '{0}'")]
    MissingColumn(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
