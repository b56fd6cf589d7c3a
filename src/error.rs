use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("reference dataset is empty: nothing to build a baseline from")]
    EmptyDataset,

    #[error("malformed reference record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("invalid candidate record: {reason}")]
    InvalidCandidate { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, DetectorError>;
