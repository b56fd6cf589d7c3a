//! Screening of academic-credential records against baseline statistics
//! built from a reference dataset.

pub mod baseline;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod evaluate;
pub mod models;
pub mod report;

pub use baseline::build;
pub use catalog::Catalog;
pub use config::ScreenConfig;
pub use error::DetectorError;
pub use evaluate::{evaluate, evaluate_raw, Evaluator, Finding, RecordVerdict, DEFAULT_Z_THRESHOLD};
pub use models::{BaselineSummary, CredentialRecord, PairKey, PairStats, RawRecord};
