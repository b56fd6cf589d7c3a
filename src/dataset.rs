use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::error::DetectorError;
use crate::models::{CredentialRecord, RawRecord};

pub fn load_csv(path: &Path, skip_malformed: bool) -> anyhow::Result<Vec<CredentialRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;
    load_csv_reader(file, skip_malformed)
        .with_context(|| format!("failed to load dataset {}", path.display()))
}

/// Reads reference rows with a header line. Row numbers in errors count data
/// rows from 1.
pub fn load_csv_reader<R: Read>(
    reader: R,
    skip_malformed: bool,
) -> anyhow::Result<Vec<CredentialRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.deserialize::<RawRecord>().enumerate() {
        let row = index + 1;
        let checked = result
            .map_err(|err| DetectorError::MalformedRecord {
                row,
                reason: err.to_string(),
            })
            .and_then(|raw| raw.into_reference(row));

        match checked {
            Ok(record) => records.push(record),
            Err(err) if skip_malformed => {
                tracing::warn!(row, error = %err, "skipping malformed reference record");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if records.is_empty() {
        return Err(DetectorError::EmptyDataset.into());
    }

    tracing::info!(loaded = records.len(), skipped, "reference dataset loaded");
    Ok(records)
}
