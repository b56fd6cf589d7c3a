use std::collections::{BTreeSet, HashMap};

use crate::error::{DetectorError, Result};
use crate::models::{BaselineSummary, CredentialRecord, PairKey, PairStats};

#[derive(Debug)]
struct PairAccumulator {
    percentages: Vec<f64>,
    min_year: i32,
    max_year: i32,
}

impl PairAccumulator {
    fn new(year: i32) -> Self {
        Self {
            percentages: Vec::new(),
            min_year: year,
            max_year: year,
        }
    }

    fn push(&mut self, record: &CredentialRecord) {
        self.percentages.push(record.percentage);
        self.min_year = self.min_year.min(record.year);
        self.max_year = self.max_year.max(record.year);
    }

    fn finish(self) -> PairStats {
        let (mean_percentage, stddev_percentage) = mean_sample_std(&self.percentages);
        PairStats {
            mean_percentage,
            stddev_percentage,
            sample_count: self.percentages.len(),
            min_year: self.min_year,
            max_year: self.max_year,
        }
    }
}

/// Builds the per-(institution, degree) statistics, the degree -> fields map
/// and the global year range in one pass over the reference set.
pub fn build(records: &[CredentialRecord]) -> Result<BaselineSummary> {
    let first = records.first().ok_or(DetectorError::EmptyDataset)?;

    let mut pairs: HashMap<PairKey, PairAccumulator> = HashMap::new();
    let mut degree_fields: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut global_min_year = first.year;
    let mut global_max_year = first.year;

    for record in records {
        pairs
            .entry(PairKey::new(&record.institution, &record.degree))
            .or_insert_with(|| PairAccumulator::new(record.year))
            .push(record);

        degree_fields
            .entry(record.degree.clone())
            .or_default()
            .insert(record.field.clone());

        global_min_year = global_min_year.min(record.year);
        global_max_year = global_max_year.max(record.year);
    }

    let pair_stats: HashMap<PairKey, PairStats> = pairs
        .into_iter()
        .map(|(key, acc)| (key, acc.finish()))
        .collect();

    tracing::debug!(
        records = records.len(),
        pairs = pair_stats.len(),
        degrees = degree_fields.len(),
        global_min_year,
        global_max_year,
        "baseline built"
    );

    Ok(BaselineSummary {
        pair_stats,
        degree_fields,
        global_min_year,
        global_max_year,
    })
}

/// Mean and sample standard deviation (N - 1 denominator).
/// The deviation is undefined below two values.
fn mean_sample_std(values: &[f64]) -> (f64, Option<f64>) {
    if values.is_empty() {
        return (0.0, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, None);
    }
    let sq_diff: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, Some((sq_diff / (n - 1.0)).sqrt()))
}
