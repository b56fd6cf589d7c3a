use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// A record as handed over by a transport (CSV row, database row, CLI flags)
/// before its shape has been checked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub name: Option<String>,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub year: Option<String>,
    pub percentage: Option<String>,
}

/// A shape-checked credential. Reference and candidate records share this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub name: String,
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub year: i32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub institution: String,
    pub degree: String,
}

impl PairKey {
    pub fn new(institution: &str, degree: &str) -> Self {
        Self {
            institution: institution.to_string(),
            degree: degree.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairStats {
    pub mean_percentage: f64,
    /// Sample standard deviation (N - 1). `None` for single-record groups.
    pub stddev_percentage: Option<f64>,
    pub sample_count: usize,
    pub min_year: i32,
    pub max_year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSummary {
    pub pair_stats: HashMap<PairKey, PairStats>,
    pub degree_fields: HashMap<String, BTreeSet<String>>,
    pub global_min_year: i32,
    pub global_max_year: i32,
}

impl BaselineSummary {
    pub fn pair(&self, institution: &str, degree: &str) -> Option<&PairStats> {
        self.pair_stats.get(&PairKey::new(institution, degree))
    }

    pub fn fields_for(&self, degree: &str) -> Option<&BTreeSet<String>> {
        self.degree_fields.get(degree)
    }
}

impl RawRecord {
    pub fn into_reference(self, row: usize) -> Result<CredentialRecord, DetectorError> {
        self.check_shape()
            .map_err(|reason| DetectorError::MalformedRecord { row, reason })
    }

    pub fn into_candidate(self) -> Result<CredentialRecord, DetectorError> {
        self.check_shape()
            .map_err(|reason| DetectorError::InvalidCandidate { reason })
    }

    fn check_shape(self) -> Result<CredentialRecord, String> {
        let name = required("name", self.name)?;
        let institution = required("institution", self.institution)?;
        let degree = required("degree", self.degree)?;
        let field = required("field", self.field)?;

        let year_text = required("year", self.year)?;
        let year = year_text
            .parse::<i32>()
            .map_err(|_| format!("year '{year_text}' is not an integer"))?;

        let percentage_text = required("percentage", self.percentage)?;
        let percentage = percentage_text
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("percentage '{percentage_text}' is not a number"))?;

        Ok(CredentialRecord {
            name,
            institution,
            degree,
            field,
            year,
            percentage,
        })
    }
}

fn required(attribute: &str, value: Option<String>) -> Result<String, String> {
    match value.map(|text| text.trim().to_string()) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(format!("missing {attribute}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(year: &str, percentage: &str) -> RawRecord {
        RawRecord {
            name: Some("Avery Lee".to_string()),
            institution: Some("Acme University".to_string()),
            degree: Some("BSc".to_string()),
            field: Some("Physics".to_string()),
            year: Some(year.to_string()),
            percentage: Some(percentage.to_string()),
        }
    }

    #[test]
    fn well_formed_raw_record_converts() {
        let record = raw(" 2021 ", "74.5").into_candidate().unwrap();
        assert_eq!(record.year, 2021);
        assert_eq!(record.percentage, 74.5);
        assert_eq!(record.institution, "Acme University");
    }

    #[test]
    fn non_numeric_year_is_malformed_reference() {
        let err = raw("twenty", "74").into_reference(3).unwrap_err();
        assert_eq!(
            err,
            DetectorError::MalformedRecord {
                row: 3,
                reason: "year 'twenty' is not an integer".to_string(),
            }
        );
    }

    #[test]
    fn non_finite_percentage_is_invalid_candidate() {
        let err = raw("2021", "NaN").into_candidate().unwrap_err();
        assert!(matches!(err, DetectorError::InvalidCandidate { .. }));
    }

    #[test]
    fn blank_attribute_counts_as_missing() {
        let mut record = raw("2021", "70");
        record.field = Some("   ".to_string());
        let err = record.into_candidate().unwrap_err();
        assert_eq!(
            err,
            DetectorError::InvalidCandidate {
                reason: "missing field".to_string(),
            }
        );
    }

    #[test]
    fn baseline_lookups_use_both_keys() {
        let mut pair_stats = HashMap::new();
        pair_stats.insert(
            PairKey::new("Acme University", "BSc"),
            PairStats {
                mean_percentage: 74.0,
                stddev_percentage: None,
                sample_count: 1,
                min_year: 2020,
                max_year: 2020,
            },
        );
        let summary = BaselineSummary {
            pair_stats,
            degree_fields: HashMap::new(),
            global_min_year: 2020,
            global_max_year: 2020,
        };
        assert!(summary.pair("Acme University", "BSc").is_some());
        assert!(summary.pair("Acme University", "MSc").is_none());
        assert!(summary.fields_for("BSc").is_none());
    }
}
