use std::fmt;

use serde::Serialize;

use crate::error::{DetectorError, Result};
use crate::models::{BaselineSummary, CredentialRecord, RawRecord};

/// Two-sigma rule: a percentage further than this many standard deviations
/// from its pairing's mean is reported.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    UnknownPairing { institution: String, degree: String },
    UnusualPercentage { percentage: f64, mean: f64, stddev: f64 },
    YearBeforeEarliest { min_year: i32 },
    FutureYear,
    UncommonField { field: String, degree: String },
    NameDegreeMismatch,
    Clean,
}

impl Finding {
    pub fn kind(&self) -> &'static str {
        match self {
            Finding::UnknownPairing { .. } => "unknown pairing",
            Finding::UnusualPercentage { .. } => "unusual percentage",
            Finding::YearBeforeEarliest { .. } => "year before earliest",
            Finding::FutureYear => "future year",
            Finding::UncommonField { .. } => "uncommon field",
            Finding::NameDegreeMismatch => "name/degree mismatch",
            Finding::Clean => "clean",
        }
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, Finding::Clean)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::UnknownPairing { institution, degree } => {
                write!(f, "{institution} doesn't typically offer {degree}")
            }
            Finding::UnusualPercentage {
                percentage,
                mean,
                stddev,
            } => write!(
                f,
                "Unusual percentage ({percentage}). Typical range: {mean:.1}±{stddev:.1}"
            ),
            Finding::YearBeforeEarliest { min_year } => {
                write!(f, "Suspicious year. Earliest record for this degree: {min_year}")
            }
            Finding::FutureYear => write!(f, "Future graduation year detected"),
            Finding::UncommonField { field, degree } => {
                write!(f, "Uncommon field '{field}' for {degree}")
            }
            Finding::NameDegreeMismatch => {
                write!(f, "Name matches existing records with different degrees")
            }
            Finding::Clean => write!(f, "No anomalies detected"),
        }
    }
}

/// One reference record together with what its evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct RecordVerdict {
    pub record: CredentialRecord,
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
    pub flagged: bool,
}

/// Screens candidates against a baseline and the reference set it was built
/// from. Holds shared references only; evaluation never mutates either.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    baseline: &'a BaselineSummary,
    reference: &'a [CredentialRecord],
    z_threshold: f64,
}

impl<'a> Evaluator<'a> {
    pub fn new(baseline: &'a BaselineSummary, reference: &'a [CredentialRecord]) -> Self {
        Self {
            baseline,
            reference,
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    /// Rejects thresholds that are not finite and positive.
    pub fn with_threshold(mut self, z_threshold: f64) -> Result<Self> {
        check_threshold(z_threshold)?;
        self.z_threshold = z_threshold;
        Ok(self)
    }

    /// Runs every check in order. Returns `[Finding::Clean]` when none fires.
    pub fn findings(&self, candidate: &CredentialRecord) -> Vec<Finding> {
        let mut findings = Vec::new();

        match self.baseline.pair(&candidate.institution, &candidate.degree) {
            None => findings.push(Finding::UnknownPairing {
                institution: candidate.institution.clone(),
                degree: candidate.degree.clone(),
            }),
            Some(stats) => {
                if let Some(stddev) = stats.stddev_percentage.filter(|s| *s > 0.0) {
                    let z = (candidate.percentage - stats.mean_percentage) / stddev;
                    if z.abs() > self.z_threshold {
                        findings.push(Finding::UnusualPercentage {
                            percentage: candidate.percentage,
                            mean: stats.mean_percentage,
                            stddev,
                        });
                    }
                }

                if candidate.year < stats.min_year {
                    findings.push(Finding::YearBeforeEarliest {
                        min_year: stats.min_year,
                    });
                }
                if candidate.year > self.baseline.global_max_year {
                    findings.push(Finding::FutureYear);
                }
            }
        }

        if let Some(fields) = self.baseline.fields_for(&candidate.degree) {
            if !fields.contains(&candidate.field) {
                findings.push(Finding::UncommonField {
                    field: candidate.field.clone(),
                    degree: candidate.degree.clone(),
                });
            }
        }

        if self.name_has_only_other_degrees(candidate) {
            findings.push(Finding::NameDegreeMismatch);
        }

        if findings.is_empty() {
            findings.push(Finding::Clean);
        }
        findings
    }

    pub fn messages(&self, candidate: &CredentialRecord) -> Vec<String> {
        self.findings(candidate)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Evaluates every reference record against the baseline.
    pub fn verify_all(&self) -> Vec<RecordVerdict> {
        self.reference
            .iter()
            .map(|record| {
                let findings = self.findings(record);
                RecordVerdict {
                    record: record.clone(),
                    flagged: findings.iter().any(Finding::is_warning),
                    warnings: findings.iter().map(ToString::to_string).collect(),
                    findings,
                }
            })
            .collect()
    }

    fn name_has_only_other_degrees(&self, candidate: &CredentialRecord) -> bool {
        let name = candidate.name.to_lowercase();
        let mut matches = self
            .reference
            .iter()
            .filter(|record| record.name.to_lowercase() == name)
            .peekable();

        matches.peek().is_some() && matches.all(|record| record.degree != candidate.degree)
    }
}

pub fn check_threshold(z_threshold: f64) -> Result<()> {
    if !z_threshold.is_finite() || z_threshold <= 0.0 {
        return Err(DetectorError::InvalidConfig {
            reason: format!("z_threshold must be positive, got {z_threshold}"),
        });
    }
    Ok(())
}

pub fn evaluate(
    candidate: &CredentialRecord,
    baseline: &BaselineSummary,
    reference: &[CredentialRecord],
) -> Vec<String> {
    Evaluator::new(baseline, reference).messages(candidate)
}

/// Validates a raw candidate before evaluating it.
pub fn evaluate_raw(
    candidate: RawRecord,
    baseline: &BaselineSummary,
    reference: &[CredentialRecord],
) -> Result<Vec<String>> {
    let candidate = candidate.into_candidate()?;
    Ok(evaluate(&candidate, baseline, reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline;

    fn record(name: &str, institution: &str, degree: &str, field: &str, year: i32, pct: f64) -> CredentialRecord {
        CredentialRecord {
            name: name.to_string(),
            institution: institution.to_string(),
            degree: degree.to_string(),
            field: field.to_string(),
            year,
            percentage: pct,
        }
    }

    fn acme_reference() -> Vec<CredentialRecord> {
        vec![
            record("Avery Lee", "Acme University", "BSc", "Physics", 2019, 70.0),
            record("Jules Moreno", "Acme University", "BSc", "Mathematics", 2020, 72.0),
            record("Kiara Patel", "Acme University", "BSc", "Physics", 2021, 74.0),
            record("Noor Haddad", "Acme University", "BSc", "Chemistry", 2022, 76.0),
            record("Tomas Brandt", "Acme University", "BSc", "Mathematics", 2023, 78.0),
        ]
    }

    fn candidate(year: i32, pct: f64) -> CredentialRecord {
        record("Zed Zed", "Acme University", "BSc", "Physics", year, pct)
    }

    #[test]
    fn high_percentage_yields_single_outlier_warning() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();

        let warnings = evaluate(&candidate(2021, 95.0), &summary, &reference);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0], "Unusual percentage (95). Typical range: 74.0±3.2");
    }

    #[test]
    fn year_past_global_max_is_future() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();

        let warnings = evaluate(&candidate(2030, 74.0), &summary, &reference);
        assert_eq!(warnings, vec!["Future graduation year detected".to_string()]);

        let both = evaluate(&candidate(2030, 95.0), &summary, &reference);
        assert!(both.contains(&"Future graduation year detected".to_string()));
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn year_before_pairing_min_is_suspicious() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();

        let warnings = evaluate(&candidate(2010, 74.0), &summary, &reference);
        assert_eq!(
            warnings,
            vec!["Suspicious year. Earliest record for this degree: 2019".to_string()]
        );
    }

    #[test]
    fn unknown_pairing_skips_pairing_checks() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let mut unknown = candidate(1990, 10.0);
        unknown.institution = "Unknown College".to_string();

        let findings = Evaluator::new(&summary, &reference).findings(&unknown);
        assert_eq!(
            findings[0],
            Finding::UnknownPairing {
                institution: "Unknown College".to_string(),
                degree: "BSc".to_string(),
            }
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].to_string(), "Unknown College doesn't typically offer BSc");
    }

    #[test]
    fn unknown_pairing_still_checks_field() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let unknown = record("avery LEE", "Unknown College", "BSc", "Poetry", 2021, 74.0);

        let findings = Evaluator::new(&summary, &reference).findings(&unknown);
        assert_eq!(findings.len(), 2);
        assert!(matches!(findings[0], Finding::UnknownPairing { .. }));
        assert_eq!(findings[1].to_string(), "Uncommon field 'Poetry' for BSc");
    }

    #[test]
    fn unknown_degree_skips_field_check_silently() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let odd = record("Zed Zed", "Acme University", "DPhil", "Poetry", 2021, 74.0);

        let findings = Evaluator::new(&summary, &reference).findings(&odd);
        assert_eq!(findings.len(), 1);
        assert!(matches!(findings[0], Finding::UnknownPairing { .. }));
    }

    #[test]
    fn name_match_with_other_degree_only_is_flagged() {
        let mut reference = acme_reference();
        reference.push(record("Avery Lee", "Acme University", "MSc", "Physics", 2022, 80.0));
        let summary = baseline::build(&reference).unwrap();

        let msc = record("AVERY LEE", "Acme University", "MSc", "Physics", 2022, 80.0);
        assert_eq!(evaluate(&msc, &summary, &reference), vec!["No anomalies detected"]);

        let mut reference = acme_reference();
        reference.push(record("Sam Okafor", "Acme University", "MSc", "Physics", 2022, 80.0));
        reference.push(record("Sam Okafor", "Acme University", "MSc", "Physics", 2022, 82.0));
        let summary = baseline::build(&reference).unwrap();
        let sam = record("sam okafor", "Acme University", "BSc", "Physics", 2021, 74.0);
        assert_eq!(
            evaluate(&sam, &summary, &reference),
            vec!["Name matches existing records with different degrees"]
        );
    }

    #[test]
    fn clean_record_yields_only_marker() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();

        let findings = Evaluator::new(&summary, &reference).findings(&candidate(2021, 74.0));
        assert_eq!(findings, vec![Finding::Clean]);
        assert!(!findings[0].is_warning());
    }

    #[test]
    fn boundary_z_score_is_not_flagged() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let stats = summary.pair("Acme University", "BSc").unwrap();
        let std = stats.stddev_percentage.unwrap();

        let on_boundary = candidate(2021, stats.mean_percentage + 2.0 * std - 1e-9);
        assert_eq!(evaluate(&on_boundary, &summary, &reference), vec!["No anomalies detected"]);

        let past_boundary = candidate(2021, stats.mean_percentage - 2.0 * std - 0.01);
        assert_eq!(evaluate(&past_boundary, &summary, &reference).len(), 1);
    }

    #[test]
    fn custom_threshold_is_respected() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let evaluator = Evaluator::new(&summary, &reference).with_threshold(1.0).unwrap();

        let findings = evaluator.findings(&candidate(2021, 78.0));
        assert!(matches!(findings[0], Finding::UnusualPercentage { .. }));
    }

    #[test]
    fn nan_or_negative_threshold_is_rejected() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();

        for bad in [f64::NAN, -1.0, 0.0, f64::INFINITY] {
            let err = Evaluator::new(&summary, &reference).with_threshold(bad).unwrap_err();
            assert!(matches!(err, DetectorError::InvalidConfig { .. }));
        }
    }

    #[test]
    fn zero_deviation_pair_skips_percentage_check() {
        let reference = vec![
            record("Avery Lee", "Acme University", "PhD", "Physics", 2018, 90.0),
            record("Jules Moreno", "Acme University", "PhD", "Physics", 2019, 90.0),
        ];
        let summary = baseline::build(&reference).unwrap();
        assert_eq!(
            summary.pair("Acme University", "PhD").unwrap().stddev_percentage,
            Some(0.0)
        );

        let far_off = record("Zed Zed", "Acme University", "PhD", "Physics", 2019, 10.0);
        assert_eq!(evaluate(&far_off, &summary, &reference), vec!["No anomalies detected"]);
    }

    #[test]
    fn unknown_pairing_still_checks_name() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let unknown = record("KIARA patel", "Unknown College", "MSc", "Physics", 2021, 74.0);

        let findings = Evaluator::new(&summary, &reference).findings(&unknown);
        assert_eq!(
            findings,
            vec![
                Finding::UnknownPairing {
                    institution: "Unknown College".to_string(),
                    degree: "MSc".to_string(),
                },
                Finding::NameDegreeMismatch,
            ]
        );
    }

    #[test]
    fn single_sample_pair_skips_percentage_check() {
        let reference = vec![record("Avery Lee", "Borealis Institute", "MSc", "History", 2015, 60.0)];
        let summary = baseline::build(&reference).unwrap();
        let candidate = record("Zed Zed", "Borealis Institute", "MSc", "History", 2015, 99.0);

        assert_eq!(evaluate(&candidate, &summary, &reference), vec!["No anomalies detected"]);
    }

    #[test]
    fn evaluation_is_idempotent_and_pure() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let reference_snapshot = reference.clone();
        let summary_snapshot = summary.clone();

        let first = evaluate(&candidate(2030, 95.0), &summary, &reference);
        let second = evaluate(&candidate(2030, 95.0), &summary, &reference);

        assert_eq!(first, second);
        assert_eq!(reference, reference_snapshot);
        assert_eq!(summary, summary_snapshot);
    }

    #[test]
    fn raw_candidate_is_validated() {
        let reference = acme_reference();
        let summary = baseline::build(&reference).unwrap();
        let raw = RawRecord {
            name: Some("Zed Zed".to_string()),
            institution: Some("Acme University".to_string()),
            degree: Some("BSc".to_string()),
            field: Some("Physics".to_string()),
            year: Some("next year".to_string()),
            percentage: Some("74".to_string()),
        };

        let err = evaluate_raw(raw, &summary, &reference).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidCandidate { .. }));
    }

    #[test]
    fn verify_all_marks_flagged_records() {
        let mut reference = acme_reference();
        reference.push(record("Rin Sato", "Acme University", "BSc", "Physics", 2021, 20.0));
        let summary = baseline::build(&reference).unwrap();

        let verdicts = Evaluator::new(&summary, &reference).verify_all();
        assert_eq!(verdicts.len(), reference.len());
        let flagged: Vec<&str> = verdicts
            .iter()
            .filter(|v| v.flagged)
            .map(|v| v.record.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["Rin Sato"]);
    }
}
