use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::evaluate::RecordVerdict;

#[derive(Debug, Clone, PartialEq)]
pub struct FindingSummary {
    pub kind: &'static str,
    pub count: usize,
}

pub fn summarize_by_kind(verdicts: &[RecordVerdict]) -> Vec<FindingSummary> {
    let mut map: HashMap<&'static str, usize> = HashMap::new();

    for finding in verdicts.iter().flat_map(|v| v.findings.iter()) {
        if finding.is_warning() {
            *map.entry(finding.kind()).or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<FindingSummary> = map
        .into_iter()
        .map(|(kind, count)| FindingSummary { kind, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(b.kind)));
    summaries
}

pub fn build_report(
    source: &str,
    generated_at: DateTime<Utc>,
    verdicts: &[RecordVerdict],
    limit: usize,
) -> String {
    let summaries = summarize_by_kind(verdicts);
    let flagged: Vec<&RecordVerdict> = verdicts.iter().filter(|v| v.flagged).collect();

    let mut output = String::new();

    let _ = writeln!(output, "# Credential Anomaly Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Screened {} records: {} flagged, {} clean.",
        verdicts.len(),
        flagged.len(),
        verdicts.len() - flagged.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Finding Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No anomalies detected.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {}", summary.kind, summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Flagged Records");

    if flagged.is_empty() {
        let _ = writeln!(output, "No records flagged.");
    } else {
        for verdict in flagged.iter().take(limit) {
            let record = &verdict.record;
            let _ = writeln!(
                output,
                "- {} ({}, {} in {}, {}, {:.1}%)",
                record.name,
                record.institution,
                record.degree,
                record.field,
                record.year,
                record.percentage
            );
            for warning in &verdict.warnings {
                let _ = writeln!(output, "  - {warning}");
            }
        }
        if flagged.len() > limit {
            let _ = writeln!(output, "- ... and {} more", flagged.len() - limit);
        }
    }

    output
}
