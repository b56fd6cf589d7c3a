use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::CredentialRecord;

/// Distinct values observed in the reference set, sorted, for populating
/// selection inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub institutions: Vec<String>,
    pub degrees: Vec<String>,
    pub fields: Vec<String>,
}

impl Catalog {
    pub fn from_records(records: &[CredentialRecord]) -> Self {
        let mut institutions = BTreeSet::new();
        let mut degrees = BTreeSet::new();
        let mut fields = BTreeSet::new();

        for record in records {
            institutions.insert(record.institution.clone());
            degrees.insert(record.degree.clone());
            fields.insert(record.field.clone());
        }

        Self {
            institutions: institutions.into_iter().collect(),
            degrees: degrees.into_iter().collect(),
            fields: fields.into_iter().collect(),
        }
    }
}
