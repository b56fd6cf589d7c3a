use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::CredentialRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let records = vec![
        ("Avery Lee", "Acme University", "BSc", "Physics", 2019, 70.0),
        ("Jules Moreno", "Acme University", "BSc", "Mathematics", 2020, 72.0),
        ("Kiara Patel", "Acme University", "BSc", "Physics", 2021, 74.0),
        ("Noor Haddad", "Acme University", "BSc", "Chemistry", 2022, 76.0),
        ("Tomas Brandt", "Acme University", "BSc", "Mathematics", 2023, 78.0),
        ("Ines Duarte", "Acme University", "MSc", "Physics", 2021, 81.5),
        ("Marcus Webb", "Acme University", "MSc", "Mathematics", 2022, 79.0),
        ("Priya Raman", "Borealis Institute", "BA", "History", 2018, 66.0),
        ("Lena Novak", "Borealis Institute", "BA", "Economics", 2019, 69.5),
        ("Omar Saleh", "Borealis Institute", "BA", "History", 2020, 71.0),
        ("Hana Kim", "Borealis Institute", "MBA", "Business Administration", 2022, 74.5),
        ("Diego Alvarez", "Borealis Institute", "MBA", "Business Administration", 2023, 77.0),
    ];

    let records: Vec<CredentialRecord> = records
        .into_iter()
        .map(
            |(name, institution, degree, field, year, percentage)| CredentialRecord {
                name: name.to_string(),
                institution: institution.to_string(),
                degree: degree.to_string(),
                field: field.to_string(),
                year,
                percentage,
            },
        )
        .collect();

    insert_records(pool, &records).await
}

/// Loads a CSV dataset and stores its rows as reference records.
/// Rows already present are left untouched.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    skip_malformed: bool,
) -> anyhow::Result<usize> {
    let records = crate::dataset::load_csv(csv_path, skip_malformed)?;
    insert_records(pool, &records).await
}

/// For each record, how many identical records precede it in the batch.
/// Identical rows stay distinct in storage and re-importing a batch is a no-op.
fn occurrences(records: &[CredentialRecord]) -> Vec<i32> {
    let mut seen: HashMap<(&str, &str, &str, &str, i32, u64), i32> = HashMap::new();

    records
        .iter()
        .map(|record| {
            let key = (
                record.name.as_str(),
                record.institution.as_str(),
                record.degree.as_str(),
                record.field.as_str(),
                record.year,
                record.percentage.to_bits(),
            );
            let count = seen.entry(key).or_insert(0);
            let occurrence = *count;
            *count += 1;
            occurrence
        })
        .collect()
}

async fn insert_records(pool: &PgPool, records: &[CredentialRecord]) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for (record, occurrence) in records.iter().zip(occurrences(records)) {
        let result = sqlx::query(
            r#"
            INSERT INTO degree_screen.reference_records
            (id, name, institution, degree, field, year, percentage, occurrence)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name, institution, degree, field, year, percentage, occurrence)
            DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.name)
        .bind(&record.institution)
        .bind(&record.degree)
        .bind(&record.field)
        .bind(record.year)
        .bind(record.percentage)
        .bind(occurrence)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tracing::debug!(inserted, total = records.len(), "reference records stored");
    Ok(inserted)
}

pub async fn fetch_reference(pool: &PgPool) -> anyhow::Result<Vec<CredentialRecord>> {
    let rows = sqlx::query(
        "SELECT name, institution, degree, field, year, percentage \
         FROM degree_screen.reference_records \
         ORDER BY imported_at, name, occurrence",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        records.push(CredentialRecord {
            name: row.get("name"),
            institution: row.get("institution"),
            degree: row.get("degree"),
            field: row.get("field"),
            year: row.get("year"),
            percentage: row.get("percentage"),
        });
    }

    Ok(records)
}
