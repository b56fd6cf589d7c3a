use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use degree_anomaly_screen::{
    baseline, dataset, db, report, Catalog, CredentialRecord, Evaluator, Finding, RawRecord,
    ScreenConfig,
};

#[derive(Parser)]
#[command(name = "degree-anomaly-screen")]
#[command(about = "Flags statistically unusual academic-credential records", long_about = None)]
struct Cli {
    /// Reference dataset CSV; the Postgres reference table is used when omitted
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    /// JSON file with screening settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the z-score threshold for the percentage check
    #[arg(long, global = true)]
    z_threshold: Option<f64>,
    /// Skip malformed reference rows instead of failing
    #[arg(long, global = true)]
    skip_malformed: bool,
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small reference dataset
    Seed,
    /// Import reference records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Screen a single candidate record
    Check {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        degree: Option<String>,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        percentage: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Screen every reference record against the baseline
    VerifyAll {
        #[arg(long)]
        flagged_only: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report over the whole reference set
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List distinct institutions, degrees and fields
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    record: &'a CredentialRecord,
    findings: &'a [Finding],
    warnings: Vec<String>,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ScreenConfig> {
    let mut config = match &cli.config {
        Some(path) => ScreenConfig::from_file(path)?,
        None => ScreenConfig::default(),
    };
    if let Some(z) = cli.z_threshold {
        config.z_threshold = z;
    }
    if cli.skip_malformed {
        config.skip_malformed = true;
    }
    config.validate()?;
    Ok(config)
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when no --dataset is given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_reference(
    cli: &Cli,
    config: &ScreenConfig,
) -> anyhow::Result<(Vec<CredentialRecord>, String)> {
    match &cli.dataset {
        Some(path) => {
            let records = dataset::load_csv(path, config.skip_malformed)?;
            Ok((records, path.display().to_string()))
        }
        None => {
            let pool = connect().await?;
            let records = db::fetch_reference(&pool).await?;
            Ok((records, "the reference database".to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} seed reference records.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, csv, config.skip_malformed).await?;
            println!("Inserted {inserted} reference records from {}.", csv.display());
        }
        Commands::Check {
            name,
            institution,
            degree,
            field,
            year,
            percentage,
            json,
        } => {
            let candidate = RawRecord {
                name: name.clone(),
                institution: institution.clone(),
                degree: degree.clone(),
                field: field.clone(),
                year: year.clone(),
                percentage: percentage.clone(),
            }
            .into_candidate()?;

            let (reference, _) = load_reference(&cli, &config).await?;
            let summary = baseline::build(&reference)?;
            let evaluator =
                Evaluator::new(&summary, &reference).with_threshold(config.z_threshold)?;
            let findings = evaluator.findings(&candidate);
            let warnings: Vec<String> = findings.iter().map(ToString::to_string).collect();

            if *json {
                let output = CheckOutput {
                    record: &candidate,
                    findings: &findings,
                    warnings,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for warning in warnings {
                    println!("- {warning}");
                }
            }
        }
        Commands::VerifyAll { flagged_only, json } => {
            let (reference, _) = load_reference(&cli, &config).await?;
            let summary = baseline::build(&reference)?;
            let verdicts: Vec<_> = Evaluator::new(&summary, &reference)
                .with_threshold(config.z_threshold)?
                .verify_all()
                .into_iter()
                .filter(|v| !*flagged_only || v.flagged)
                .collect();

            if *json {
                println!("{}", serde_json::to_string_pretty(&verdicts)?);
            } else if verdicts.is_empty() {
                println!("No records flagged.");
            } else {
                for verdict in &verdicts {
                    let record = &verdict.record;
                    println!(
                        "{} ({}, {} in {}, {}, {:.1}%)",
                        record.name,
                        record.institution,
                        record.degree,
                        record.field,
                        record.year,
                        record.percentage
                    );
                    for warning in &verdict.warnings {
                        println!("  - {warning}");
                    }
                }
            }
        }
        Commands::Report { out } => {
            let (reference, source) = load_reference(&cli, &config).await?;
            let summary = baseline::build(&reference)?;
            let verdicts = Evaluator::new(&summary, &reference)
                .with_threshold(config.z_threshold)?
                .verify_all();
            let report =
                report::build_report(&source, chrono::Utc::now(), &verdicts, config.report_limit);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Catalog { json } => {
            let (reference, _) = load_reference(&cli, &config).await?;
            let catalog = Catalog::from_records(&reference);

            if *json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                println!("Institutions: {}", catalog.institutions.join(", "));
                println!("Degrees: {}", catalog.degrees.join(", "));
                println!("Fields: {}", catalog.fields.join(", "));
            }
        }
    }

    Ok(())
}
