use anyhow::Context;
use clap::{Parser, Subcommand};
use medform_core::{CoreConfig, PatientService};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "medform")]
#[command(about = "Medform clinical form data CLI")]
struct Cli {
    /// Patient data directory (overrides PATIENT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Print one stored patient document
    Show {
        /// Patient identifier, e.g. P-001
        patient_id: String,
        /// Print the annotated form tree instead of the stored document
        #[arg(long)]
        annotated: bool,
    },
    /// Print the master schema
    Schema,
    /// Print field order and value suggestions
    Suggestions {
        /// JSON file with an in-progress record to rank similar patients by
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Print a blank annotated tree for the next new patient
    Draft,
    /// Create or replace a patient from a flattened JSON document
    Save {
        /// Path to the JSON document
        file: PathBuf,
    },
    /// Rewrite history fields stored in the legacy per-item shape
    MigrateHistory {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medform_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'medform --help' for commands");
        return Ok(());
    };

    let data_dir = cli
        .data_dir
        .map(|dir| dir.to_string_lossy().into_owned())
        .or_else(|| std::env::var("PATIENT_DATA_DIR").ok());
    let cfg = Arc::new(CoreConfig::from_env_values(
        data_dir,
        std::env::var("MEDFORM_SUGGESTION_COUNT").ok(),
        std::env::var("MEDFORM_VISIBILITY_THRESHOLD").ok(),
    )?);
    let service = PatientService::open(cfg)?;

    match command {
        Commands::List => {
            let patients = service.list_patients()?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "{}\t{}",
                        patient.patient_id,
                        patient.id.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Show {
            patient_id,
            annotated,
        } => {
            if annotated {
                print_json(&service.open_patient(&patient_id)?)?;
            } else {
                print_json(&service.get_patient(&patient_id)?)?;
            }
        }
        Commands::Schema => print_json(&service.schema()?)?,
        Commands::Suggestions { context } => {
            let ranking = match context {
                Some(path) => {
                    let context = read_json(&path)?;
                    let filtered = service.filtered_ranking(&context)?;
                    if filtered.is_empty() {
                        eprintln!("No matching patients; showing global suggestions.");
                        service.global_ranking()?
                    } else {
                        filtered
                    }
                }
                None => service.global_ranking()?,
            };
            print_json(&api_shared::RankingRes::from(ranking))?;
        }
        Commands::Draft => print_json(&service.new_patient_draft()?)?,
        Commands::Save { file } => {
            let stored = service.save_patient(read_json(&file)?)?;
            print_json(&stored)?;
        }
        Commands::MigrateHistory { dry_run } => {
            let report = service.migrate_history(dry_run)?;
            let verb = if dry_run { "Would migrate" } else { "Migrated" };
            println!(
                "{} {} history field(s) across {} patient(s).",
                verb, report.fields_migrated, report.patients_changed
            );
        }
    }

    Ok(())
}
