use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::{error, info};

use plant_recon::config::ReconConfig;
use plant_recon::metrics::MetricsReport;
use plant_recon::{ingest, runner};

#[derive(Parser)]
#[command(name = "plant-recon")]
#[command(about = "Reconciliation and accuracy metrics for power plant inventories")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one system inventory against the reference
    Evaluate {
        /// Path to the system output CSV
        system_csv: PathBuf,

        /// Path to the reference CSV
        #[arg(short, long)]
        reference: PathBuf,

        /// Path to a JSON config overriding the built-in defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the reconciliation table and metrics report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate every CSV file in a directory, one independent run each
    EvaluateAll {
        /// Directory containing system output CSVs
        outputs_dir: PathBuf,

        /// Path to the reference CSV
        #[arg(short, long)]
        reference: PathBuf,

        /// Path to a JSON config overriding the built-in defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for per-run artifacts and the metrics summary
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig> {
    match path {
        Some(p) => Ok(ReconConfig::load(p)?),
        None => Ok(ReconConfig::default()),
    }
}

fn label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_evaluate(
    system_csv: &Path,
    reference: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let reference_entities = ingest::load_reference_csv(reference)?;
    let system_entities = ingest::load_system_csv(system_csv)?;
    info!(
        reference = reference_entities.len(),
        system = system_entities.len(),
        "inventories loaded"
    );

    let eval = runner::evaluate(
        &reference_entities,
        &system_entities,
        &config,
        &label(reference),
        &label(system_csv),
    )?;
    println!("{}", eval.report);

    if let Some(dir) = output {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
        let stem = label(system_csv);
        let table_path = dir.join(format!("reconciliation_{}.csv", stem));
        let report_path = dir.join(format!("metrics_{}.json", stem));
        runner::write_reconciliation_csv(&eval.entries, &table_path)?;
        runner::write_metrics_json(&eval.report, &report_path)?;
        println!("Saved: {}, {}", table_path.display(), report_path.display());
    }
    Ok(())
}

fn run_one(
    path: &Path,
    reference_entities: &[plant_recon::schema::Entity],
    config: &ReconConfig,
    reference_label: &str,
    output: &Path,
) -> Result<MetricsReport> {
    let run_label = label(path);
    let system = ingest::load_system_csv(path)?;
    let eval = runner::evaluate(
        reference_entities,
        &system,
        config,
        reference_label,
        &run_label,
    )?;
    let table_path = output.join(format!("reconciliation_{}.csv", run_label));
    let report_path = output.join(format!("metrics_{}.json", run_label));
    runner::write_reconciliation_csv(&eval.entries, &table_path)?;
    runner::write_metrics_json(&eval.report, &report_path)?;
    Ok(eval.report)
}

fn cmd_evaluate_all(
    outputs_dir: &Path,
    reference: &Path,
    config: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let config = load_config(config)?;
    let reference_entities = ingest::load_reference_csv(reference)?;
    fs::create_dir_all(output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    let mut files: Vec<PathBuf> = fs::read_dir(outputs_dir)
        .with_context(|| format!("cannot read {}", outputs_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    info!(runs = files.len(), "starting batch evaluation");

    // Runs share no state, so they evaluate in parallel; one bad input is
    // reported without aborting the others.
    let reference_label = label(reference);
    let results: Vec<(String, Result<MetricsReport>)> = files
        .par_iter()
        .map(|path| {
            (
                label(path),
                run_one(path, &reference_entities, &config, &reference_label, output),
            )
        })
        .collect();

    let mut reports = Vec::new();
    for (run_label, result) in results {
        match result {
            Ok(report) => {
                println!(
                    "{:<40} cov={:>5.1}%  prec={:>5.1}%  F1={:>5.1}%  ({}/{})",
                    run_label,
                    report.coverage * 100.0,
                    report.precision * 100.0,
                    report.f1 * 100.0,
                    report.n_matched,
                    report.n_reference
                );
                reports.push(report);
            }
            Err(e) => {
                error!(run = %run_label, "run failed: {:#}", e);
                println!("{:<40} FAILED: {:#}", run_label, e);
            }
        }
    }

    reports.sort_by(|a, b| a.system_label.cmp(&b.system_label));
    let summary_path = output.join("all_metrics.json");
    let mut text = serde_json::to_string_pretty(&reports)?;
    text.push('\n');
    fs::write(&summary_path, text)?;
    info!(
        finished = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "batch evaluation complete"
    );
    println!("\nSummary: {}", summary_path.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args.command {
        Command::Evaluate {
            system_csv,
            reference,
            config,
            output,
        } => cmd_evaluate(
            &system_csv,
            &reference,
            config.as_deref(),
            output.as_deref(),
        ),
        Command::EvaluateAll {
            outputs_dir,
            reference,
            config,
            output,
        } => cmd_evaluate_all(&outputs_dir, &reference, config.as_deref(), &output),
    }
}
