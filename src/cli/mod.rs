//! Command-line interface for the DOE database builder.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{BatchConfig, StackFailurePolicy};
use crate::core::record::Attribute;
use crate::core::writers::{read_json_store, write_record_csv, write_records, JsonStore};
use crate::processors::batch::run_batch;
use crate::processors::discovery::{find_all_dataset_files, find_dataset_files, list_datasets};
use crate::processors::headers::harmonize_files;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "doe-database")]
#[command(about = "Build a per-weld database from DOE Analysis and ParamCurrent exports", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List DOE folders under a data root
    Datasets {
        /// Directory containing one folder per DOE
        root: PathBuf,
    },

    /// Show the Analysis headers that hold data in every selected DOE
    Headers {
        /// Directory containing one folder per DOE
        root: PathBuf,
        /// DOE folders to check (defaults to all)
        #[arg(short, long)]
        datasets: Vec<String>,
    },

    /// Build the weld database
    Build {
        /// Directory containing one folder per DOE
        root: PathBuf,
        /// DOE folders to include (defaults to all)
        #[arg(short, long)]
        datasets: Vec<String>,
        /// Analysis headers to include
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Include every eligible header
        #[arg(long, conflicts_with = "headers")]
        all_headers: bool,
        /// Append the schedule current as a column
        #[arg(long)]
        include_schedule: bool,
        /// Only keep detail-mode welds, without offset correction or interpolation
        #[arg(long)]
        detail_mode_only: bool,
        /// Record column-stack failures as failed welds instead of stopping
        #[arg(long)]
        skip_stack_failures: bool,
        /// Output file (defaults to the configured name inside the data root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the records of a database file
    Inspect {
        /// Database file written by `build`
        file: PathBuf,
        /// Show only this record, e.g. "3, 1001"
        #[arg(short, long)]
        record: Option<String>,
        /// Export the selected record's matrix as CSV
        #[arg(long, requires = "record")]
        csv: Option<PathBuf>,
    },

    /// Write the effective configuration as YAML
    WriteConfig {
        /// Output YAML file
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    let result = match cli.command {
        Commands::Datasets { root } => cmd_datasets(&root, &config),
        Commands::Headers { root, datasets } => cmd_headers(&root, datasets, &config),
        Commands::Build {
            root,
            datasets,
            headers,
            all_headers,
            include_schedule,
            detail_mode_only,
            skip_stack_failures,
            output,
        } => {
            let options = BuildOptions {
                datasets,
                headers,
                all_headers,
                include_schedule,
                detail_mode_only,
                skip_stack_failures,
                output,
            };
            cmd_build(&root, options, &config)
        }
        Commands::Inspect { file, record, csv } => cmd_inspect(&file, record.as_deref(), csv),
        Commands::WriteConfig { output } => cmd_write_config(&output, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// All DOE folders when none are named.
fn resolve_datasets(root: &Path, datasets: Vec<String>) -> Result<Vec<String>> {
    if !datasets.is_empty() {
        return Ok(datasets);
    }
    let all = list_datasets(root)?;
    if all.is_empty() {
        bail!("No DOE folders found in {}", root.display());
    }
    Ok(all)
}

fn cmd_datasets(root: &Path, config: &PipelineConfig) -> Result<()> {
    let datasets = list_datasets(root)?;

    println!("DOE folders in {}:", root.display());
    let mut complete = 0;
    for name in &datasets {
        match find_dataset_files(root, name, &config.input) {
            Ok(_) => {
                complete += 1;
                println!("  {}", name);
            }
            Err(e) => println!("  {} ({})", name, e),
        }
    }

    print_summary(
        "Datasets",
        &[
            ("Root", root.display().to_string()),
            ("DOE folders", datasets.len().to_string()),
            ("With both exports", complete.to_string()),
        ],
    );
    Ok(())
}

fn cmd_headers(root: &Path, datasets: Vec<String>, config: &PipelineConfig) -> Result<()> {
    let datasets = resolve_datasets(root, datasets)?;
    let files = find_all_dataset_files(root, &datasets, &config.input)?;
    let eligible = harmonize_files(&files)?;

    println!("Headers with data in every selected DOE:");
    for header in &eligible {
        println!("  {}", header);
    }

    print_summary(
        "Headers",
        &[
            ("DOE folders", datasets.join(", ")),
            ("Eligible headers", eligible.len().to_string()),
        ],
    );
    Ok(())
}

struct BuildOptions {
    datasets: Vec<String>,
    headers: Vec<String>,
    all_headers: bool,
    include_schedule: bool,
    detail_mode_only: bool,
    skip_stack_failures: bool,
    output: Option<PathBuf>,
}

fn cmd_build(root: &Path, options: BuildOptions, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let datasets = resolve_datasets(root, options.datasets)?;
    let files = find_all_dataset_files(root, &datasets, &config.input)?;

    let headers = if options.all_headers {
        harmonize_files(&files)?
            .into_iter()
            .map(|h| h.name)
            .collect()
    } else {
        options.headers
    };
    if headers.is_empty() {
        bail!("No headers selected; pass --header or --all-headers");
    }

    let mut batch = BatchConfig::new(config)
        .with_datasets(datasets.iter().cloned())
        .with_headers(headers)
        .with_include_schedule(options.include_schedule)
        .with_detail_mode_only(options.detail_mode_only);
    if options.skip_stack_failures {
        batch = batch.with_stack_failure(StackFailurePolicy::SkipWeld);
    }

    let output = options
        .output
        .unwrap_or_else(|| root.join(&config.input.output_name));

    println!("Building weld database...");
    println!("Root: {}", root.display());
    println!("DOE folders: {}", datasets.join(", "));
    println!("Output: {}", output.display());

    let spinner = create_spinner("Loading and reconciling welds...");
    let result = match run_batch(&files, &batch) {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).context("Batch failed");
        }
    };

    spinner.set_message("Writing records...");
    let mut store = JsonStore::new(&output);
    let written = write_records(&mut store, &result.records, &batch.selected_headers);
    spinner.finish_and_clear();
    let written = written.with_context(|| format!("Failed to write {}", output.display()))?;

    for failure in &result.failures {
        println!("  {}", failure);
    }

    print_summary(
        "Database Build Complete",
        &[
            ("DOE folders", datasets.len().to_string()),
            ("Records written", written.to_string()),
            ("Failed welds", result.failures.len().to_string()),
            ("Skipped welds", result.skipped.to_string()),
            ("Output file", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    println!("{}", result.summary());

    if let Some(e) = result.halted {
        bail!("Stopped early: {}", e);
    }
    Ok(())
}

fn describe_attribute(attribute: &Attribute) -> String {
    match attribute {
        Attribute::Scalar { name, value } => format!("{} = {}", name, value),
        Attribute::HeaderList(headers) => format!("headers = [{}]", headers.join(", ")),
    }
}

fn cmd_inspect(file: &Path, record: Option<&str>, csv: Option<PathBuf>) -> Result<()> {
    let records =
        read_json_store(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let Some(name) = record else {
        for r in &records {
            println!("{}  ({} x {})", r.name, r.data.rows(), r.data.cols());
        }
        print_summary(
            "Database",
            &[
                ("File", file.display().to_string()),
                ("Records", records.len().to_string()),
            ],
        );
        return Ok(());
    };

    let Some(r) = records.iter().find(|r| r.name == name) else {
        bail!("No record named \"{}\" in {}", name, file.display());
    };

    println!("{}", r.name);
    for attribute in &r.attributes {
        println!("  {}", describe_attribute(attribute));
    }
    println!("  shape = {} x {}", r.data.rows(), r.data.cols());

    if let Some(path) = csv {
        write_record_csv(&path, r)
            .with_context(|| format!("Failed to export {}", path.display()))?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn cmd_write_config(output: &Path, config: &PipelineConfig) -> Result<()> {
    config
        .to_yaml(output)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote config to {}", output.display());
    Ok(())
}
