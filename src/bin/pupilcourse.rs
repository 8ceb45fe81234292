//! Pupilcourse CLI - Command-line interface for the pupil time-course engine
//!
//! Commands:
//! - analyze: Process recording files into a combined time-series and summary table
//! - validate: Parse input files and report what the analysis would see
//! - config: Print the default configuration as JSON

use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pupilcourse::config::AnalysisConfig;
use pupilcourse::io::{read_samples, TimeSeriesWriter};
use pupilcourse::pipeline::analyze_samples;
use pupilcourse::windows::ConditionPools;
use pupilcourse::ENGINE_VERSION;

/// Pupilcourse - pupil time-course analysis for visual working-memory recordings
#[derive(Parser)]
#[command(name = "pupilcourse")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Transform eye-tracker recordings into pupil response measures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process recording files into a combined time-series and summary table
    Analyze {
        /// Input CSV file, or a directory of CSV files (use - for stdin);
        /// falls back to the config file's input_directory
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Combined time-series output path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Per-trial summary output path
        #[arg(short, long)]
        summary: Option<PathBuf>,

        /// Configuration file (JSON); command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bucket width in milliseconds
        #[arg(long)]
        time_step: Option<u32>,

        /// Smooth bucket averages with a rolling window
        #[arg(long)]
        rolling: bool,

        /// Rolling window span in milliseconds
        #[arg(long)]
        rolling_window: Option<u32>,

        /// Emit one row per sample instead of bucketing
        #[arg(long)]
        no_bucketing: bool,

        /// Original columns to keep in the output (comma-separated 0-based
        /// indices); all columns are kept when omitted
        #[arg(long)]
        columns: Option<String>,
    },

    /// Parse input files and report what the analysis would see
    Validate {
        /// Input CSV file, or a directory of CSV files (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PupilCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            summary,
            config,
            time_step,
            rolling,
            rolling_window,
            no_bucketing,
            columns,
        } => cmd_analyze(
            input.as_deref(),
            &output,
            summary.as_deref(),
            config.as_deref(),
            time_step,
            rolling,
            rolling_window,
            no_bucketing,
            columns.as_deref(),
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Config => cmd_config(),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: Option<&Path>,
    output: &Path,
    summary: Option<&Path>,
    config_path: Option<&Path>,
    time_step: Option<u32>,
    rolling: bool,
    rolling_window: Option<u32>,
    no_bucketing: bool,
    columns: Option<&str>,
) -> Result<(), PupilCliError> {
    let mut config = load_config(config_path)?;

    if let Some(step) = time_step {
        config.time_step_ms = step;
    }
    if rolling {
        config.use_rolling_average = true;
    }
    if let Some(window) = rolling_window {
        config.rolling_window_ms = window;
    }
    if no_bucketing {
        config.bucketing_enabled = false;
    }
    if let Some(spec) = columns {
        config.output_columns = Some(parse_columns(spec)?);
    }
    config.validate()?;

    let input = input
        .or(config.input_directory.as_deref())
        .ok_or(PupilCliError::NoInputFiles)?;
    let inputs = discover_inputs(input)?;
    if inputs.is_empty() {
        return Err(PupilCliError::NoInputFiles);
    }

    let selection = config.output_columns.clone();
    let mut pools = ConditionPools::default();
    let mut summaries = Vec::new();
    let mut total_rows = 0usize;

    let stdout_output = output.to_string_lossy() == "-";
    let writer: Box<dyn io::Write> = if stdout_output {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(output)?)
    };
    let mut series_writer = TimeSeriesWriter::new(writer, selection);

    for source in &inputs {
        let parsed = match source {
            InputSource::Stdin => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                read_samples(buffer.as_bytes(), &config)?
            }
            InputSource::File(path) => {
                eprintln!("analyzing {}", path.display());
                read_samples(fs::File::open(path)?, &config)?
            }
        };

        let analysis = analyze_samples(&parsed.samples, &config);
        if analysis.is_empty() {
            eprintln!("  no analyzable trials, skipping");
            continue;
        }

        series_writer.write_headers(&parsed.headers)?;
        series_writer.write_rows(&analysis.rows)?;
        total_rows += analysis.rows.len();

        pools.set_bias.extend(&analysis.pools.set_bias);
        pools.no_set_bias.extend(&analysis.pools.no_set_bias);
        pools.span3_encoding.extend(&analysis.pools.span3_encoding);
        pools.span12_encoding.extend(&analysis.pools.span12_encoding);
        summaries.extend(analysis.summaries);
    }
    series_writer.finish()?;

    if let Some(summary_path) = summary {
        pupilcourse::io::write_summary(fs::File::create(summary_path)?, &summaries)?;
    }

    eprintln!(
        "wrote {} rows across {} trials from {} file(s)",
        total_rows,
        summaries.len(),
        inputs.len()
    );
    report_pool(&pools.set_bias, "SET fix3 bias");
    report_pool(&pools.no_set_bias, "noSET fix3 bias");
    report_pool(&pools.span3_encoding, "span3 encoding");
    report_pool(&pools.span12_encoding, "span1/2 encoding");

    Ok(())
}

fn report_pool(pool: &[f64], label: &str) {
    match ConditionPools::mean_of(pool) {
        Some(mean) => eprintln!("  {}: mean {:.4} over {} buckets", label, mean, pool.len()),
        None => eprintln!("  {}: no qualifying buckets", label),
    }
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PupilCliError> {
    if input.to_string_lossy() == "-" && atty::is(atty::Stream::Stdin) {
        eprintln!("reading from terminal; pipe a CSV file or pass a path");
    }

    let config = AnalysisConfig::default();
    let inputs = discover_inputs(input)?;
    if inputs.is_empty() {
        return Err(PupilCliError::NoInputFiles);
    }

    let mut files = Vec::new();
    for source in &inputs {
        let (name, parsed) = match source {
            InputSource::Stdin => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                ("<stdin>".to_string(), read_samples(buffer.as_bytes(), &config)?)
            }
            InputSource::File(path) => (
                path.display().to_string(),
                read_samples(fs::File::open(path)?, &config)?,
            ),
        };

        let mut trials = BTreeSet::new();
        let mut tagged = 0usize;
        for sample in &parsed.samples {
            trials.insert(sample.trial_id);
            if sample.tag.is_some() {
                tagged += 1;
            }
        }
        files.push(FileReport {
            file: name,
            columns: parsed.headers.len(),
            samples: parsed.samples.len(),
            tagged_samples: tagged,
            trials: trials.len(),
        });
    }

    let report = ValidationReport {
        version: ENGINE_VERSION.to_string(),
        files,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        for file in &report.files {
            println!(
                "{}: {} columns, {} samples ({} tagged), {} trials",
                file.file, file.columns, file.samples, file.tagged_samples, file.trials
            );
        }
    }

    let empty = report.files.iter().filter(|f| f.samples == 0).count();
    if empty > 0 {
        Err(PupilCliError::ValidationFailed(empty))
    } else {
        Ok(())
    }
}

fn cmd_config() -> Result<(), PupilCliError> {
    println!("{}", AnalysisConfig::default().to_json()?);
    Ok(())
}

// Helper functions

enum InputSource {
    Stdin,
    File(PathBuf),
}

/// Resolve the input argument: `-` is stdin, a directory expands to its
/// CSV files in name order, anything else is taken as a single file.
fn discover_inputs(input: &Path) -> Result<Vec<InputSource>, PupilCliError> {
    if input.to_string_lossy() == "-" {
        return Ok(vec![InputSource::Stdin]);
    }
    if input.is_dir() {
        let mut paths: Vec<PathBuf> = fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        return Ok(paths.into_iter().map(InputSource::File).collect());
    }
    Ok(vec![InputSource::File(input.to_path_buf())])
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, PupilCliError> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Ok(AnalysisConfig::from_json(&content)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_columns(spec: &str) -> Result<BTreeSet<usize>, PupilCliError> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| PupilCliError::BadColumnSpec(part.to_string()))
        })
        .collect()
}

// Error types

#[derive(Debug)]
enum PupilCliError {
    Io(io::Error),
    Analysis(pupilcourse::AnalysisError),
    Json(serde_json::Error),
    NoInputFiles,
    BadColumnSpec(String),
    ValidationFailed(usize),
}

impl From<io::Error> for PupilCliError {
    fn from(e: io::Error) -> Self {
        PupilCliError::Io(e)
    }
}

impl From<pupilcourse::AnalysisError> for PupilCliError {
    fn from(e: pupilcourse::AnalysisError) -> Self {
        PupilCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for PupilCliError {
    fn from(e: serde_json::Error) -> Self {
        PupilCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PupilCliError> for CliError {
    fn from(e: PupilCliError) -> Self {
        match e {
            PupilCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PupilCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pupilcourse validate' on the input".to_string()),
            },
            PupilCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PupilCliError::NoInputFiles => CliError {
                code: "NO_INPUT_FILES".to_string(),
                message: "No CSV files found in input".to_string(),
                hint: Some(
                    "Pass -i with a CSV file or directory, or set input_directory in the config"
                        .to_string(),
                ),
            },
            PupilCliError::BadColumnSpec(part) => CliError {
                code: "BAD_COLUMN_SPEC".to_string(),
                message: format!("'{}' is not a column index", part),
                hint: Some("Use comma-separated 0-based indices, e.g. --columns 2,25,28".to_string()),
            },
            PupilCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} file(s) contained no analyzable samples", count),
                hint: Some("Check the Exp phase marker and validated pupil column".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    version: String,
    files: Vec<FileReport>,
}

#[derive(serde::Serialize)]
struct FileReport {
    file: String,
    columns: usize,
    samples: usize,
    tagged_samples: usize,
    trials: usize,
}
