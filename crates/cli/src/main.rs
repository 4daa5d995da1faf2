//! `colsync` — reconcile two tables by a shared key column.

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use colsync_recon::{JobConfig, Mode, ReconOptions, RowRange, Selection, TargetColumn};
use colsync_table::Table;

use exit_codes::{
    EXIT_ARGS_ERROR, EXIT_AUDIT_MISMATCH, EXIT_CONFIG_ERROR, EXIT_IO_ERROR, EXIT_SUCCESS,
};

#[derive(Parser)]
#[command(
    name = "colsync",
    version,
    about = "Copy or audit a value column between two tables matched by key"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the source value column into the target wherever keys match
    #[command(after_help = "\
Examples:
  colsync update a.xlsx b.xlsx --key ID --value Status --source-value Status
  colsync update a.xlsx b.csv --key ID --create-column --source-key id --source-value status
  colsync update a.xlsx b.xlsx --key ID --value Status --source-value Status --start-row 2 --end-row 100")]
    Update {
        /// Target table (the one that gets written)
        target: PathBuf,
        /// Source table (values are read from here)
        source: PathBuf,

        /// Key column in the target
        #[arg(long)]
        key: String,
        /// Target column to write into
        #[arg(long)]
        value: Option<String>,
        /// Create a new column next to the key instead of writing an existing one
        #[arg(long)]
        create_column: bool,
        /// Key column in the source (defaults to --key)
        #[arg(long)]
        source_key: Option<String>,
        /// Source column values are copied from
        #[arg(long)]
        source_value: String,

        /// First data row to touch (1-based, inclusive)
        #[arg(long)]
        start_row: Option<usize>,
        /// Last data row to touch (1-based, inclusive)
        #[arg(long)]
        end_row: Option<usize>,
        /// Never overwrite target cells that already hold data
        #[arg(long)]
        skip_filled: bool,

        /// Where to write the updated table (default: <target>_updated.xlsx)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,
        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare a target column against the source without writing anything
    #[command(after_help = "\
Examples:
  colsync audit a.xlsx b.xlsx --key ID --value Status --source-value Status
  colsync audit a.csv b.csv --key id --value total --source-key id --source-value total --json")]
    Audit {
        target: PathBuf,
        source: PathBuf,

        /// Key column in the target
        #[arg(long)]
        key: String,
        /// Target column to compare
        #[arg(long)]
        value: String,
        /// Key column in the source (defaults to --key)
        #[arg(long)]
        source_key: Option<String>,
        /// Source column compared against
        #[arg(long)]
        source_value: String,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,
        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a reconciliation job described in a TOML file
    #[command(after_help = "\
Examples:
  colsync run nightly.toml
  colsync run nightly.toml --json")]
    Run {
        config: PathBuf,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,
        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a job config without running it
    Validate { config: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Update {
            target,
            source,
            key,
            value,
            create_column,
            source_key,
            source_value,
            start_row,
            end_row,
            skip_filled,
            out,
            json,
            output,
        } => cmd_update(UpdateArgs {
            target,
            source,
            key,
            value,
            create_column,
            source_key,
            source_value,
            start_row,
            end_row,
            skip_filled,
            out,
            json,
            output,
        }),
        Commands::Audit {
            target,
            source,
            key,
            value,
            source_key,
            source_value,
            json,
            output,
        } => cmd_audit(target, source, key, value, source_key, source_value, json, output),
        Commands::Run { config, json, output } => cmd_run(config, json, output),
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {hint}");
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ARGS_ERROR, message: msg.into(), hint: None }
    }

    fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO_ERROR, message: msg.into(), hint: None }
    }

    fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG_ERROR, message: msg.into(), hint: None }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

struct UpdateArgs {
    target: PathBuf,
    source: PathBuf,
    key: String,
    value: Option<String>,
    create_column: bool,
    source_key: Option<String>,
    source_value: String,
    start_row: Option<usize>,
    end_row: Option<usize>,
    skip_filled: bool,
    out: Option<PathBuf>,
    json: bool,
    output: Option<PathBuf>,
}

fn load(path: &Path) -> Result<Table, CliError> {
    colsync_io::load_table(path).map_err(CliError::io)
}

fn job_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn row_range(start: Option<usize>, end: Option<usize>, rows: usize) -> Option<RowRange> {
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(RowRange {
        start: start.unwrap_or(1),
        end: end.unwrap_or(rows),
    })
}

fn emit_report(
    report: &colsync_recon::ReconReport,
    json: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(path) = output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }
    if json {
        println!("{json_str}");
    }
    Ok(())
}

fn cmd_update(args: UpdateArgs) -> Result<(), CliError> {
    let target_value = match (&args.value, args.create_column) {
        (Some(name), false) => TargetColumn::Existing(name.clone()),
        (None, true) => TargetColumn::CreateAfterKey,
        (Some(_), true) => {
            return Err(CliError::args("--value and --create-column are mutually exclusive"))
        }
        (None, false) => {
            return Err(CliError::args("select a target column")
                .with_hint("pass --value <column> or --create-column"))
        }
    };

    let target = load(&args.target)?;
    let source = load(&args.source)?;

    let selection = Selection {
        target_key: args.key.clone(),
        target_value,
        source_key: args.source_key.unwrap_or_else(|| args.key.clone()),
        source_value: args.source_value,
    };
    let options = ReconOptions {
        row_range: row_range(args.start_row, args.end_row, target.rows.len()),
        skip_if_filled: args.skip_filled,
    };

    let report = colsync_recon::run(
        &job_name(&args.target),
        Mode::Update,
        &target,
        &source,
        &selection,
        &options,
    )
    .map_err(|e| CliError::args(e.to_string()))?;

    if let Some(outcome) = report.as_update() {
        let out_path = args
            .out
            .clone()
            .unwrap_or_else(|| colsync_io::xlsx::updated_output_path(&args.target));
        colsync_io::save_table(&outcome.table, &out_path).map_err(CliError::io)?;

        eprintln!(
            "update: {} cell(s) written, {} source key(s) not found in target",
            outcome.writes,
            outcome.not_found_keys.len(),
        );
        eprintln!("wrote {}", out_path.display());
    }

    emit_report(&report, args.json, args.output.as_deref())
}

#[allow(clippy::too_many_arguments)]
fn cmd_audit(
    target_path: PathBuf,
    source_path: PathBuf,
    key: String,
    value: String,
    source_key: Option<String>,
    source_value: String,
    json: bool,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let target = load(&target_path)?;
    let source = load(&source_path)?;

    let selection = Selection {
        target_key: key.clone(),
        target_value: TargetColumn::Existing(value),
        source_key: source_key.unwrap_or(key),
        source_value,
    };

    let report = colsync_recon::run(
        &job_name(&target_path),
        Mode::Audit,
        &target,
        &source,
        &selection,
        &ReconOptions::default(),
    )
    .map_err(|e| CliError::args(e.to_string()))?;

    let mut clean = true;
    if let Some(outcome) = report.as_audit() {
        eprintln!(
            "audit: {} matched, {} mismatched, {} source key(s) not found in target",
            outcome.matches,
            outcome.mismatches,
            outcome.not_found_keys.len(),
        );
        print_mismatches(outcome);
        clean = outcome.mismatches == 0 && outcome.not_found_keys.is_empty();
    }

    emit_report(&report, json, output.as_deref())?;

    if clean {
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_AUDIT_MISMATCH,
            message: String::new(),
            hint: None,
        })
    }
}

const MISMATCH_PREVIEW: usize = 20;

/// Per-mismatch detail lines on stderr: the disagreeing values plus the
/// row's other columns for orientation.
fn print_mismatches(outcome: &colsync_recon::model::AuditOutcome) {
    let context = colsync_recon::report::inspect_columns(&outcome.headers, &outcome.target_column);
    for entry in outcome.mismatched.iter().take(MISMATCH_PREVIEW) {
        let ctx: Vec<String> = context
            .iter()
            .filter_map(|name| {
                let i = outcome.headers.iter().position(|h| h == name)?;
                entry.row.get(i).map(|cell| format!("{name}={cell}"))
            })
            .collect();
        eprintln!(
            "  {}: target '{}' != source '{}' ({})",
            entry.key,
            entry.target_value,
            entry.source_value,
            ctx.join(", "),
        );
    }
    if outcome.mismatched.len() > MISMATCH_PREVIEW {
        eprintln!("  ... and {} more", outcome.mismatched.len() - MISMATCH_PREVIEW);
    }
    for key in &outcome.not_found_keys {
        eprintln!("  not found in target: {key}");
    }
}

fn cmd_run(config_path: PathBuf, json: bool, output: Option<PathBuf>) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;
    let config = JobConfig::from_toml(&config_str).map_err(|e| CliError::config(e.to_string()))?;

    // File paths resolve relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let target_path = base_dir.join(&config.target.file);
    let source_path = base_dir.join(&config.source.file);

    let target = load(&target_path)?;
    let source = load(&source_path)?;

    let report = colsync_recon::run(
        &config.name,
        config.mode,
        &target,
        &source,
        &config.selection(),
        &config.recon_options(),
    )
    .map_err(|e| CliError::args(e.to_string()))?;

    let mut audit_failed = false;
    match &report.outcome {
        colsync_recon::model::Outcome::Update(outcome) => {
            let out_path = colsync_io::xlsx::updated_output_path(&target_path);
            colsync_io::save_table(&outcome.table, &out_path).map_err(CliError::io)?;
            eprintln!(
                "update '{}': {} cell(s) written, {} source key(s) not found",
                config.name,
                outcome.writes,
                outcome.not_found_keys.len(),
            );
            eprintln!("wrote {}", out_path.display());
        }
        colsync_recon::model::Outcome::Audit(outcome) => {
            eprintln!(
                "audit '{}': {} matched, {} mismatched, {} source key(s) not found",
                config.name,
                outcome.matches,
                outcome.mismatches,
                outcome.not_found_keys.len(),
            );
            print_mismatches(outcome);
            audit_failed = outcome.mismatches > 0 || !outcome.not_found_keys.is_empty();
        }
    }

    emit_report(&report, json, output.as_deref())?;

    if audit_failed {
        return Err(CliError {
            code: EXIT_AUDIT_MISMATCH,
            message: String::new(),
            hint: None,
        });
    }
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;
    match JobConfig::from_toml(&config_str) {
        Ok(config) => {
            eprintln!(
                "valid: {} job '{}' ({} -> {})",
                config.mode, config.name, config.source.file, config.target.file,
            );
            Ok(())
        }
        Err(e) => Err(CliError::config(e.to_string())),
    }
}
