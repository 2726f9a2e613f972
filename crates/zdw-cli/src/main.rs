/// ZDW command-line tool: unconvert, describe, validate and summarise
/// `.zdw` archives (raw, gzip or zstd wrapped).
///
/// # Command overview
///
/// ```text
/// zdw <COMMAND> [OPTIONS] <FILES>...
///
/// Commands:
///   unconvert  Decode rows into <basename>.sql and <basename>.desc.sql
///   desc       Write only the desc file
///   validate   Decode every row and discard it
///   stats      Print header information without decoding rows
///   help       Print help information
///
/// Global options:
///   -q, --quiet      Only report errors
///   --status         Log per-block progress
///   -v, --verbose    Log decoder internals
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// A file named `-` is read from stdin.
///
/// # Exit codes
///
/// Every input is attempted. The exit status is the result code of the
/// first input that failed, 0 when all succeed:
///
/// | Code | Meaning                  | Code | Meaning               |
/// |------|--------------------------|------|-----------------------|
/// | 0    | Success                  | 9    | Corrupted data        |
/// | 2    | Read failed              | 12   | At end of file        |
/// | 3    | Could not create output  | 13   | Bad requested column  |
/// | 4    | Could not open input     | 14   | No columns to output  |
/// | 5    | Unsupported version      | 15   | Processing error      |
/// | 6    | Data after last block    | 16   | Unsupported operation |
/// | 7    | Unexpected column type   |      |                       |
///
/// Each failure is reported on stderr as
/// `zdw: <code text>: <file>: <detail>`.
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zdw_decoder::{DecodeEngine, DecodeError, ErrCode, InclusionRule};
use zdw_output::{ColumnSelection, OutputConfig, UnconvertOptions, DEFAULT_EXTENSION};

mod cmd_desc;
mod cmd_stats;
mod cmd_unconvert;
mod cmd_validate;

/// Input name that selects stdin.
const STDIN_ARG: &str = "-";

// ── CLI root ──────────────────────────────────────────────────────────────────

/// The ZDW command-line tool.
#[derive(Parser)]
#[command(name = "zdw", version, about = "Decode ZDW columnar archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log per-block progress.
    #[arg(long, global = true)]
    status: bool,

    /// Log decoder internals (block headers, dictionary sizes).
    #[arg(short, long, global = true)]
    verbose: bool,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Decode rows into a data file and a desc file.
    Unconvert(UnconvertArgs),
    /// Write only the desc file.
    Desc(UnconvertArgs),
    /// Decode every row and discard it.
    Validate(InputArgs),
    /// Print header information without decoding rows.
    Stats(StatsArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Column inclusion rule for `--rule`.
///
/// ```text
/// ┌─────────┬────────────────────────────────────────────────┐
/// │ Value   │ Effect of an unknown name in --columns         │
/// ├─────────┼────────────────────────────────────────────────┤
/// │ fail    │ the file fails with BadRequestedColumn         │
/// │ skip    │ the name is dropped                            │
/// │ exclude │ --columns lists the columns to leave out       │
/// │ pad     │ the name is emitted as an empty column         │
/// └─────────┴────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum RuleArg {
    #[default]
    Fail,
    Skip,
    Exclude,
    Pad,
}

impl From<RuleArg> for InclusionRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::Fail => Self::FailOnInvalidColumn,
            RuleArg::Skip => Self::SkipInvalidColumn,
            RuleArg::Exclude => Self::ExcludeSpecifiedColumns,
            RuleArg::Pad => Self::ProvideEmptyMissingColumns,
        }
    }
}

/// Inputs and column selection shared by every decoding command.
#[derive(clap::Args)]
pub struct InputArgs {
    /// ZDW files to read; `-` reads stdin.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Comma-separated output columns, in output order.
    #[arg(short, long)]
    pub columns: Option<String>,

    /// How names in `--columns` are interpreted.
    #[arg(long, value_enum, default_value_t = RuleArg::Fail)]
    pub rule: RuleArg,
}

impl InputArgs {
    pub fn selection(&self) -> ColumnSelection {
        match &self.columns {
            Some(csv) => ColumnSelection::from_csv(csv, self.rule.into()),
            None => ColumnSelection {
                columns: None,
                rule: self.rule.into(),
            },
        }
    }
}

/// Arguments for `zdw unconvert` and `zdw desc`.
///
/// ```text
/// ┌──────────────────────┬──────────────────────────────────────────────┐
/// │ Flag                 │ Effect                                       │
/// ├──────────────────────┼──────────────────────────────────────────────┤
/// │ -o/--output-basename │ basename of the output files                 │
/// │ --ext                │ output extension (default sql)               │
/// │ -d/--dir             │ output directory (default .)                 │
/// │ --stdout             │ rows (or the desc) go to stdout              │
/// │ --ordered            │ route rows through the reorder buffer        │
/// └──────────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct UnconvertArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Basename of the output files (defaults to the input's base name).
    #[arg(short, long)]
    pub output_basename: Option<String>,

    /// Extension of the data and desc files.
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub ext: String,

    /// Directory receiving the output files.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Write to stdout instead of files.
    #[arg(long)]
    pub stdout: bool,

    /// Emit rows through the sequence-ordered sink.
    #[arg(long)]
    pub ordered: bool,
}

impl UnconvertArgs {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            output_basename: self.output_basename.clone(),
            extension: self.ext.clone(),
            output_dir: self.dir.clone(),
            to_stdout: self.stdout,
            ordered: self.ordered,
            ..OutputConfig::default()
        }
    }
}

/// Arguments for `zdw stats`.
#[derive(clap::Args)]
pub struct StatsArgs {
    /// ZDW files to summarise; `-` reads stdin.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print one JSON document per file.
    #[arg(long)]
    pub json: bool,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Open `path` as a decode engine; `-` selects stdin.
pub fn open_engine(path: &Path) -> Result<DecodeEngine, DecodeError> {
    if path.as_os_str() == STDIN_ARG {
        DecodeEngine::stdin()
    } else {
        DecodeEngine::open(path)
    }
}

/// Run `per_file` over every input, reporting each failure on stderr.
///
/// Returns the first failure once all inputs were attempted.
pub fn for_each_input(
    files: &[PathBuf],
    mut per_file: impl FnMut(&Path) -> Result<()>,
) -> Result<()> {
    let mut first_failure = None;
    for path in files {
        debug!(file = %path.display(), "processing input");
        if let Err(e) = per_file(path) {
            eprintln!(
                "zdw: {}: {}: {}",
                exit_code(&e).text(),
                path.display(),
                e.root_cause()
            );
            first_failure.get_or_insert(e);
        }
    }
    first_failure.map_or(Ok(()), Err)
}

/// Result code for a failed run: the decoder's code when the chain holds a
/// [`DecodeError`], otherwise `ProcessingError`.
fn exit_code(e: &anyhow::Error) -> ErrCode {
    e.downcast_ref::<DecodeError>()
        .map_or(ErrCode::ProcessingError, DecodeError::code)
}

fn unconvert_options(cli: &Cli) -> UnconvertOptions {
    UnconvertOptions {
        show_status: cli.status,
        quiet: cli.quiet,
        ..UnconvertOptions::default()
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.status {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let options = unconvert_options(&cli);

    let result = match &cli.command {
        Commands::Unconvert(args) => cmd_unconvert::run(args, options),
        Commands::Desc(args) => cmd_desc::run(args, options),
        Commands::Validate(args) => cmd_validate::run(args, options),
        Commands::Stats(args) => cmd_stats::run(args),
    };

    if let Err(e) = result {
        process::exit(i32::from(exit_code(&e).value()));
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rule_values_map_to_inclusion_rules() {
        let cli = Cli::parse_from(["zdw", "unconvert", "--rule", "pad", "-c", "a,b", "x.zdw"]);
        let Commands::Unconvert(args) = cli.command else {
            panic!("expected unconvert");
        };
        let selection = args.input.selection();
        assert_eq!(selection.rule, InclusionRule::ProvideEmptyMissingColumns);
        assert_eq!(selection.columns, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(args.output_config().extension, "sql");
    }

    #[test]
    fn exit_code_survives_context() {
        let err = Err::<(), _>(DecodeError::NoColumnsToOutput)
            .context("while writing")
            .unwrap_err();
        assert_eq!(exit_code(&err), ErrCode::NoColumnsToOutput);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), ErrCode::ProcessingError);
    }

    #[test]
    fn first_failure_is_returned_after_all_inputs() {
        let files = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];
        let mut seen = Vec::new();
        let result = for_each_input(&files, |path| {
            seen.push(path.to_path_buf());
            match path.to_str() {
                Some("a") => Err(DecodeError::AtEndOfFile.into()),
                Some("b") => Err(DecodeError::HeaderNotReadYet.into()),
                _ => Ok(()),
            }
        });
        assert_eq!(seen.len(), 3);
        assert_eq!(exit_code(&result.unwrap_err()), ErrCode::AtEndOfFile);
    }
}
