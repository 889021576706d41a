use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use loader::{PointsToAnalysisKind, Severity};

use crate::output::Format;
use crate::timeline::EventFormat;

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

fn parse_points_to(s: &str) -> Result<PointsToAnalysisKind, String> {
    s.parse()
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn parse_threads(s: &str) -> Result<usize, String> {
    let v: usize = s
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    if v == 0 {
        Err("threads must be greater than 0".into())
    } else {
        Ok(v)
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "undisposed - finds disposable fields that no disposal method releases",
    long_about = "undisposed reads a serialized program model (types, fields and method control flow graphs) \
and reports every field that holds a disposable object the declaring type created but never disposes.

Examples:
  undisposed scan model.json                      # Analyse one model file
  undisposed scan models/ --format sarif          # Analyse a directory of models
  undisposed explain model.json --type Acme.Pool  # Show how one type was decided
  undisposed inspect model.json --type Acme.Pool --method Dispose --format dot",
    subcommand_required = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Show version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse a model file or directory for undisposed fields
    Scan(ScanArgs),
    /// Print the control flow graph of one method
    Inspect(InspectArgs),
    /// Analyse one type and print the decision timeline
    Explain(ExplainArgs),
    /// Show or initialise the user configuration
    #[command(subcommand)]
    Config(ConfigCmd),
}

#[derive(ClapArgs)]
pub struct ScanArgs {
    /// Model file or directory of model files
    pub path: PathBuf,
    /// Analyzer configuration file (defaults to undisposed.yaml next to the models)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format for scan results
    #[arg(long, value_enum)]
    pub format: Option<Format>,
    /// Exit with error code if findings of this severity or higher are found
    #[arg(long = "fail-on", value_parser = parse_severity)]
    pub fail_on: Option<Severity>,
    /// Number of parallel threads to use for analysis
    #[arg(long, default_value_t = default_threads(), value_parser = parse_threads)]
    pub threads: usize,
    /// Overrides the points-to analysis kind of the configuration
    #[arg(long = "points-to-analysis-kind", value_parser = parse_points_to)]
    pub points_to_analysis_kind: Option<PointsToAnalysisKind>,
    /// Exclude symbols (`Name`, `Ns.Name`, `Prefix*`, `T:Ns.Name`)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
    /// Path to baseline file for comparison
    #[arg(long)]
    pub baseline: Option<PathBuf>,
    /// Write baseline file with current findings
    #[arg(long = "write-baseline")]
    pub write_baseline: Option<PathBuf>,
    /// Write engine metrics to a file, or to stderr with `-`
    #[arg(long)]
    pub metrics: Option<PathBuf>,
    /// Directory to store cache files
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
    /// Disable the result cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,
    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
    /// Suppress non-essential output
    #[arg(long)]
    pub quiet: bool,
}

/// Output formats for a method graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Json,
    Dot,
    Mermaid,
}

#[derive(ClapArgs)]
pub struct InspectArgs {
    /// Model file or directory of model files
    pub path: PathBuf,
    /// Declaring type, full or simple name
    #[arg(long = "type")]
    pub type_name: String,
    /// Method name
    #[arg(long)]
    pub method: String,
    /// Picks an overload by parameter count
    #[arg(long)]
    pub arity: Option<usize>,
    #[arg(long, value_enum, default_value_t = GraphFormat::Text)]
    pub format: GraphFormat,
}

#[derive(ClapArgs)]
pub struct ExplainArgs {
    /// Model file or directory of model files
    pub path: PathBuf,
    /// Type to analyse, full or simple name
    #[arg(long = "type")]
    pub type_name: String,
    /// Analyzer configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = EventFormat::Text)]
    pub format: EventFormat,
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print the effective user configuration
    Show,
    /// Print the location of the user configuration file
    Path,
    /// Write a default user configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
