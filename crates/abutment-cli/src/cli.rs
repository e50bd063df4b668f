use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "abut - plans multi-isocenter treatments across two abutting patient setups: isocenter layout, graduated junction shells, dose feathering and the summed dose.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lay out isocenters, build the junction shells and order the optimizations.
    Plan(CaseArgs),
    /// Plan, optimize, feather and sum the dose of both frames on the in-memory backend.
    Run(RunArgs),
}

/// Arguments shared by every subcommand that works on a case file.
#[derive(Args, Debug, Clone)]
pub struct CaseArgs {
    /// Path to the case description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub case: PathBuf,

    /// Directory the CSV reports are written to.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output: PathBuf,

    // --- Layout Overrides ---
    /// Override the field width in cm.
    #[arg(long, value_name = "CM")]
    pub field_width: Option<f64>,

    /// Override the minimum overlap between adjacent fields in cm, for both frames.
    #[arg(long, value_name = "CM")]
    pub min_overlap: Option<f64>,

    /// Override the width of the junction shared by the two frames in cm.
    #[arg(long, value_name = "CM")]
    pub frame_overlap: Option<f64>,

    // --- Junction Overrides ---
    /// Override the number of graduated shells per junction.
    #[arg(long, value_name = "INT")]
    pub levels: Option<u32>,

    /// Set a specific configuration value, overriding the case file.
    /// Can be used multiple times. Example: -S plan.field-width=38
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub case: CaseArgs,

    // --- Feathering Overrides ---
    /// Override the distance in percent between a shell level and its band thresholds.
    #[arg(long, value_name = "PERCENT")]
    pub threshold_step: Option<u32>,

    /// Override the smallest band kept, in cc.
    #[arg(long, value_name = "CC")]
    pub min_band_volume: Option<f64>,
}
