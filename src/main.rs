use ceal_stats::cli;
use ceal_stats::error::CealResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ceal")]
#[command(about = "CEAL statistics survey: year-end exports and data maintenance")]
#[command(long_about = "CEAL Statistics - annual East Asian library survey tools

Works on snapshot files (.json, .yaml) written by ceal-server.

COMMANDS:
  export - Year-end Excel workbook, one worksheet per form
  recalc - Recompute every subtotal and total from the formula table
  audit  - Report stored totals that disagree with the formula table

EXAMPLES:
  ceal export ceal.json --year 2024 --form all
  ceal export ceal.json --year 2024 --form fiscal -o fiscal.xlsx
  ceal recalc ceal.json --dry-run
  ceal audit ceal.json --year 2024

The HTTP API is served by the separate ceal-server binary.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Export a survey year to Excel .xlsx format.

Each form with data becomes a worksheet: a title row, a two-level grouped
header, then one row per institution sorted by library name. Subtotals and
totals are recomputed before writing; stored derived values are ignored.

FORMS:
  monographic, volumeHoldings, serials, otherHoldings, unprocessed,
  fiscal, personnel, publicServices, electronic, electronicBooks, all

Fails when no institution reported the selected forms for the year.")]
    /// Export a survey year to Excel .xlsx
    Export {
        /// Snapshot file (.json, .yaml)
        input: PathBuf,

        /// Survey year
        #[arg(short, long)]
        year: i32,

        /// Form key or 'all'
        #[arg(short, long, default_value = "all")]
        form: String,

        /// Output path (defaults to CEAL_<year>_<form>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show verbose export steps
        #[arg(short, long)]
        verbose: bool,
    },

    /// Recompute all derived fields and write the snapshot back
    Recalc {
        /// Snapshot file (.json, .yaml)
        input: PathBuf,

        /// Preview changes without writing to file
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Report derived fields that disagree with the formula table
    Audit {
        /// Snapshot file (.json, .yaml)
        input: PathBuf,

        /// Only audit this survey year
        #[arg(short, long)]
        year: Option<i32>,
    },
}

fn main() -> CealResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            year,
            form,
            output,
            verbose,
        } => cli::export(input, year, form, output, verbose),

        Commands::Recalc { input, dry_run } => cli::recalc(input, dry_run),

        Commands::Audit { input, year } => cli::audit(input, year),
    }
}
