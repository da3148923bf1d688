use clap::Parser;
use std::path::PathBuf;

/// Descriptive statistics and charts for the university-admission exam table.
#[derive(Parser, Debug, Clone)]
#[command(name = "admission_report")]
#[command(version)]
pub struct Cli {
    /// Input CSV (header row first)
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "processed_dulieuxettuyendaihoc.csv"
    )]
    pub input: PathBuf,

    /// Directory the SVG charts are written to
    #[arg(long, value_name = "DIR", default_value = "charts")]
    pub chart_dir: PathBuf,

    /// Print the tables only
    #[arg(long)]
    pub no_charts: bool,

    /// Also write a JSON summary of the run
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Rows shown after deriving the T1 bands
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub head: usize,
}
