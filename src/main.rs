// Entry point: load the admission table once, then run the report.
//
// - Tables go to stdout, logs to stderr (`RUST_LOG`, default `info`).
// - Charts are written as SVG files unless `--no-charts` is given.
// - Any failing step ends the run with a non-zero exit code.
mod charts;
mod cli;
mod error;
mod generator;
mod loader;
mod output;
mod reports;
mod stats;
mod types;
mod util;

use anyhow::{Context, Result};
use charts::ChartWriter;
use clap::Parser;
use cli::Cli;
use generator::ReportGenerator;
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let data = loader::load_dataset(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    println!(
        "Loaded {} rows from {}",
        util::format_int(data.len()),
        cli.input.display()
    );

    let charts = if cli.no_charts {
        None
    } else {
        Some(ChartWriter::new(&cli.chart_dir)?)
    };

    let mut report = ReportGenerator::new(data, charts, cli.head);
    report.run()?;

    if let Some(writer) = report.charts() {
        info!(
            "{} charts written to {}",
            writer.written().len(),
            cli.chart_dir.display()
        );
    }

    if let Some(path) = &cli.summary_json {
        output::write_json(path, &report.summary())
            .with_context(|| format!("writing {}", path.display()))?;
        println!("\nSummary written to {}", path.display());
    }
    Ok(())
}
