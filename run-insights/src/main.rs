// src/main.rs

//! Run a CloudWatch Logs Insights query, batched over a large input set when
//! one is supplied. All log output is written to a file under the shared log
//! directory; only results and the final summary go to the terminal.

use clap::Parser;
use eyre::Result;
use log::{debug, info};
use run_insights::{Cli, Config, OutputFormat, format_table, format_tsv};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let log_file_path = ops_core::init_file_logging("run-insights")?;
    info!("Logging to {}", log_file_path.display());

    let overall_start = Instant::now();
    let cli = Cli::parse();
    debug!("CLI options parsed: {:?}", cli);

    let config = Config::try_from(cli)?;
    let outcome = run_insights::run(&config).await?;

    match config.output {
        OutputFormat::Table => println!("{}", format_table(&outcome.rows)),
        OutputFormat::Tsv => print!("{}", format_tsv(&outcome.rows)),
    }

    println!(
        "{} row(s) from {} batch(es); {:.0} record(s) scanned, {:.0} matched",
        outcome.rows.len(),
        outcome.batches,
        outcome.stats.records_scanned,
        outcome.stats.records_matched,
    );

    info!("Total runtime: {:.2?}", overall_start.elapsed());

    if !outcome.fully_succeeded() {
        for f in &outcome.failures {
            eprintln!(
                "batch {} ({} input(s)) failed: {}",
                f.batch_index, f.inputs, f.error
            );
        }
        std::process::exit(1);
    }
    Ok(())
}
