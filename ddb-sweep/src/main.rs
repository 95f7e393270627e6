// src/main.rs

//! Scan a DynamoDB table and count, delete, or update the matching items.
//! Mutating actions refuse to run without --apply. All log output is
//! written to a file under the shared log directory.

use clap::Parser;
use ddb_sweep::{Cli, Config, SweepOutcome, format_outcome};
use eyre::Result;
use log::{debug, info};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let log_file_path = ops_core::init_file_logging("ddb-sweep")?;
    info!("Logging to {}", log_file_path.display());

    let overall_start = Instant::now();
    let cli = Cli::parse();
    debug!("CLI options parsed: {:?}", cli);

    let config = Config::try_from(cli)?;
    let outcome = ddb_sweep::run(&config).await?;
    println!("{}", format_outcome(&outcome));

    info!("Total runtime: {:.2?}", overall_start.elapsed());

    if let SweepOutcome::Applied(report) = &outcome {
        if report.failed > 0 {
            std::process::exit(1);
        }
    }
    Ok(())
}
