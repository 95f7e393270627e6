// src/main.rs

//! Reconcile the team's operations role across the resolved account fleet
//! (or just print the fleet with --list). Mutations only happen with
//! --apply; the default run prints the per-account plan. All log output is
//! written to a file under the shared log directory.

use clap::Parser;
use eyre::Result;
use log::{debug, info};
use std::time::Instant;
use sync_roles::{Cli, Config, Mode, format_account, format_report};

#[tokio::main]
async fn main() -> Result<()> {
    let log_file_path = ops_core::init_file_logging("sync-roles")?;
    info!("Logging to {}", log_file_path.display());

    let overall_start = Instant::now();
    let cli = Cli::parse();
    debug!("CLI options parsed: {:?}", cli);

    let config = Config::try_from(cli)?;

    match config.mode {
        Mode::List => {
            println!("PURPOSE\tREGION\tACCOUNT\tEMAIL");
            for account in sync_roles::list_accounts(&config).await? {
                println!("{}", format_account(&account));
            }
        }
        Mode::Plan | Mode::Apply => {
            let reports = sync_roles::reconcile(&config).await?;
            for report in &reports {
                println!("{}", format_report(report));
            }
            let failures = reports.iter().filter(|r| r.error.is_some()).count();
            if failures > 0 {
                eprintln!("{failures} account(s) failed");
                std::process::exit(1);
            }
        }
    }

    info!("Total runtime: {:.2?}", overall_start.elapsed());
    Ok(())
}
