//! One-shot sync cycle handlers

use crate::cli::SyncCommands;
use crate::sync::ItemResult;
use crate::AppConfig;
use crate::CycleReport;
use crate::Result;
use crate::TrustSync;

pub async fn handle_sync_command(config: &AppConfig, command: SyncCommands) -> Result<()> {
    let service = TrustSync::new(config)?;

    let outcome = match command {
        SyncCommands::Publish { since } => service.run_publish_cycle(since).await,
        SyncCommands::Harvest { since } => service.run_harvest_cycle(since).await,
    };
    service.shutdown().await;

    print_report(&outcome?);
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("Sync {} since {}", report.direction, report.since.to_rfc3339());
    println!("==============================================\n");

    if report.outcomes.is_empty() {
        println!("Nothing to sync.");
    }
    for outcome in &report.outcomes {
        match &outcome.result {
            ItemResult::Synced => println!("  ok      {}  {}", outcome.timestamp.to_rfc3339(), outcome.key),
            ItemResult::Failed(reason) => println!(
                "  failed  {}  {}: {}",
                outcome.timestamp.to_rfc3339(),
                outcome.key,
                reason
            ),
        }
    }

    println!("\n{}", report.summary());
}
