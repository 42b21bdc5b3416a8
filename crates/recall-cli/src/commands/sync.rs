use recall_core::sync::ManualSyncReport;

use crate::commands::common::{open_session, CliContext};
use crate::error::CliError;

/// Pull remote changes, then push the queue.
pub async fn run_sync(ctx: &CliContext) -> Result<ManualSyncReport, CliError> {
    if !ctx.config.has_remote() {
        return Err(CliError::SyncNotConfigured);
    }

    let session = open_session(ctx).await?;
    let result = session.engine.manual_sync(&ctx.user_id).await;
    let remaining = session.engine.status().queue_length;
    session.close();

    let report = result?;
    println!(
        "Pulled {} record(s), merged {}",
        report.pulled.fetched, report.pulled.merged
    );
    match &report.flushed {
        Some(flushed) => println!(
            "Pushed {} operation(s), {} still pending",
            flushed.applied, remaining
        ),
        None => println!("Push skipped: another sync is running"),
    }
    Ok(report)
}
