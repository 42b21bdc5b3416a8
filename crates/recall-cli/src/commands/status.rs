use crate::commands::common::{
    format_operation_lines, format_status_lines, open_session, status_to_item, CliContext,
};
use crate::error::CliError;

pub async fn run_status(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let session = open_session(ctx).await?;
    let dead_letters = session.engine.dead_letters().await.len();
    let item = status_to_item(&session.engine.status(), dead_letters);
    session.close();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        for line in format_status_lines(&item) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_pending(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let session = open_session(ctx).await?;
    let operations = session.engine.pending_operations().await;
    session.close();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&operations)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Nothing pending.");
        return Ok(());
    }
    for line in format_operation_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_dead_letters(clear: bool, ctx: &CliContext) -> Result<(), CliError> {
    let session = open_session(ctx).await?;
    let operations = if clear {
        session.engine.clear_dead_letters().await
    } else {
        session.engine.dead_letters().await
    };
    session.close();

    if operations.is_empty() {
        println!("No dead letters.");
        return Ok(());
    }
    for line in format_operation_lines(&operations) {
        println!("{line}");
    }
    if clear {
        println!("Cleared {} operation(s).", operations.len());
    }
    Ok(())
}
