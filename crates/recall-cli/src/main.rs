//! Recall CLI - capture notes offline and sync them when you choose to
//!
//! Every write lands in the local database and the durable operation queue
//! first; `recall sync` pulls remote changes and pushes the queue.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use recall_core::SyncConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::card::run_card;
use crate::commands::common::{resolve_db_path, resolve_user, CliContext};
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::status::{run_dead_letters, run_pending, run_status};
use crate::commands::sync::run_sync;
use crate::error::CliError;

const ENV_ACCESS_TOKEN: &str = "RECALL_ACCESS_TOKEN";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recall=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext {
        db_path: resolve_db_path(cli.db_path)?,
        user_id: resolve_user(cli.user),
        access_token: std::env::var(ENV_ACCESS_TOKEN).ok(),
        config: SyncConfig::from_env()?,
    };
    tracing::debug!("Using database at {}", ctx.db_path.display());

    match cli.command {
        Some(Commands::Add { content }) => run_add(&content, &ctx).await?,
        Some(Commands::Card {
            note_id,
            front,
            back,
        }) => run_card(&note_id, &front, &back, &ctx).await?,
        Some(Commands::List { limit, json }) => run_list(limit, json, &ctx).await?,
        Some(Commands::Delete { id }) => run_delete(&id, &ctx).await?,
        Some(Commands::Status { json }) => run_status(json, &ctx).await?,
        Some(Commands::Pending { json }) => run_pending(json, &ctx).await?,
        Some(Commands::Sync) => {
            run_sync(&ctx).await?;
        }
        Some(Commands::DeadLetters { clear }) => run_dead_letters(clear, &ctx).await?,
        None => {
            // Quick capture mode: recall "my thought"
            if cli.note.is_empty() {
                Cli::command().print_help()?;
                println!();
            } else {
                run_add(&cli.note, &ctx).await?;
            }
        }
    }

    Ok(())
}
