use recall_core::{Note, Notecard};

use crate::commands::common::{open_session, resolve_record, CliContext, ResolvedRecord};
use crate::error::CliError;

/// Tombstone a note or notecard locally and queue the remote delete.
pub async fn run_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let session = open_session(ctx).await?;
    let resolved = resolve_record(id, &session.records).await?;
    let deleted_id = resolved.id();

    match resolved {
        ResolvedRecord::Note(note) => {
            session.records.delete::<Note>(&note.id.to_string()).await?;
        }
        ResolvedRecord::Notecard(card) => {
            session
                .records
                .delete::<Notecard>(&card.id.to_string())
                .await?;
        }
    }
    session.close();

    println!("{deleted_id}");
    Ok(())
}
