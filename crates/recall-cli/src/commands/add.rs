use crate::commands::common::{open_session, resolve_note_content, CliContext};
use crate::error::CliError;

pub async fn run_add(content_parts: &[String], ctx: &CliContext) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let session = open_session(ctx).await?;
    let note = session.records.create_note(&content).await?;
    session.close();

    println!("{}", note.id);
    Ok(())
}
