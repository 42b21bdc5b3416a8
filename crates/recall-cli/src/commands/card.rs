use crate::commands::common::{open_session, resolve_note, CliContext};
use crate::error::CliError;

pub async fn run_card(
    note_query: &str,
    front: &str,
    back: &str,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let session = open_session(ctx).await?;
    let mut note = resolve_note(note_query, &session.records).await?;
    let card = session.records.create_notecard(&note.id, front, back).await?;

    // The parent note sorts as recently changed once it has a new card
    session.records.update(&mut note).await?;
    session.close();

    println!("{}", card.id);
    Ok(())
}
