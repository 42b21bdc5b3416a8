use chrono::Utc;
use recall_core::{Note, Notecard};

use crate::commands::common::{
    count_cards, format_note_line, note_to_list_item, open_session, CliContext, NoteListItem,
};
use crate::error::CliError;

pub async fn list_note_items(limit: usize, ctx: &CliContext) -> Result<Vec<NoteListItem>, CliError> {
    let session = open_session(ctx).await?;
    let notes = session.records.list::<Note>().await?;
    let cards = session.records.list::<Notecard>().await?;
    session.close();

    let now = Utc::now();
    Ok(notes
        .iter()
        .take(limit)
        .map(|note| note_to_list_item(note, count_cards(&cards, &note.id), now))
        .collect())
}

pub async fn run_list(limit: usize, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let items = list_note_items(limit, ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}", format_note_line(item));
        }
    }

    Ok(())
}
