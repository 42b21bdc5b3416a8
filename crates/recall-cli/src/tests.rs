use chrono::{Duration, TimeZone, Utc};
use recall_core::models::{OperationKind, SyncState};
use recall_core::{Note, SyncConfig, SyncStatus};
use tempfile::TempDir;

use crate::commands::add::run_add;
use crate::commands::card::run_card;
use crate::commands::common::{
    format_relative_time, format_status_lines, normalize_content, note_preview, open_session,
    resolve_note, resolve_record, resolve_user, short_id, status_to_item, CliContext,
    ResolvedRecord, DEFAULT_USER,
};
use crate::commands::delete::run_delete;
use crate::commands::list::list_note_items;
use crate::commands::status::run_dead_letters;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn test_context(dir: &TempDir) -> CliContext {
    CliContext {
        db_path: dir.path().join("recall.db"),
        user_id: "u1".to_string(),
        access_token: None,
        config: SyncConfig::default(),
    }
}

async fn pending_kinds(ctx: &CliContext) -> Vec<(String, OperationKind)> {
    let session = open_session(ctx).await.unwrap();
    let kinds = session
        .engine
        .pending_operations()
        .await
        .into_iter()
        .map(|op| (op.collection, op.kind))
        .collect();
    session.close();
    kinds
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn resolve_user_falls_back_to_default() {
    assert_eq!(resolve_user(None), DEFAULT_USER);
    assert_eq!(resolve_user(Some("   ".to_string())), DEFAULT_USER);
    assert_eq!(resolve_user(Some(" alice ".to_string())), "alice");
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(now, now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
    assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
    assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
    assert_eq!(format_relative_time(now - Duration::days(400), now), "1y ago");
    // Clock skew never renders as the future
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[test]
fn note_preview_uses_first_line_and_truncates() {
    let note = Note::new("u1", "A very   long first line that keeps going\nsecond line");
    assert_eq!(note_preview(&note, 80), "A very long first line that keeps going");
    assert_eq!(note_preview(&note, 10), "A very ...");
}

#[test]
fn status_lines_show_never_synced_and_last_error() {
    let status = SyncStatus {
        is_online: true,
        queue_length: 2,
        error: Some("1 of 2 operations failed: boom".to_string()),
        ..SyncStatus::default()
    };
    let item = status_to_item(&status, 1);
    assert_eq!(item.state, SyncState::Error);

    let lines = format_status_lines(&item);
    assert!(lines.contains(&"State:        error".to_string()));
    assert!(lines.contains(&"Last sync:    never".to_string()));
    assert!(lines.contains(&"Dead letters: 1".to_string()));
    assert!(lines
        .iter()
        .any(|line| line.ends_with("1 of 2 operations failed: boom")));
}

#[tokio::test]
async fn add_persists_note_and_queues_create() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);

    run_add(&["hello".to_string(), "world".to_string()], &ctx)
        .await
        .unwrap();

    let items = list_note_items(10, &ctx).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "hello world");
    assert_eq!(items[0].cards, 0);
    assert_eq!(
        pending_kinds(&ctx).await,
        vec![("notes".to_string(), OperationKind::Create)]
    );
}

#[tokio::test]
async fn list_respects_limit_newest_first() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    for content in ["first", "second", "third"] {
        run_add(&[content.to_string()], &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let items = list_note_items(2, &ctx).await.unwrap();
    let contents: Vec<&str> = items.iter().map(|item| item.content.as_str()).collect();
    assert_eq!(contents, vec!["third", "second"]);
}

#[tokio::test]
async fn card_attaches_to_note_by_prefix() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_add(&["Photosynthesis".to_string()], &ctx).await.unwrap();
    let note_id = list_note_items(1, &ctx).await.unwrap()[0].id.clone();

    run_card(&short_id(&note_id), "Where?", "Chloroplasts", &ctx)
        .await
        .unwrap();

    let items = list_note_items(10, &ctx).await.unwrap();
    assert_eq!(items[0].cards, 1);
    assert_eq!(
        pending_kinds(&ctx).await,
        vec![
            ("notes".to_string(), OperationKind::Create),
            ("notecards".to_string(), OperationKind::Create),
            ("notes".to_string(), OperationKind::Update),
        ]
    );
}

#[tokio::test]
async fn delete_by_prefix_tombstones_and_queues_delete() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_add(&["keep".to_string()], &ctx).await.unwrap();
    run_add(&["drop".to_string()], &ctx).await.unwrap();
    let items = list_note_items(10, &ctx).await.unwrap();
    let dropped = items
        .iter()
        .find(|item| item.content == "drop")
        .unwrap()
        .id
        .clone();

    run_delete(&dropped, &ctx).await.unwrap();

    let remaining = list_note_items(10, &ctx).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "keep");
    assert_eq!(
        pending_kinds(&ctx).await.last(),
        Some(&("notes".to_string(), OperationKind::Delete))
    );
}

#[tokio::test]
async fn resolve_record_rejects_ambiguous_and_missing_ids() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_add(&["one".to_string()], &ctx).await.unwrap();
    run_add(&["two".to_string()], &ctx).await.unwrap();
    let first = list_note_items(10, &ctx).await.unwrap()[0].id.clone();

    let session = open_session(&ctx).await.unwrap();
    // Time-ordered ids created together share their leading characters
    let ambiguous = resolve_record(&first[..4], &session.records).await;
    assert!(matches!(ambiguous, Err(CliError::AmbiguousRecordId(_))));

    let missing = resolve_record("ffffffff-not-there", &session.records).await;
    assert!(matches!(missing, Err(CliError::RecordNotFound(_))));

    let empty = resolve_record("  ", &session.records).await;
    assert!(matches!(empty, Err(CliError::EmptyRecordId)));

    let exact = resolve_record(&first, &session.records).await.unwrap();
    assert!(matches!(exact, ResolvedRecord::Note(note) if note.id.to_string() == first));
    session.close();
}

#[tokio::test]
async fn resolve_note_refuses_notecards() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    let session = open_session(&ctx).await.unwrap();
    let note = session.records.create_note("Mitochondria").await.unwrap();
    let card = session
        .records
        .create_notecard(&note.id, "What?", "Powerhouse")
        .await
        .unwrap();

    let result = resolve_note(&card.id.to_string(), &session.records).await;
    assert!(matches!(result, Err(CliError::RecordNotFound(_))));
    session.close();
}

#[tokio::test]
async fn records_are_scoped_to_the_cli_user() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_add(&["mine".to_string()], &ctx).await.unwrap();

    let other = CliContext {
        user_id: "u2".to_string(),
        ..test_context(&dir)
    };
    assert!(list_note_items(10, &other).await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_requires_remote_configuration() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    let result = run_sync(&ctx).await;
    assert!(matches!(result, Err(CliError::SyncNotConfigured)));
}

#[tokio::test]
async fn status_stays_offline_without_remote() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_add(&["queued".to_string()], &ctx).await.unwrap();

    let session = open_session(&ctx).await.unwrap();
    let status = session.engine.status();
    session.close();

    assert!(!status.is_online);
    assert_eq!(status.queue_length, 1);
    assert_eq!(status.state(), SyncState::Offline);
}

#[tokio::test]
async fn dead_letters_command_handles_empty_list() {
    let dir = TempDir::new().unwrap();
    let ctx = test_context(&dir);
    run_dead_letters(true, &ctx).await.unwrap();
    run_dead_letters(false, &ctx).await.unwrap();
}
