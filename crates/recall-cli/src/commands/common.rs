use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::connectivity::ConnectivityMonitor;
use recall_core::identity::SessionIdentity;
use recall_core::local::LocalStore;
use recall_core::models::SyncState;
use recall_core::queue::KeyValueStore;
use recall_core::remote::{HttpRemoteStore, RemoteError, RemoteResult, RemoteStore};
use recall_core::services::{DatabaseService, RecordService};
use recall_core::{Note, NoteId, Notecard, SyncConfig, SyncEngine, SyncOperation, SyncStatus};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

pub const DEFAULT_USER: &str = "local";
const SHORT_ID_LEN: usize = 13;

/// Everything a command needs to open the local store and the engine.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub user_id: String,
    pub access_token: Option<String>,
    pub config: SyncConfig,
}

/// An open database with the engine and record service on top of it.
pub struct Session {
    pub records: RecordService,
    pub engine: SyncEngine,
}

impl Session {
    pub fn close(self) {
        self.engine.shutdown();
    }
}

/// Stands in for the remote store when no endpoint is configured.
struct UnconfiguredRemote;

#[async_trait]
impl RemoteStore for UnconfiguredRemote {
    async fn insert(&self, _collection: &str, _owner_id: &str, _record: &Value) -> RemoteResult<()> {
        Err(unconfigured())
    }

    async fn update(
        &self,
        _collection: &str,
        _owner_id: &str,
        _id: &str,
        _fields: &Value,
    ) -> RemoteResult<()> {
        Err(unconfigured())
    }

    async fn delete(&self, _collection: &str, _owner_id: &str, _id: &str) -> RemoteResult<()> {
        Err(unconfigured())
    }

    async fn list_by_owner(&self, _collection: &str, _owner_id: &str) -> RemoteResult<Vec<Value>> {
        Err(unconfigured())
    }
}

fn unconfigured() -> RemoteError {
    RemoteError::Unavailable("no remote endpoint configured".to_string())
}

/// Open the local database and build an engine over it.
///
/// Without a remote endpoint the engine starts offline, so writes only queue.
/// Triggers stay disarmed; only `recall sync` pushes to the remote.
pub async fn open_session(ctx: &CliContext) -> Result<Session, CliError> {
    let db = Arc::new(DatabaseService::open_path(ctx.db_path.clone()).await?);

    let remote: Arc<dyn RemoteStore> =
        match (&ctx.config.remote_url, &ctx.config.remote_api_key) {
            (Some(url), Some(api_key)) => {
                let mut store = HttpRemoteStore::new(url, api_key)?;
                if let Some(token) = &ctx.access_token {
                    store = store.with_access_token(token);
                }
                Arc::new(store)
            }
            _ => Arc::new(UnconfiguredRemote),
        };
    let online = ctx.config.has_remote();

    let identity = Arc::new(SessionIdentity::signed_in(&ctx.user_id));
    let local: Arc<dyn LocalStore> = db.clone();
    let queue_store: Arc<dyn KeyValueStore> = db;
    let config = SyncConfig {
        eager_triggers: false,
        ..ctx.config.clone()
    };
    let engine = SyncEngine::new(
        config,
        Arc::new(ConnectivityMonitor::new(Some(online))),
        queue_store,
        local.clone(),
        remote,
        identity.clone(),
    )
    .await;
    let records = RecordService::new(local, engine.clone(), identity);

    Ok(Session { records, engine })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path {
        return Ok(path);
    }
    default_db_path().ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("recall").join("recall.db"))
}

pub fn resolve_user(cli_user: Option<String>) -> String {
    cli_user
        .and_then(|user| normalize_content(&user))
        .unwrap_or_else(|| DEFAULT_USER.to_string())
}

/// A note or notecard matched by id or id prefix.
#[derive(Debug)]
pub enum ResolvedRecord {
    Note(Note),
    Notecard(Notecard),
}

impl ResolvedRecord {
    pub fn id(&self) -> String {
        match self {
            Self::Note(note) => note.id.to_string(),
            Self::Notecard(card) => card.id.to_string(),
        }
    }
}

/// Find a live note or notecard by full id or unique id prefix.
pub async fn resolve_record(query: &str, records: &RecordService) -> Result<ResolvedRecord, CliError> {
    let query = normalize_record_identifier(query)?;

    if let Some(note) = records.get::<Note>(&query).await? {
        return Ok(ResolvedRecord::Note(note));
    }
    if let Some(card) = records.get::<Notecard>(&query).await? {
        return Ok(ResolvedRecord::Notecard(card));
    }

    let mut matches: Vec<ResolvedRecord> = records
        .list::<Note>()
        .await?
        .into_iter()
        .filter(|note| note.id.to_string().starts_with(&query))
        .map(ResolvedRecord::Note)
        .collect();
    matches.extend(
        records
            .list::<Notecard>()
            .await?
            .into_iter()
            .filter(|card| card.id.to_string().starts_with(&query))
            .map(ResolvedRecord::Notecard),
    );

    match matches.len() {
        0 => Err(CliError::RecordNotFound(query)),
        1 => matches
            .pop()
            .ok_or_else(|| CliError::RecordNotFound(query.clone())),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|record| short_id(&record.id()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Like [`resolve_record`], but only notes qualify.
pub async fn resolve_note(query: &str, records: &RecordService) -> Result<Note, CliError> {
    match resolve_record(query, records).await? {
        ResolvedRecord::Note(note) => Ok(note),
        ResolvedRecord::Notecard(card) => Err(CliError::RecordNotFound(format!(
            "{query} (matched notecard {})",
            short_id(&card.id.to_string())
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub preview: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
    pub cards: usize,
}

pub fn note_to_list_item(note: &Note, cards: usize, now: DateTime<Utc>) -> NoteListItem {
    NoteListItem {
        id: note.id.to_string(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now),
        cards,
    }
}

pub fn format_note_line(item: &NoteListItem) -> String {
    let id = short_id(&item.id);
    let preview = truncate_chars(&item.preview, 40);
    let relative_time = &item.relative_time;
    if item.cards == 0 {
        format!("{id:<13}  {preview:<40}  {relative_time}")
    } else {
        let cards = item.cards;
        let noun = if cards == 1 { "card" } else { "cards" };
        format!("{id:<13}  {preview:<40}  {relative_time:<10}  {cards} {noun}")
    }
}

/// Number of live notecards pointing at `note_id`.
pub fn count_cards(cards: &[Notecard], note_id: &NoteId) -> usize {
    cards.iter().filter(|card| card.note_id == *note_id).count()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated = text
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub state: SyncState,
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub queue_length: usize,
    pub dead_letters: usize,
    pub error: Option<String>,
}

pub fn status_to_item(status: &SyncStatus, dead_letters: usize) -> StatusItem {
    StatusItem {
        state: status.state(),
        is_online: status.is_online,
        is_syncing: status.is_syncing,
        last_sync_time: status.last_sync_time,
        queue_length: status.queue_length,
        dead_letters,
        error: status.error.clone(),
    }
}

pub fn format_status_lines(item: &StatusItem) -> Vec<String> {
    let state = serde_json::to_value(item.state)
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_default();
    let mut lines = vec![
        format!("State:        {state}"),
        format!("Online:       {}", if item.is_online { "yes" } else { "no" }),
        format!("Pending:      {}", item.queue_length),
        format!(
            "Last sync:    {}",
            item.last_sync_time
                .map_or_else(|| "never".to_string(), format_timestamp)
        ),
    ];
    if item.dead_letters > 0 {
        lines.push(format!("Dead letters: {}", item.dead_letters));
    }
    if let Some(error) = &item.error {
        lines.push(format!("Last error:   {error}"));
    }
    lines
}

pub fn format_operation_lines(operations: &[SyncOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let kind = operation.kind.to_string().to_lowercase();
            let record = operation.record_id().map_or_else(|| "?".to_string(), short_id);
            format!(
                "{}  {kind:<6}  {:<10}  {record:<13}  retries={}",
                format_timestamp(operation.enqueued_at),
                operation.collection,
                operation.retry_count
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now
        .signed_duration_since(timestamp)
        .num_milliseconds()
        .max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Note text from the arguments, falling back to piped stdin.
pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyRecordId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}
