//! Persistence — a flat CSV table rewritten wholesale on every append.
//!
//! Keep-latest-by-id dedup is the safety net against the inbound channel's
//! at-least-once redelivery. The whole-file replace (sibling temp file +
//! rename) keeps readers from ever observing a partial table; an internal
//! mutex serializes the load-modify-write cycle across concurrent appends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::message::{InboundMessage, MsgKind};

/// Fixed column schema of the persisted table.
pub const COLUMNS: [&str; 5] = ["msg_id", "sender", "kind", "content", "received_at"];

/// Outcome of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Row count after the append.
    pub rows: usize,
    /// Whether an earlier row with the same id was superseded.
    pub replaced: bool,
}

/// Durable tabular storage for inbound messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a record, superseding any earlier row with the same id.
    async fn append(&self, record: &InboundMessage) -> Result<StoreStats, StoreError>;

    /// All rows in insertion order. An unwritten store is an empty table,
    /// never an error.
    async fn load(&self) -> Result<Vec<InboundMessage>, StoreError>;
}

/// CSV-file-backed store.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_rows(&self) -> Result<Vec<InboundMessage>, StoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                });
            }
        };

        let mut rows = parse_csv(&text).into_iter();

        if let Some(header) = rows.next() {
            if header != COLUMNS {
                warn!(path = %self.path.display(), "unexpected table header, reading rows anyway");
            }
        }

        let mut records = Vec::new();
        for row in rows {
            match row_to_record(&row) {
                Some(record) => records.push(record),
                None => warn!(
                    path = %self.path.display(),
                    columns = row.len(),
                    "skipping malformed row"
                ),
            }
        }
        Ok(records)
    }

    async fn write_all(&self, records: &[InboundMessage]) -> Result<(), StoreError> {
        let write_err = |e| StoreError::Write {
            path: self.path.display().to_string(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let mut out = String::new();
        write_row(&mut out, COLUMNS.iter().copied());
        for record in records {
            write_row(&mut out, record_fields(record).iter().map(String::as_str));
        }

        // Replace the file in one rename so a concurrent reader sees either
        // the old table or the new one, never a partial write.
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &out).await.map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for CsvStore {
    async fn append(&self, record: &InboundMessage) -> Result<StoreStats, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_rows().await?;
        let before = records.len();
        records.retain(|r| r.id != record.id);
        let replaced = records.len() < before;
        records.push(record.clone());

        self.write_all(&records).await?;
        debug!(
            id = %record.id,
            rows = records.len(),
            replaced,
            "record appended"
        );
        Ok(StoreStats {
            rows: records.len(),
            replaced,
        })
    }

    async fn load(&self) -> Result<Vec<InboundMessage>, StoreError> {
        self.load_rows().await
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn record_fields(record: &InboundMessage) -> [String; 5] {
    [
        record.id.clone(),
        record.sender.clone(),
        record.kind.as_str().to_string(),
        record.content.clone(),
        record
            .received_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}

fn row_to_record(row: &[String]) -> Option<InboundMessage> {
    let [id, sender, kind, content, received_at] = row else {
        return None;
    };
    let received_at = DateTime::parse_from_rfc3339(received_at)
        .ok()?
        .with_timezone(&Utc);
    Some(InboundMessage {
        id: id.clone(),
        sender: sender.clone(),
        kind: MsgKind::from_tag(kind),
        content: content.clone(),
        received_at,
        reply_to: None,
    })
}

// ── CSV encoding ────────────────────────────────────────────────────────
//
// Hand-rolled: quoting with doubled inner quotes, fields may carry commas
// and newlines.

fn write_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        write_field(out, field);
    }
    out.push('\n');
}

fn write_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for ch in field.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
