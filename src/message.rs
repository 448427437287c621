//! Domain model — the normalized inbound message.

use chrono::{DateTime, Utc};

use crate::normalize::FieldMap;

/// Message kind tags used by the inbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    Event,
    Unknown,
}

impl MsgKind {
    /// Stable tag used in the persisted table and in reply wording.
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgKind::Text => "text",
            MsgKind::Image => "image",
            MsgKind::Voice => "voice",
            MsgKind::Video => "video",
            MsgKind::ShortVideo => "shortvideo",
            MsgKind::Location => "location",
            MsgKind::Link => "link",
            MsgKind::Event => "event",
            MsgKind::Unknown => "unknown",
        }
    }

    /// Parse a wire tag. Unrecognized tags map to [`MsgKind::Unknown`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text" => MsgKind::Text,
            "image" => MsgKind::Image,
            "voice" => MsgKind::Voice,
            "video" => MsgKind::Video,
            "shortvideo" | "short_video" => MsgKind::ShortVideo,
            "location" => MsgKind::Location,
            "link" => MsgKind::Link,
            "event" => MsgKind::Event,
            _ => MsgKind::Unknown,
        }
    }

    fn is_media(&self) -> bool {
        matches!(
            self,
            MsgKind::Image | MsgKind::Voice | MsgKind::Video | MsgKind::ShortVideo
        )
    }
}

/// A normalized inbound message, constructed once per accepted request and
/// never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Deduplication key: the platform `MsgId` when present, else synthesized
    /// from the receipt timestamp.
    pub id: String,
    /// Originating account (`FromUserName`). Required.
    pub sender: String,
    pub kind: MsgKind,
    /// Raw text, a media reference, a location/link title, or empty for
    /// event/unknown kinds.
    pub content: String,
    /// Assigned at the ingestion boundary, millisecond precision.
    pub received_at: DateTime<Utc>,
    /// The service account (`ToUserName`) to echo in the reply envelope.
    /// Not persisted.
    pub reply_to: Option<String>,
}

impl InboundMessage {
    /// Build a message from a decoded field map. Returns `None` when the
    /// sender field is missing — such payloads are rejected upstream.
    pub fn from_fields(fields: &FieldMap, received_at: DateTime<Utc>) -> Option<Self> {
        let sender = fields.get("FromUserName")?.clone();

        let kind = match fields.get("MsgType") {
            Some(tag) => MsgKind::from_tag(tag),
            // Legacy senders omit MsgType; a bare Content field means text.
            None if fields.contains_key("Content") => MsgKind::Text,
            None => MsgKind::Unknown,
        };

        let content = content_for(kind, fields);

        let id = fields
            .get("MsgId")
            .cloned()
            .unwrap_or_else(|| format!("recv-{}", received_at.timestamp_millis()));

        Some(Self {
            id,
            sender,
            kind,
            content,
            received_at,
            reply_to: fields.get("ToUserName").cloned(),
        })
    }
}

fn content_for(kind: MsgKind, fields: &FieldMap) -> String {
    let field = |name: &str| fields.get(name).cloned().unwrap_or_default();

    if kind.is_media() {
        return field("MediaId");
    }
    match kind {
        MsgKind::Text => field("Content"),
        MsgKind::Location => {
            let label = field("Label");
            if label.is_empty() { field("Title") } else { label }
        }
        MsgKind::Link => field("Title"),
        MsgKind::Event => field("Event"),
        MsgKind::Unknown => field("Content"),
        _ => unreachable!("media kinds handled above"),
    }
}
