//! Reply composer — formats the acknowledgement the inbound channel expects.
//!
//! Pure string formatting from fields already on the record; the platform
//! enforces a short round-trip deadline, so no I/O happens here.

use chrono::{DateTime, Utc};

use crate::message::{InboundMessage, MsgKind};

/// Acknowledgement payload for the webhook response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Structured XML envelope echoing the sender/recipient pair.
    Xml(String),
    /// The literal `success` token.
    Success,
}

impl Reply {
    pub fn body(&self) -> &str {
        match self {
            Reply::Xml(xml) => xml,
            Reply::Success => "success",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Reply::Xml(_) => "application/xml",
            Reply::Success => "text/plain; charset=utf-8",
        }
    }
}

/// Compose the acknowledgement for an accepted record.
///
/// Content-bearing kinds get an XML text reply addressed back to the sender;
/// event and unknown kinds, or records that never carried the service
/// account id, fall back to the plain success token.
pub fn compose(record: &InboundMessage, now: DateTime<Utc>) -> Reply {
    let Some(service) = record.reply_to.as_deref() else {
        return Reply::Success;
    };

    let ack = match record.kind {
        MsgKind::Text => "Message received and archived.".to_string(),
        MsgKind::Image
        | MsgKind::Voice
        | MsgKind::Video
        | MsgKind::ShortVideo
        | MsgKind::Location
        | MsgKind::Link => format!("Received your {} message.", record.kind.as_str()),
        MsgKind::Event | MsgKind::Unknown => return Reply::Success,
    };

    Reply::Xml(render_text_reply(&record.sender, service, &ack, now))
}

fn render_text_reply(to: &str, from: &str, content: &str, now: DateTime<Utc>) -> String {
    format!(
        "<xml>\
         <ToUserName><![CDATA[{}]]></ToUserName>\
         <FromUserName><![CDATA[{}]]></FromUserName>\
         <CreateTime>{}</CreateTime>\
         <MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[{}]]></Content>\
         </xml>",
        cdata_safe(to),
        cdata_safe(from),
        now.timestamp(),
        cdata_safe(content),
    )
}

/// Split any `]]>` in the value so it cannot terminate the CDATA section.
fn cdata_safe(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: MsgKind, reply_to: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            sender: "u2".into(),
            kind,
            content: "hi".into(),
            received_at: Utc::now(),
            reply_to: reply_to.map(String::from),
        }
    }

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn text_reply_echoes_sender_recipient_pair() {
        let reply = compose(&record(MsgKind::Text, Some("svc")), at());
        let Reply::Xml(xml) = reply else {
            panic!("expected XML reply");
        };
        assert!(xml.contains("<ToUserName><![CDATA[u2]]></ToUserName>"));
        assert!(xml.contains("<FromUserName><![CDATA[svc]]></FromUserName>"));
        assert!(xml.contains("<MsgType><![CDATA[text]]></MsgType>"));
        assert!(xml.contains(&format!("<CreateTime>{}</CreateTime>", at().timestamp())));
    }

    #[test]
    fn media_reply_names_the_kind() {
        let reply = compose(&record(MsgKind::Voice, Some("svc")), at());
        assert!(reply.body().contains("Received your voice message."));
    }

    #[test]
    fn event_kind_gets_plain_success() {
        assert_eq!(compose(&record(MsgKind::Event, Some("svc")), at()), Reply::Success);
        assert_eq!(compose(&record(MsgKind::Unknown, Some("svc")), at()), Reply::Success);
    }

    #[test]
    fn missing_reply_to_gets_plain_success() {
        assert_eq!(compose(&record(MsgKind::Text, None), at()), Reply::Success);
    }

    #[test]
    fn reply_round_trips_through_the_xml_decoder() {
        let reply = compose(&record(MsgKind::Text, Some("svc")), at());
        let msg = crate::normalize::normalize(reply.body().as_bytes(), Utc::now()).unwrap();
        assert_eq!(msg.sender, "svc");
        assert_eq!(msg.content, "Message received and archived.");
    }

    #[test]
    fn cdata_terminator_in_sender_cannot_break_envelope() {
        let mut rec = record(MsgKind::Text, Some("svc"));
        rec.sender = "u]]>bad".into();
        let Reply::Xml(xml) = compose(&rec, at()) else {
            panic!("expected XML reply");
        };
        assert!(!xml.contains("<![CDATA[u]]>bad]]>"));
    }

    #[test]
    fn content_types_match_payloads() {
        assert_eq!(Reply::Success.content_type(), "text/plain; charset=utf-8");
        assert_eq!(Reply::Xml(String::new()).content_type(), "application/xml");
    }
}
