//! Payload normalizer — turns a raw webhook body of unknown format into an
//! [`InboundMessage`].
//!
//! Decoding is an explicit ordered list of candidate decoders; the first one
//! whose guard matches and whose decode succeeds wins. A body that no decoder
//! can map to a sender-bearing field set is [`Rejected`] — a normal outcome,
//! not an error: the caller still acknowledges it with a 200.

mod json;
mod xml;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::message::InboundMessage;

/// Flat string-field mapping shared by all decoders.
pub type FieldMap = BTreeMap<String, String>;

/// Why a payload was rejected. Logging-only detail; every rejection is
/// answered with the same generic acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    EmptyBody,
    NotUtf8,
    NoDecoderMatched,
    MissingSender,
}

impl Rejected {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejected::EmptyBody => "empty_body",
            Rejected::NotUtf8 => "not_utf8",
            Rejected::NoDecoderMatched => "no_decoder_matched",
            Rejected::MissingSender => "missing_sender",
        }
    }
}

struct Decoder {
    name: &'static str,
    /// Cheap guard so a decoder can be skipped without attempting a parse.
    matches: fn(&str) -> bool,
    decode: fn(&str) -> Option<FieldMap>,
}

/// Candidate decoders in precedence order: JSON for bodies that open an
/// object, then XML for everything else (including JSON bodies that failed
/// to parse).
const DECODERS: &[Decoder] = &[
    Decoder {
        name: "json",
        matches: |body| body.starts_with('{'),
        decode: json::decode,
    },
    Decoder {
        name: "xml",
        matches: |body| body.starts_with('<'),
        decode: xml::decode,
    },
];

/// Normalize a raw request body.
///
/// `received_at` is the boundary timestamp; it becomes the record's receipt
/// time and seeds the synthesized id when the payload carries none.
pub fn normalize(raw: &[u8], received_at: DateTime<Utc>) -> Result<InboundMessage, Rejected> {
    let text = std::str::from_utf8(raw).map_err(|_| Rejected::NotUtf8)?;
    let body = text.trim();
    if body.is_empty() {
        return Err(Rejected::EmptyBody);
    }

    let fields = decode(body).ok_or(Rejected::NoDecoderMatched)?;
    InboundMessage::from_fields(&fields, received_at).ok_or(Rejected::MissingSender)
}

fn decode(body: &str) -> Option<FieldMap> {
    for decoder in DECODERS {
        if !(decoder.matches)(body) {
            continue;
        }
        match (decoder.decode)(body) {
            Some(fields) => {
                debug!(decoder = decoder.name, fields = fields.len(), "payload decoded");
                return Some(fields);
            }
            None => debug!(decoder = decoder.name, "decoder did not match"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MsgKind;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T10:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn json_body_with_sender_normalizes() {
        let body = br#"{"FromUserName":"u1","Content":"hello","MsgType":"text","MsgId":"m1"}"#;
        let msg = normalize(body, at()).unwrap();
        assert_eq!(msg.sender, "u1");
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.kind, MsgKind::Text);
        assert_eq!(msg.id, "m1");
    }

    #[test]
    fn xml_body_with_sender_normalizes() {
        let body = b"<xml><FromUserName>u2</FromUserName><ToUserName>svc</ToUserName>\
                     <Content>hi</Content></xml>";
        let msg = normalize(body, at()).unwrap();
        assert_eq!(msg.sender, "u2");
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.reply_to.as_deref(), Some("svc"));
    }

    #[test]
    fn cdata_sender_preserved_verbatim() {
        let body = b"<xml><FromUserName><![CDATA[oX_abc-123]]></FromUserName>\
                     <MsgType><![CDATA[text]]></MsgType>\
                     <Content><![CDATA[ni hao]]></Content></xml>";
        let msg = normalize(body, at()).unwrap();
        assert_eq!(msg.sender, "oX_abc-123");
        assert_eq!(msg.content, "ni hao");
    }

    #[test]
    fn empty_body_rejected() {
        assert_eq!(normalize(b"", at()), Err(Rejected::EmptyBody));
        assert_eq!(normalize(b"   \n ", at()), Err(Rejected::EmptyBody));
    }

    #[test]
    fn non_utf8_rejected() {
        assert_eq!(normalize(&[0xff, 0xfe, 0x00], at()), Err(Rejected::NotUtf8));
    }

    #[test]
    fn plain_text_rejected() {
        assert_eq!(
            normalize(b"just some words", at()),
            Err(Rejected::NoDecoderMatched)
        );
    }

    #[test]
    fn json_without_sender_rejected() {
        assert_eq!(
            normalize(br#"{"Content":"hi"}"#, at()),
            Err(Rejected::MissingSender)
        );
    }

    #[test]
    fn xml_without_sender_rejected() {
        assert_eq!(
            normalize(b"<xml><Content>hi</Content></xml>", at()),
            Err(Rejected::MissingSender)
        );
    }

    #[test]
    fn malformed_json_body_falls_through_to_rejection() {
        // Opens like JSON but never parses; the XML decoder's guard skips it.
        assert_eq!(
            normalize(b"{not json at all", at()),
            Err(Rejected::NoDecoderMatched)
        );
    }

    #[test]
    fn nested_data_object_unwrapped() {
        let body = br#"{"event":"msg","data":{"FromUserName":"u3","Content":"wrapped"}}"#;
        let msg = normalize(body, at()).unwrap();
        assert_eq!(msg.sender, "u3");
        assert_eq!(msg.content, "wrapped");
    }

    #[test]
    fn reject_reasons_have_stable_labels() {
        assert_eq!(Rejected::EmptyBody.reason(), "empty_body");
        assert_eq!(Rejected::MissingSender.reason(), "missing_sender");
    }
}
