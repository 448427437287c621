//! XML candidate decoder for the flat webhook envelope: a single top-level
//! element whose children are leaf fields, values either CDATA-wrapped or
//! entity-escaped text.
//!
//! Hand-rolled scanner rather than a full XML parser — the envelope carries
//! no namespaces, no significant attributes, and no nesting we need to
//! preserve.

use super::FieldMap;

pub(super) fn decode(body: &str) -> Option<FieldMap> {
    let mut rest = body.trim();

    // Optional declaration: <?xml version="1.0"?>
    if let Some(after) = rest.strip_prefix("<?") {
        let end = after.find("?>")?;
        rest = after[end + 2..].trim_start();
    }

    let (root, self_closing, mut rest) = open_tag(rest)?;
    if self_closing {
        return Some(FieldMap::new());
    }

    let mut fields = FieldMap::new();
    loop {
        rest = rest.trim_start();

        if let Some(after) = rest.strip_prefix("</") {
            // Must be the root's closing tag for the document to be well formed.
            let after = after.strip_prefix(root)?;
            after.trim_start().strip_prefix('>')?;
            return Some(fields);
        }
        if rest.is_empty() {
            return None;
        }

        let (name, self_closing, after_open) = open_tag(rest)?;
        if self_closing {
            fields.insert(name.to_string(), String::new());
            rest = after_open;
            continue;
        }

        let close = format!("</{name}>");
        let end = close_position(after_open, &close)?;
        fields.insert(name.to_string(), decode_text(&after_open[..end]));
        rest = &after_open[end + close.len()..];
    }
}

/// Position of the element's closing tag, skipping a leading CDATA section
/// so a literal `</Tag>` inside it cannot end the field early.
fn close_position(rest: &str, close: &str) -> Option<usize> {
    let body = rest.trim_start();
    let offset = rest.len() - body.len();
    if let Some(after_marker) = body.strip_prefix("<![CDATA[") {
        // An unterminated CDATA section rejects the whole document.
        let terminator = after_marker.find("]]>")?;
        let search_from = offset + "<![CDATA[".len() + terminator + "]]>".len();
        rest[search_from..].find(close).map(|i| search_from + i)
    } else {
        rest.find(close)
    }
}

/// Parse `<Name attr=..>` or `<Name/>` at the start of `input`. Returns the
/// element name, whether it was self-closing, and the remainder after `>`.
fn open_tag(input: &str) -> Option<(&str, bool, &str)> {
    let after_lt = input.strip_prefix('<')?;
    if after_lt.starts_with(['/', '!', '?']) {
        return None;
    }

    let name_end = after_lt.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    let name = &after_lt[..name_end];
    if name.is_empty() {
        return None;
    }

    let gt = after_lt.find('>')?;
    let self_closing = after_lt[name_end..gt].ends_with('/');
    Some((name, self_closing, &after_lt[gt + 1..]))
}

fn decode_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix("<![CDATA[") {
        return inner.strip_suffix("]]>").unwrap_or(inner).to_string();
    }
    unescape(trimmed)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let entities = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ];
        match entities
            .iter()
            .find_map(|(entity, ch)| rest.strip_prefix(entity).map(|r| (*ch, r)))
        {
            Some((ch, remainder)) => {
                out.push(ch);
                rest = remainder;
            }
            None => {
                // Unknown entity: keep the ampersand literally.
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
