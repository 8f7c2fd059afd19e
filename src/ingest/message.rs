//! Turning one raw RFC 5322 message into an [`EmailRecord`].
//!
//! Subject, sender, date and body come from `mail-parser`. Gmail export
//! headers (`X-GM-THRID`, `X-Gmail-Labels`) and threading headers are read
//! from the raw header block.

use chrono::{DateTime, Utc};
use mail_parser::{Message, MessageParser, PartType};
use sha2::{Digest, Sha256};

use crate::model::EmailRecord;

/// Parse a raw message (with or without a leading `From ` line).
///
/// Returns `None` only when the bytes do not look like a message at all.
pub fn parse_message(raw: &[u8]) -> Option<EmailRecord> {
    let bytes = skip_from_line(raw);
    let parsed = MessageParser::default().parse(bytes)?;
    let headers = unfold_headers(&decode_header_bytes(header_block(bytes)));

    let id = parsed
        .message_id()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| content_id(bytes));

    let thread_id = header(&headers, "x-gm-thrid")
        .map(str::to_string)
        .or_else(|| header(&headers, "references").and_then(|v| angle_ids(v).into_iter().next()))
        .or_else(|| header(&headers, "in-reply-to").and_then(|v| angle_ids(v).into_iter().next()))
        .unwrap_or_else(|| id.clone());

    let sender = parsed.from().and_then(|address| address.first()).and_then(|addr| {
        let name = addr.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let email = addr.address.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (name, email) {
            (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
            (None, Some(email)) => Some(email.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        }
    });

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));

    let body = body_text(&parsed);

    let labels: Vec<String> = header(&headers, "x-gmail-labels")
        .map(|v| {
            v.split(',')
                .map(|l| l.trim().trim_matches('"').to_string())
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut record = EmailRecord::new(id, thread_id)
        .with_body(body)
        .with_labels(labels);
    record.sender = sender;
    record.subject = parsed.subject().map(str::to_string);
    record.received_at = received_at;
    Some(record)
}

/// First text/plain body part, else the first HTML part as plain text.
fn body_text(parsed: &Message<'_>) -> String {
    let mut html: Option<&str> = None;
    for &idx in parsed.text_body.iter().chain(parsed.html_body.iter()) {
        match parsed.parts.get(idx as usize).map(|p| &p.body) {
            Some(PartType::Text(text)) => return text.trim_end().to_string(),
            Some(PartType::Html(markup)) if html.is_none() => html = Some(markup.as_ref()),
            _ => {}
        }
    }
    html.map(html_to_text).unwrap_or_default()
}

/// Drop a leading MBOX `From ` separator line.
fn skip_from_line(raw: &[u8]) -> &[u8] {
    if raw.starts_with(b"From ") {
        match raw.iter().position(|&b| b == b'\n') {
            Some(pos) => &raw[pos + 1..],
            None => &[],
        }
    } else {
        raw
    }
}

/// The header section: everything before the first blank line.
fn header_block(message: &[u8]) -> &[u8] {
    let mut start = 0;
    for (i, &b) in message.iter().enumerate() {
        if b == b'\n' {
            let line = &message[start..i];
            if line.is_empty() || line == b"\r" {
                return &message[..start];
            }
            start = i + 1;
        }
    }
    message
}

/// UTF-8 if valid, otherwise Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

/// `(lowercase name, value)` pairs with continuation lines joined.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Every `<...>` token, brackets removed.
fn angle_ids(value: &str) -> Vec<String> {
    value
        .split('<')
        .skip(1)
        .filter_map(|part| part.split_once('>').map(|(id, _)| id.trim().to_string()))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Stable id for messages without a Message-ID.
fn content_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
    format!("sha256-{hex}")
}

/// Crude HTML to text: drops tags, `<script>`/`<style>` contents, decodes
/// the common entities, and collapses blank runs.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[..gt].trim().to_lowercase();
        rest = &after[gt + 1..];

        let name = tag.split_whitespace().next().unwrap_or("");
        if name == "script" || name == "style" {
            let close = format!("</{name}");
            // ASCII-only lowercasing keeps byte offsets valid for `rest`.
            let lower = rest.to_ascii_lowercase();
            rest = match lower.find(&close) {
                Some(pos) => rest[pos..].split_once('>').map_or("", |(_, r)| r),
                None => "",
            };
            continue;
        }
        if matches!(
            name.trim_start_matches('/'),
            "br" | "br/" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4"
        ) {
            out.push('\n');
        }
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
