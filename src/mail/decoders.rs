use base64::{Engine as _, engine::general_purpose};
use encoding_rs::Encoding;
use log::warn;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::domain::message::NormalizedMessage;
use crate::error::MailError;

/// One step of the body decoding chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadDecoding {
    Utf8,
    Latin1,
}

impl PayloadDecoding {
    /// `None` when the bytes are not valid in this encoding.
    pub fn attempt(self, bytes: &[u8]) -> Option<String> {
        match self {
            PayloadDecoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            PayloadDecoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Tried in order; lossy UTF-8 covers whatever every step declines.
pub const PAYLOAD_CHAIN: [PayloadDecoding; 2] = [PayloadDecoding::Utf8, PayloadDecoding::Latin1];

pub fn decode_payload(bytes: &[u8]) -> String {
    decode_payload_with(bytes, &PAYLOAD_CHAIN)
}

pub fn decode_payload_with(bytes: &[u8], chain: &[PayloadDecoding]) -> String {
    chain
        .iter()
        .find_map(|step| step.attempt(bytes))
        .unwrap_or_else(|| utf8_dropping_invalid(bytes))
}

/// UTF-8 decoding that silently skips invalid sequences.
pub fn utf8_dropping_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Build the normalized record from a full RFC 822 message.
pub fn decode_message(raw: &[u8]) -> Result<NormalizedMessage, MailError> {
    let parsed =
        mailparse::parse_mail(raw).map_err(|e| MailError::fetch("failed to parse message", e))?;

    let raw_header = |name: &str| {
        parsed
            .headers
            .get_first_header(name)
            .map(|h| unfold(&String::from_utf8_lossy(h.get_value_raw())))
            .unwrap_or_default()
    };

    Ok(NormalizedMessage {
        from: raw_header("From"),
        subject: decode_header(&raw_header("Subject")),
        body: decode_body(&parsed),
        date: raw_header("Date"),
    })
}

/// Text of the message body: the first inline `text/plain` part of a
/// multipart message, or the single payload of a flat one.
pub fn decode_body(message: &ParsedMail<'_>) -> String {
    if message.subparts.is_empty() {
        return match message.get_body_raw() {
            Ok(payload) => decode_payload(&payload),
            Err(e) => {
                warn!("failed to decode message body: {e}");
                String::new()
            }
        };
    }

    first_plain_text(message).unwrap_or_default()
}

/// Depth-first, document order, root first. Forwarded `message/rfc822`
/// parts are parsed and walked in place.
fn first_plain_text(part: &ParsedMail<'_>) -> Option<String> {
    if is_inline_plain_text(part) {
        match part.get_body_raw() {
            Ok(payload) if !payload.is_empty() => return Some(decode_payload(&payload)),
            Ok(_) => {}
            Err(e) => warn!("skipping undecodable text/plain part: {e}"),
        }
    }

    if part.subparts.is_empty() && part.ctype.mimetype.eq_ignore_ascii_case("message/rfc822") {
        let raw = match part.get_body_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping undecodable forwarded message: {e}");
                return None;
            }
        };
        return match mailparse::parse_mail(&raw) {
            Ok(inner) => first_plain_text(&inner),
            Err(e) => {
                warn!("skipping unparsable forwarded message: {e}");
                None
            }
        };
    }

    part.subparts.iter().find_map(first_plain_text)
}

fn is_inline_plain_text(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
        && part.get_content_disposition().disposition != DispositionType::Attachment
}

/// A piece of a header value, split at RFC 2047 encoded-word boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSegment {
    Text(String),
    Encoded {
        bytes: Vec<u8>,
        charset: Option<String>,
    },
}

impl HeaderSegment {
    pub fn decode(&self) -> String {
        match self {
            HeaderSegment::Text(text) => text.clone(),
            HeaderSegment::Encoded {
                bytes,
                charset: Some(label),
            } if is_latin1_label(label) => decode_payload_with(bytes, &[PayloadDecoding::Latin1]),
            HeaderSegment::Encoded {
                bytes,
                charset: Some(label),
            } => Encoding::for_label(label.trim().as_bytes())
                .and_then(|enc| enc.decode_without_bom_handling_and_without_replacement(bytes))
                .map(|text| text.into_owned())
                .unwrap_or_else(|| utf8_dropping_invalid(bytes)),
            HeaderSegment::Encoded {
                bytes,
                charset: None,
            } => utf8_dropping_invalid(bytes),
        }
    }
}

// WHATWG maps these to windows-1252; keep them byte-to-code-point.
fn is_latin1_label(label: &str) -> bool {
    const LABELS: [&str; 8] = [
        "iso-8859-1",
        "iso8859-1",
        "iso_8859-1",
        "latin1",
        "latin-1",
        "l1",
        "cp819",
        "ibm819",
    ];
    let label = label.trim();
    LABELS.iter().any(|l| l.eq_ignore_ascii_case(label))
}

/// Decode an encoded-word header value into plain text.
pub fn decode_header(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    header_segments(&unfold(raw))
        .iter()
        .map(HeaderSegment::decode)
        .collect()
}

/// Split a header value into plain and encoded segments.
///
/// Whitespace between two encoded words is dropped, and neighbouring
/// encoded words in the same charset are joined so a multi-byte character
/// split across them decodes intact.
pub fn header_segments(value: &str) -> Vec<HeaderSegment> {
    let mut segments: Vec<HeaderSegment> = Vec::new();
    let mut pending = String::new();
    let mut rest = value;

    while let Some(start) = rest.find("=?") {
        let Some((bytes, charset, consumed)) = parse_encoded_word(&rest[start..]) else {
            pending.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
            continue;
        };
        pending.push_str(&rest[..start]);
        rest = &rest[start + consumed..];

        let follows_encoded = matches!(segments.last(), Some(HeaderSegment::Encoded { .. }));
        if !(follows_encoded && pending.trim().is_empty()) && !pending.is_empty() {
            segments.push(HeaderSegment::Text(std::mem::take(&mut pending)));
        }
        pending.clear();

        match segments.last_mut() {
            Some(HeaderSegment::Encoded {
                bytes: prev,
                charset: prev_charset,
            }) if same_charset(prev_charset.as_deref(), charset.as_deref()) => {
                prev.extend_from_slice(&bytes);
            }
            _ => segments.push(HeaderSegment::Encoded { bytes, charset }),
        }
    }

    pending.push_str(rest);
    if !pending.is_empty() {
        segments.push(HeaderSegment::Text(pending));
    }
    segments
}

fn same_charset(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

/// Parse `=?charset?enc?text?=` at the start of `s`.
/// Returns the decoded bytes, the charset and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(Vec<u8>, Option<String>, usize)> {
    let inner = s.strip_prefix("=?")?;
    let (charset, after_charset) = inner.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let text = &after_encoding[..end];

    if charset.contains(char::is_whitespace) || text.contains(char::is_whitespace) {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => decode_b(text)?,
        "Q" | "q" => decode_q(text),
        _ => return None,
    };

    // RFC 2231 language suffix: utf-8*en
    let charset = charset.split('*').next().unwrap_or_default();
    let charset = (!charset.is_empty()).then(|| charset.to_string());

    Some((bytes, charset, consumed))
}

fn decode_b(text: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD
        .decode(text)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(text.trim_end_matches('=')))
        .ok()
}

fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                match bytes.get(i + 1..i + 3).and_then(hex_byte) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    // stray '=' stays literal
                    None => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_byte(hex: &[u8]) -> Option<u8> {
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()
}

/// Join folded header lines.
fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "").trim().to_string()
}
