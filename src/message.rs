//! The message view (C1): an ordered header list plus a body
//! octet-sequence, parsed out of a raw RFC 5322 message.
//!
//! Built on `mailparse::parse_mail` rather than a hand-rolled RFC 5322
//! parser.

use mailparse::MailHeaderMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct MessageParseError(String);

impl fmt::Display for MessageParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse message: {}", self.0)
    }
}

impl std::error::Error for MessageParseError {}

pub struct Message {
    /// Bytes with any bare LF normalized to CRLF on ingest; canonicalization
    /// runs against this normalized form consistently rather than the
    /// original bytes.
    normalized: Vec<u8>,
}

impl Message {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, MessageParseError> {
        let normalized = normalize_line_endings(raw);
        // Validate eagerly so construction fails fast rather than inside
        // every per-signature evaluation.
        mailparse::parse_mail(&normalized).map_err(|err| MessageParseError(err.to_string()))?;
        Ok(Message { normalized })
    }

    fn parsed(&self) -> mailparse::ParsedMail<'_> {
        mailparse::parse_mail(&self.normalized).expect("validated in from_bytes")
    }

    /// Every `DKIM-Signature` header's raw value, in message order.
    pub fn dkim_signature_values(&self) -> Vec<String> {
        self.parsed()
            .headers
            .get_all_headers(crate::header::HEADER)
            .into_iter()
            .map(|h| String::from_utf8_lossy(h.get_value_raw()).into_owned())
            .collect()
    }

    /// `(original-case name, raw value)` for every header in the
    /// message, in order. Used by header selection (RFC 6376 §5.4.2),
    /// which must walk the whole header block, not just headers with a
    /// particular name.
    ///
    /// Simple canonicalization reconstructs `name:value\r\n` from this
    /// pair rather than re-slicing the original line bytes; this is a
    /// deliberate simplification (the fork and base repo make the same
    /// one) that assumes a single, well-formed `:` separator, which
    /// `mailparse`'s own header split already requires.
    pub fn all_headers(&self) -> Vec<(String, String)> {
        self.parsed()
            .headers
            .iter()
            .map(|h| {
                (
                    h.get_key(),
                    String::from_utf8_lossy(h.get_value_raw()).into_owned(),
                )
            })
            .collect()
    }

    pub fn body(&self) -> Vec<u8> {
        self.parsed().get_body_raw().unwrap_or_default()
    }
}

fn normalize_line_endings(raw: &[u8]) -> Vec<u8> {
    let s = String::from_utf8_lossy(raw);
    s.replace("\r\n", "\n").replace('\n', "\r\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_message_has_no_signatures() {
        let msg = Message::from_bytes(b"From: a@b\r\nSubject: x\r\n\r\nhi\r\n").unwrap();
        assert!(msg.dkim_signature_values().is_empty());
        assert_eq!(msg.body(), b"hi\r\n");
    }

    #[test]
    fn test_bare_lf_is_normalized() {
        let msg = Message::from_bytes(b"From: a@b\nSubject: x\n\nhi\n").unwrap();
        assert_eq!(msg.body(), b"hi\r\n");
    }

    #[test]
    fn test_multiple_signatures_in_order() {
        let raw = b"DKIM-Signature: v=1; a=1\r\nDKIM-Signature: v=1; a=2\r\nFrom: a@b\r\n\r\nhi\r\n";
        let msg = Message::from_bytes(raw).unwrap();
        let sigs = msg.dkim_signature_values();
        assert_eq!(sigs.len(), 2);
        assert!(sigs[0].contains("a=1"));
        assert!(sigs[1].contains("a=2"));
    }
}
