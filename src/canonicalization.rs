//! The `simple` and `relaxed` canonicalization algorithms (C3, RFC 6376
//! §3.4). Byte-exactness here is the part of this crate where a single
//! wrong space turns a real signature into a bogus verdict, so these
//! functions work directly on byte slices rather than a higher-level
//! text API.

use crate::bytes;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Type {
    Simple,
    Relaxed,
}

impl Type {
    pub fn canon_name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

/// Canonicalize body using the simple algorithm (RFC 6376 §3.4.3).
pub(crate) fn canonicalize_body_simple(mut body: &[u8]) -> Vec<u8> {
    if body.is_empty() {
        return b"\r\n".to_vec();
    }

    while body.ends_with(b"\r\n\r\n") {
        body = &body[..body.len() - 2];
    }
    if !body.ends_with(b"\r\n") {
        let mut out = body.to_vec();
        out.extend_from_slice(b"\r\n");
        return out;
    }

    body.to_vec()
}

/// Canonicalize body using the relaxed algorithm (RFC 6376 §3.4.4).
pub(crate) fn canonicalize_body_relaxed(body: &[u8]) -> Vec<u8> {
    let mut body = body.to_vec();

    // Reduce all sequences of WSP within a line to a single SP.
    bytes::replace(&mut body, '\t', ' ');
    let mut previous_space = false;
    body.retain(|c| {
        if *c == b' ' {
            if previous_space {
                false
            } else {
                previous_space = true;
                true
            }
        } else {
            previous_space = false;
            true
        }
    });

    // Strip whitespace immediately before the line terminator. The loop
    // form is needed because removing one " \r\n" can reveal another.
    while let Some(idx) = bytes::find(&body, b" \r\n") {
        body.remove(idx);
    }

    // Ignore empty lines at the end of the message body.
    while body.ends_with(b"\r\n\r\n") {
        body.remove(body.len() - 1);
        body.remove(body.len() - 1);
    }

    if !body.is_empty() && !body.ends_with(b"\r\n") {
        body.push(b'\r');
        body.push(b'\n');
    }

    body
}

pub(crate) fn canonicalize_body(ty: Type, body: &[u8]) -> Vec<u8> {
    match ty {
        Type::Simple => canonicalize_body_simple(body),
        Type::Relaxed => canonicalize_body_relaxed(body),
    }
}

/// Canonicalize a single header using the simple algorithm (RFC 6376
/// §3.4.1): unchanged, "Name:Value\r\n" reconstructed from the
/// `(name, raw value)` pair `message::Message::all_headers` returns for
/// each header. See that method for the documented simplification this
/// relies on.
pub(crate) fn canonicalize_header_simple(key: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + value.len() + 4);
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

/// Canonicalize a single header using the relaxed algorithm (RFC 6376
/// §3.4.2).
pub(crate) fn canonicalize_header_relaxed(key: &str, value: &[u8]) -> Vec<u8> {
    let key = key.to_lowercase();
    let key = key.trim_end();
    let value = canonicalize_header_value_relaxed(value);

    let mut out = Vec::with_capacity(key.len() + value.len() + 3);
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(b":");
    out.extend_from_slice(&value);
    out.extend_from_slice(b"\r\n");
    out
}

fn canonicalize_header_value_relaxed(value: &[u8]) -> Vec<u8> {
    let mut value = value.to_vec();
    bytes::replace(&mut value, '\t', ' ');
    // Unfold: join any CRLF that was only there for line-folding.
    value = bytes::replace_slice(&value, b"\r\n", b"");

    while value.ends_with(b" ") {
        value.pop();
    }
    while value.starts_with(b" ") {
        value.remove(0);
    }

    let mut previous_space = false;
    value.retain(|c| {
        if *c == b' ' {
            if previous_space {
                false
            } else {
                previous_space = true;
                true
            }
        } else {
            previous_space = false;
            true
        }
    });

    value
}

pub(crate) fn canonicalize_header(ty: Type, key: &str, value: &[u8]) -> Vec<u8> {
    match ty {
        Type::Simple => canonicalize_header_simple(key, value),
        Type::Relaxed => canonicalize_header_relaxed(key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_header_relaxed() {
        assert_eq!(
            canonicalize_header_relaxed("SUBJect", b" AbC\r\n"),
            b"subject:AbC\r\n"
        );
        assert_eq!(
            canonicalize_header_relaxed("Subject \t", b"\t Your Name\t \r\n"),
            b"subject:Your Name\r\n"
        );
        assert_eq!(
            canonicalize_header_relaxed("Subject \t", b"\t Kimi \t \r\n No \t\r\n Na Wa\r\n"),
            b"subject:Kimi No Na Wa\r\n"
        );
    }

    #[test]
    fn test_canonicalize_header_simple() {
        // `value` arrives from mailparse's `get_value_raw()`, which strips
        // the single space after the colon along with the line's own
        // terminating CRLF — this function is the one that restores both,
        // unconditionally, the same way it would for a header whose value
        // is empty.
        assert_eq!(
            canonicalize_header_simple("Subject", b"hello"),
            b"Subject: hello\r\n"
        );
    }

    #[test]
    fn test_canonicalize_body_relaxed() {
        assert_eq!(canonicalize_body_relaxed(b"\r\n"), b"\r\n");
        assert_eq!(canonicalize_body_relaxed(b"hey        \r\n"), b"hey\r\n");
        assert_eq!(
            canonicalize_body_relaxed(b" C \r\nD \t E\r\n\r\n\r\n"),
            b" C\r\nD E\r\n"
        );
    }

    #[test]
    fn test_canonicalize_body_simple() {
        assert_eq!(canonicalize_body_simple(b""), b"\r\n");
        assert_eq!(canonicalize_body_simple(b"\r\n"), b"\r\n");
        assert_eq!(canonicalize_body_simple(b"hey        \r\n"), b"hey        \r\n");
        assert_eq!(
            canonicalize_body_simple(b" C \r\nD \t E\r\n\r\n\r\n"),
            b" C \r\nD \t E\r\n"
        );
        assert_eq!(canonicalize_body_simple(b"no trailing crlf"), b"no trailing crlf\r\n");
    }

    #[test]
    fn test_canonicalize_body_relaxed_idempotent() {
        let once = canonicalize_body_relaxed(b" C \r\nD \t E\r\n\r\n\r\n");
        let twice = canonicalize_body_relaxed(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_canonicalize_header_relaxed_idempotent() {
        let once = canonicalize_header_relaxed("Subject \t", b"\t Kimi \t \r\n No \t\r\n Na Wa\r\n");
        // relaxing an already-relaxed header line (name:value\r\n, no folding)
        // must reproduce it unchanged.
        let (key, value) = once.split_at(once.iter().position(|&b| b == b':').unwrap());
        let value = &value[1..value.len() - 2];
        let twice = canonicalize_header_relaxed(std::str::from_utf8(key).unwrap(), value);
        assert_eq!(once, twice);
    }
}
