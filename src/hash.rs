//! The body hasher and header-hash assembler (C4, RFC 6376 §3.7, §5.4).
//!
//! Header selection is grounded on the enriched fork's `select_headers`
//! helper: RFC 6376 §5.4.2 consumes repeated header names bottom-up, so a
//! signer that only signed the oldest `Received` header of three can't be
//! satisfied by matching the newest one.

use crate::canonicalization::{canonicalize_header, Type};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgo {
    RsaSha1,
    RsaSha256,
}

impl HashAlgo {
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgo::RsaSha1 => Sha1::digest(data).to_vec(),
            HashAlgo::RsaSha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Selects, in order, the header instances named by a `h=` tag, consuming
/// repeated names from the bottom of the message upward (RFC 6376
/// §5.4.2). A name with no remaining unused instance is simply omitted
/// from the result, matching how a signer that didn't actually have that
/// header would have signed nothing for it.
pub fn select_headers<'a>(
    h_tag: &str,
    headers: &'a [(String, String)],
) -> Vec<&'a (String, String)> {
    let mut search_ceiling: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::new();

    for name in h_tag.split(':') {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        let ceiling = *search_ceiling.get(&name).unwrap_or(&headers.len());
        let found = headers[..ceiling]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (key, _))| key.eq_ignore_ascii_case(&name));

        if let Some((idx, header)) = found {
            selected.push(header);
            search_ceiling.insert(name, idx);
        }
    }

    selected
}

/// Builds the canonical header block covered by a signature and hashes
/// it: the selected headers in `h=` order, followed by the
/// `DKIM-Signature` header itself with its `b=` value blanked and,
/// per RFC 6376 §3.7, with no trailing CRLF.
pub fn compute_headers_hash(
    canon_type: Type,
    selected_headers: &[&(String, String)],
    hash_algo: HashAlgo,
    dkim_header_key: &str,
    dkim_header_blanked_value: &str,
) -> Vec<u8> {
    let mut block = Vec::new();
    for (key, value) in selected_headers {
        block.extend(canonicalize_header(canon_type, key, value.as_bytes()));
    }

    let mut signature_line = canonicalize_header(
        canon_type,
        dkim_header_key,
        dkim_header_blanked_value.as_bytes(),
    );
    if signature_line.ends_with(b"\r\n") {
        signature_line.truncate(signature_line.len() - 2);
    }
    block.extend(signature_line);

    hash_algo.digest(&block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_select_headers_simple_order() {
        let h = headers(&[("From", " a@b"), ("To", " c@d"), ("Subject", " hi")]);
        let selected = select_headers("subject:from", &h);
        assert_eq!(
            selected,
            vec![&("Subject".to_string(), " hi".to_string()), &("From".to_string(), " a@b".to_string())]
        );
    }

    #[test]
    fn test_select_headers_bottom_up_on_repeats() {
        let h = headers(&[
            ("Received", " first"),
            ("Received", " second"),
            ("Received", " third"),
            ("From", " a@b"),
        ]);
        // h=received:received names the field twice: bottom-up consumes
        // "third" then "second", never touching "first".
        let selected = select_headers("received:received", &h);
        assert_eq!(
            selected,
            vec![
                &("Received".to_string(), " third".to_string()),
                &("Received".to_string(), " second".to_string())
            ]
        );
    }

    #[test]
    fn test_select_headers_missing_name_is_omitted() {
        let h = headers(&[("From", " a@b")]);
        let selected = select_headers("from:subject", &h);
        assert_eq!(selected, vec![&("From".to_string(), " a@b".to_string())]);
    }
}
