//! DKIM (RFC 6376) signature verification.
//!
//! [`validate`] walks every `DKIM-Signature` header on a [`Message`],
//! runs the checks of RFC 6376 §6.1 in order, and returns one verdict
//! list per signature (one verdict per candidate key on success,
//! possibly several `PERMFAIL`s if more than one precondition fails).
//! [`validate_boolean`] collapses that into the single yes/no answer
//! most callers actually want.

#[macro_use]
extern crate quick_error;

mod bytes;
pub mod canonicalization;
mod crypto;
#[cfg(feature = "dns")]
pub mod dns;
mod errors;
mod hash;
mod header;
mod key;
mod message;
mod parser;
mod result;

pub use errors::DKIMError;
pub use key::{FetchError, KeyProvider, KeyRecord};
pub use message::{Message, MessageParseError};
pub use parser::Tag;
pub use result::{Status, Substatus, ValidationResult, Verdict, validate_boolean};

use header::{SignatureTags, HEADER};
use result::Verdict as V;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use slog::debug;

/// The knobs a caller gets to turn: whether `rsa-sha1` is accepted at
/// all (RFC 6376 permits a verifier to refuse it) and what time `x=`/`t=`
/// checks run against. Defaulting `now` to `None` means "ask the system
/// clock"; tests that need determinism set it explicitly rather than
/// compare against a moving target.
#[derive(Clone, Debug)]
pub struct VerifierOptions {
    pub permit_rsa_sha1: bool,
    pub now: Option<chrono::NaiveDateTime>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        VerifierOptions {
            permit_rsa_sha1: true,
            now: None,
        }
    }
}

impl VerifierOptions {
    fn now(&self) -> chrono::NaiveDateTime {
        self.now.unwrap_or_else(|| chrono::Utc::now().naive_utc())
    }
}

/// Runs the full verification pipeline (C8) over every `DKIM-Signature`
/// header in `message`, in message order.
///
/// The outer list is never empty: if the message carries no
/// `DKIM-Signature` at all, the result is exactly one `UNSIGNED` verdict
/// rather than an empty outer list.
pub async fn validate(
    logger: &slog::Logger,
    message: &Message,
    key_provider: &dyn KeyProvider,
    options: &VerifierOptions,
) -> ValidationResult {
    let signature_values = message.dkim_signature_values();
    if signature_values.is_empty() {
        return vec![vec![V::unsigned()]];
    }

    let all_headers = message.all_headers();
    let body = message.body();

    // Scoped to this one call, never shared across calls, so two
    // signatures naming the same (domain, selector) — e.g. an original
    // signature and a forwarder's re-signature over the same key — only
    // cost one key-provider round trip.
    let mut key_cache: std::collections::HashMap<(String, String), Vec<KeyRecord>> =
        std::collections::HashMap::new();

    let mut results = Vec::with_capacity(signature_values.len());
    for raw in &signature_values {
        debug!(logger, "evaluating signature"; "raw" => raw.as_str());
        results.push(
            evaluate_signature(logger, raw, &all_headers, &body, key_provider, options, &mut key_cache).await,
        );
    }
    results
}

/// Per-signature state machine: `Parsing -> Validating -> BodyHash ->
/// KeyLookup -> Crypto -> Terminal`. `has_permfail` tracks whether the
/// signature has already failed Validating/BodyHash; once true, KeyLookup
/// and Crypto never run.
async fn evaluate_signature(
    logger: &slog::Logger,
    raw: &str,
    all_headers: &[(String, String)],
    body: &[u8],
    key_provider: &dyn KeyProvider,
    options: &VerifierOptions,
    key_cache: &mut std::collections::HashMap<(String, String), Vec<KeyRecord>>,
) -> Vec<Verdict> {
    use result::Substatus as S;

    // --- Parsing --- (never fails; malformed tag-list items are simply
    // skipped, so a missing-required-tag verdict below is how a broken
    // signature actually gets reported).
    let tags = SignatureTags::parse(raw);
    let snapshot = tags.snapshot();

    let mut verdicts = Vec::new();
    let mut has_permfail = false;

    // Step 1: required tags. A missing tag still produces a verdict, but
    // later steps that read that tag are skipped rather than panicking.
    for name in tags.missing_required_tags() {
        verdicts.push(V::permfail(
            S::TagMissing,
            format!("signature is missing the required tag '{}'", name),
            snapshot.clone(),
        ));
        has_permfail = true;
    }

    // Step 2: v=1.
    if let Some(v) = tags.get("v") {
        if v != "1" {
            verdicts.push(V::permfail(S::VersionInvalid, "v= is not '1'", snapshot.clone()));
            has_permfail = true;
        }
    }

    // Step 3: c=, defaulting to simple/simple and defaulting a bare
    // header-only value's body half to simple.
    let canon = match parser::parse_canonicalization(tags.get("c")) {
        Ok(c) => Some(c),
        Err(err) => {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            has_permfail = true;
            None
        }
    };

    // Step 4: canonicalize the body (needed below for bh= and l=).
    let canonical_body = canon.map(|(_, body_canon)| canonicalization::canonicalize_body(body_canon, body));

    // Step 5: l= must not exceed the canonical body's length.
    if let Some(canonical) = &canonical_body {
        if let Some(l) = tags.get("l") {
            let within_bounds = l.parse::<usize>().map(|limit| limit <= canonical.len()).unwrap_or(false);
            if !within_bounds {
                verdicts.push(V::permfail(
                    S::BodyLengthMismatch,
                    "l= exceeds the canonical body length",
                    snapshot.clone(),
                ));
                has_permfail = true;
            }
        }
    }

    // Step 6: i=, if present, must name d= or a subdomain of it.
    if let (Some(i), Some(d)) = (tags.get("i"), tags.get("d")) {
        if !agent_identity_matches(i, d) {
            verdicts.push(V::permfail(
                S::AgentIdentityMismatch,
                "i= domain is not d= or a subdomain of d=",
                snapshot.clone(),
            ));
            has_permfail = true;
        }
    }

    // Step 7: h= must cover From.
    if let Some(h) = tags.get("h") {
        let signs_from = h.split(':').any(|name| name.trim().eq_ignore_ascii_case("from"));
        if !signs_from {
            verdicts.push(V::permfail(
                S::FromHeaderNotSigned,
                "h= does not include From",
                snapshot.clone(),
            ));
            has_permfail = true;
        }
    }

    // Step 8: x= expiry, both against now and against t=.
    if let Some(x) = tags.get("x") {
        if let Ok(x_val) = x.parse::<i64>() {
            if x_val < options.now().timestamp() {
                verdicts.push(V::permfail(S::SignatureExpired, "x= is in the past", snapshot.clone()));
                has_permfail = true;
            } else if let Some(t_val) = tags.get("t").and_then(|t| t.parse::<i64>().ok()) {
                if x_val < t_val {
                    verdicts.push(V::permfail(
                        S::SignatureExpiredAtSigning,
                        "x= predates t=",
                        snapshot.clone(),
                    ));
                    has_permfail = true;
                }
            }
        }
    }

    // Step 9: any PERMFAIL so far means no DNS, no crypto.
    if has_permfail {
        return verdicts;
    }

    // Step 10: q=, defaulting to dns/txt.
    let q = tags.get("q").unwrap_or("dns/txt");
    if q != "dns/txt" {
        verdicts.push(V::permfail(
            S::PublicKeyFormatInvalid,
            "q= names an unsupported query method",
            snapshot.clone(),
        ));
        return verdicts;
    }

    // Past this point every required tag is present and step 2-8's
    // checks passed, so every `.unwrap()` below is on a tag whose
    // presence was already confirmed.
    let d = tags.get("d").unwrap();
    let s = tags.get("s").unwrap();
    let h = tags.get("h").unwrap();
    let (header_canon, _body_canon) = canon.unwrap();

    let (key_type, hash_algo) = match parser::parse_hash_algo(tags.get("a").unwrap()) {
        Ok(v) => v,
        Err(err) => {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            return verdicts;
        }
    };
    if hash_algo == hash::HashAlgo::RsaSha1 && !options.permit_rsa_sha1 {
        verdicts.push(V::permfail(
            S::SignatureHashAlgoInvalid,
            "rsa-sha1 is disabled by the caller's VerifierOptions",
            snapshot.clone(),
        ));
        return verdicts;
    }

    // Step 11: resolve candidate keys, reusing a prior fetch for the same
    // (domain, selector) within this call rather than hitting the
    // provider again.
    let cache_key = (d.to_owned(), s.to_owned());
    let keys = if let Some(cached) = key_cache.get(&cache_key) {
        cached.clone()
    } else {
        let fetched = match key_provider.fetch(d, s).await {
            Ok(keys) if !keys.is_empty() => keys,
            Ok(_) => {
                verdicts.push(V::tempfail(
                    S::PublicKeyNotFound,
                    format!("no usable key records at {}._domainkey.{}", s, d),
                    snapshot.clone(),
                ));
                return verdicts;
            }
            Err(err) => {
                debug!(logger, "key lookup failed"; "error" => err.to_string());
                verdicts.push(V::tempfail(S::PublicKeyNotFound, err.to_string(), snapshot.clone()));
                return verdicts;
            }
        };
        key_cache.insert(cache_key, fetched.clone());
        fetched
    };

    // Step 12: body hash.
    let canonical_body = canonical_body.unwrap();
    let limit = match tags.get("l") {
        Some(l) => l.parse::<usize>().expect("validated in step 5"),
        None => canonical_body.len(),
    };
    let computed_bh = BASE64.encode(hash_algo.digest(&canonical_body[..limit]));
    if computed_bh != tags.get("bh").unwrap() {
        verdicts.push(V::permfail(
            S::BodySignatureInvalid,
            "bh= does not match the computed body hash",
            snapshot.clone(),
        ));
        return verdicts;
    }

    let selected_headers = hash::select_headers(h, all_headers);
    let signed_header_hash = hash::compute_headers_hash(
        header_canon,
        &selected_headers,
        hash_algo,
        HEADER,
        &tags.raw_with_blank_b(),
    );

    let signature_bytes = match BASE64.decode(tags.get("b").unwrap()) {
        Ok(bytes) => bytes,
        Err(err) => {
            verdicts.push(V::permfail(
                S::SignatureMismatch,
                format!("b= is not valid base64: {}", err),
                snapshot.clone(),
            ));
            return verdicts;
        }
    };

    // Step 13: per candidate key. Does not short-circuit; every key
    // yields its own verdict.
    for candidate in &keys {
        if candidate.is_revoked() {
            verdicts.push(V::permfail(
                S::SignatureMismatch,
                "key has been revoked (p= is empty)",
                snapshot.clone(),
            ));
            continue;
        }
        if let Err(err) = candidate.check_version() {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            continue;
        }
        if let Err(err) = candidate.check_key_type(&key_type) {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            continue;
        }
        if let Err(err) = candidate.check_service_type() {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            continue;
        }
        if let Err(err) = candidate.check_hash_algo(hash_algo) {
            verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
            continue;
        }

        let public_key = match candidate.rsa_public_key() {
            Ok(pk) => pk,
            Err(err) => {
                verdicts.push(V::permfail(err.substatus(), err.to_string(), snapshot.clone()));
                continue;
            }
        };

        match crypto::verify(hash_algo, &signed_header_hash, &signature_bytes, &public_key) {
            Ok(()) => verdicts.push(V::success(snapshot.clone())),
            Err(()) => verdicts.push(V::permfail(
                S::SignatureMismatch,
                "signature did not verify under this key",
                snapshot.clone(),
            )),
        }
    }

    verdicts
}

/// RFC 6376 §3.5 / REDESIGN FLAGS: `i=`'s domain part must equal `d=` or
/// be a proper subdomain of it, not merely end with the same characters
/// (the source's `substr($i, -len($d)) === $d` would wrongly accept
/// `evild.com` against `d=d.com`).
fn agent_identity_matches(i: &str, d: &str) -> bool {
    let domain_part = i.rsplit('@').next().unwrap_or("").to_lowercase();
    let d = d.to_lowercase();
    domain_part == d || domain_part.ends_with(&format!(".{}", d))
}
