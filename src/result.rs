//! The verdict types returned by [`crate::validate`].
//!
//! Modeled as a tagged variant rather than a string-typed status field:
//! `Status` carries no payload (the detail lives in `Substatus`), which
//! keeps matches on it exhaustive and cheap to extend.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Permfail,
    Tempfail,
    Unsigned,
}

/// Stable, closed set of reason codes. Adding a variant is a breaking
/// change for any caller matching exhaustively, which is the point: a
/// verdict's meaning should never silently drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substatus {
    TagMissing,
    VersionInvalid,
    CHeaderAlgoInvalid,
    CBodyAlgoInvalid,
    BodyLengthMismatch,
    AgentIdentityMismatch,
    FromHeaderNotSigned,
    SignatureExpired,
    SignatureExpiredAtSigning,
    PublicKeyNotFound,
    PublicKeyFormatInvalid,
    PublicKeyVersionMismatch,
    PublicKeyAlgoMismatch,
    PublicKeyTypeMismatch,
    PublicKeyServiceTypeInvalid,
    SignatureHashAlgoInvalid,
    BodySignatureInvalid,
    SignatureMismatch,
    Success,
    Unsigned,
}

/// One outcome for one signature against one candidate key (or, for
/// `UNSIGNED`/early-stage PERMFAILs, against no key at all).
#[derive(Debug, Clone)]
pub struct Verdict {
    pub status: Status,
    pub substatus: Substatus,
    pub reason: String,
    /// Snapshot of whatever tags were parsed before this verdict was
    /// produced; empty if the signature didn't parse at all.
    pub tags: IndexMap<String, String>,
}

impl Verdict {
    pub fn unsigned() -> Self {
        Verdict {
            status: Status::Unsigned,
            substatus: Substatus::Unsigned,
            reason: "No DKIM signatures found".to_owned(),
            tags: IndexMap::new(),
        }
    }

    pub fn success(tags: IndexMap<String, String>) -> Self {
        Verdict {
            status: Status::Success,
            substatus: Substatus::Success,
            reason: "signature verified".to_owned(),
            tags,
        }
    }

    pub fn permfail(substatus: Substatus, reason: impl Into<String>, tags: IndexMap<String, String>) -> Self {
        Verdict {
            status: Status::Permfail,
            substatus,
            reason: reason.into(),
            tags,
        }
    }

    pub fn tempfail(substatus: Substatus, reason: impl Into<String>, tags: IndexMap<String, String>) -> Self {
        Verdict {
            status: Status::Tempfail,
            substatus,
            reason: reason.into(),
            tags,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// `validate()`'s return value: outer index is the signature's position
/// in the message, inner list is one or more verdicts for that signature.
pub type ValidationResult = Vec<Vec<Verdict>>;

/// Boolean convenience wrapper: true iff there is exactly one signature
/// and its sole verdict is `SUCCESS`.
pub fn validate_boolean(result: &ValidationResult) -> bool {
    matches!(result.as_slice(), [only] if matches!(only.as_slice(), [v] if v.is_success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_wrapper_requires_single_signature_single_success() {
        let single_success = vec![vec![Verdict::success(IndexMap::new())]];
        assert!(validate_boolean(&single_success));

        let two_signatures = vec![
            vec![Verdict::success(IndexMap::new())],
            vec![Verdict::success(IndexMap::new())],
        ];
        assert!(!validate_boolean(&two_signatures));

        let two_keys = vec![vec![
            Verdict::success(IndexMap::new()),
            Verdict::permfail(Substatus::SignatureMismatch, "x", IndexMap::new()),
        ]];
        assert!(!validate_boolean(&two_keys));

        let unsigned = vec![vec![Verdict::unsigned()]];
        assert!(!validate_boolean(&unsigned));
    }
}
