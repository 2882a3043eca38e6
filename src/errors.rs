//! Internal error type used while evaluating a single signature.
//!
//! Every variant is caught by the orchestrator and turned into a
//! [`crate::result::Verdict`] before it reaches a caller: validation
//! failures are values, never exceptions (RFC 6376 gives no fatal path for
//! a malformed signature). Checks that the orchestrator itself performs
//! inline (tag presence, expiry, `i=`/`d=` matching, `h=` coverage, `q=`)
//! build their `Verdict` directly against a `Substatus` rather than routing
//! through this type; `DKIMError` exists for the checks that live in a
//! sub-module (canonicalization tokens, key-record compatibility) and need
//! to report back through a `Result`. Tag-list parsing itself never fails
//! (`parser::tag_list` just skips malformed items), so it has no variant
//! here.

use crate::result::Substatus;

quick_error! {
    #[derive(Debug, PartialEq, Clone)]
    pub enum DKIMError {
        UnsupportedCanonicalizationHeader(value: String) {
            display("unsupported header canonicalization: {}", value)
        }
        UnsupportedCanonicalizationBody(value: String) {
            display("unsupported body canonicalization: {}", value)
        }
        PublicKeyNotFound(err: String) {
            display("public key not found: {}", err)
        }
        PublicKeyUnparseable(err: String) {
            display("public key material does not parse: {}", err)
        }
        KeyIncompatibleVersion {
            display("key record has incompatible v=")
        }
        KeyAlgoMismatch {
            display("key h= does not permit the signature's hash algorithm")
        }
        KeyTypeMismatch {
            display("key k= does not match the signature's key type")
        }
        KeyServiceTypeInvalid {
            display("key s= does not permit email")
        }
        UnsupportedHashAlgorithm(value: String) {
            display("unsupported hash algorithm: {}", value)
        }
    }
}

impl DKIMError {
    /// Maps an internal error to the stable substatus it corresponds to.
    pub fn substatus(&self) -> Substatus {
        use DKIMError::*;
        match self {
            UnsupportedCanonicalizationHeader(_) => Substatus::CHeaderAlgoInvalid,
            UnsupportedCanonicalizationBody(_) => Substatus::CBodyAlgoInvalid,
            PublicKeyNotFound(_) => Substatus::PublicKeyNotFound,
            PublicKeyUnparseable(_) => Substatus::PublicKeyFormatInvalid,
            KeyIncompatibleVersion => Substatus::PublicKeyVersionMismatch,
            KeyAlgoMismatch => Substatus::PublicKeyAlgoMismatch,
            KeyTypeMismatch => Substatus::PublicKeyTypeMismatch,
            KeyServiceTypeInvalid => Substatus::PublicKeyServiceTypeInvalid,
            UnsupportedHashAlgorithm(_) => Substatus::SignatureHashAlgoInvalid,
        }
    }
}
