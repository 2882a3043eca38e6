//! Key records and the backend that fetches them (C5/C6, RFC 6376 §3.6,
//! §6.1.2). Grounded on the enriched fork's `public_key.rs`, but widened
//! in the one place that module cuts a corner: `fetch` returns every
//! candidate key record it found (`res.first()` there carries a `TODO`
//! about key rotation breaking multi-key verification), and the
//! orchestrator tries each one.

use crate::errors::DKIMError;
use crate::hash::HashAlgo;
use crate::parser;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::BoxFuture;
use rsa::{pkcs1, pkcs8};
use std::collections::HashMap;
use std::fmt;

const DNS_NAMESPACE: &str = "_domainkey";

/// A parsed DKIM key record (RFC 6376 §3.6.1), prior to any compatibility
/// check against a particular signature.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    version: Option<String>,
    key_type: String,
    hash_restrictions: Option<Vec<String>>,
    service_types: Option<Vec<String>>,
    public_key_der: Vec<u8>,
    revoked: bool,
}

impl KeyRecord {
    /// Parses one TXT record's value. An empty `p=` means the key has
    /// been revoked (RFC 6376 §3.6.1) — `public_key_der` is left empty
    /// rather than treated as a parse failure, so a revoked key still
    /// surfaces as `PublicKeyFormatInvalid`-free information the
    /// orchestrator can report precisely.
    pub fn parse(txt: &str) -> Result<Self, DKIMError> {
        let mut tags_map = HashMap::new();
        for tag in parser::tag_list(txt) {
            tags_map.insert(tag.name.clone(), tag);
        }

        let version = tags_map.get("v").map(|t| t.value.clone());
        let key_type = tags_map
            .get("k")
            .map(|t| t.value.clone())
            .unwrap_or_else(|| "rsa".to_owned());
        let hash_restrictions = tags_map
            .get("h")
            .map(|t| t.value.split(':').map(|s| s.trim().to_owned()).collect());
        let service_types = tags_map
            .get("s")
            .map(|t| t.value.split(':').map(|s| s.trim().to_owned()).collect());

        let p_value = tags_map
            .get("p")
            .map(|t| t.value.as_str())
            .ok_or_else(|| DKIMError::PublicKeyNotFound("key record has no p= tag".to_owned()))?;

        if p_value.is_empty() {
            return Ok(KeyRecord {
                version,
                key_type,
                hash_restrictions,
                service_types,
                public_key_der: Vec::new(),
                revoked: true,
            });
        }

        let public_key_der = BASE64
            .decode(p_value)
            .map_err(|err| DKIMError::PublicKeyNotFound(format!("p= is not base64: {}", err)))?;

        Ok(KeyRecord {
            version,
            key_type,
            hash_restrictions,
            service_types,
            public_key_der,
            revoked: false,
        })
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// `v=` must be `DKIM1` if present at all (RFC 6376 §3.6.1).
    pub fn check_version(&self) -> Result<(), DKIMError> {
        match &self.version {
            Some(v) if v != "DKIM1" => Err(DKIMError::KeyIncompatibleVersion),
            _ => Ok(()),
        }
    }

    /// `k=` must agree with the signature's `a=` key type.
    pub fn check_key_type(&self, signature_key_type: &str) -> Result<(), DKIMError> {
        if self.key_type != signature_key_type {
            Err(DKIMError::KeyTypeMismatch)
        } else {
            Ok(())
        }
    }

    /// `h=` (hash-algorithm restriction tag), if present, must list the
    /// signature's hash algorithm.
    pub fn check_hash_algo(&self, hash_algo: HashAlgo) -> Result<(), DKIMError> {
        let Some(allowed) = &self.hash_restrictions else {
            return Ok(());
        };
        let name = match hash_algo {
            HashAlgo::RsaSha1 => "sha1",
            HashAlgo::RsaSha256 => "sha256",
        };
        if allowed.iter().any(|a| a == name) {
            Ok(())
        } else {
            Err(DKIMError::KeyAlgoMismatch)
        }
    }

    /// `s=` (service-type tag), if present, must include `email` or `*`.
    pub fn check_service_type(&self) -> Result<(), DKIMError> {
        let Some(types) = &self.service_types else {
            return Ok(());
        };
        if types.iter().any(|t| t == "email" || t == "*") {
            Ok(())
        } else {
            Err(DKIMError::KeyServiceTypeInvalid)
        }
    }

    /// Decodes the `p=` bytes into an RSA public key, trying SPKI first
    /// and falling back to bare PKCS#1 (both appear in the wild).
    pub fn rsa_public_key(&self) -> Result<rsa::RsaPublicKey, DKIMError> {
        use pkcs1::DecodeRsaPublicKey;
        use pkcs8::DecodePublicKey;

        rsa::RsaPublicKey::from_public_key_der(&self.public_key_der)
            .or_else(|_| rsa::RsaPublicKey::from_pkcs1_der(&self.public_key_der))
            .map_err(|err| DKIMError::PublicKeyUnparseable(format!("unparseable p=: {}", err)))
    }
}

#[derive(Debug, Clone)]
pub enum FetchError {
    /// No TXT record exists at the selector name.
    NotFound(String),
    /// The lookup itself failed (network, resolver, malformed response).
    Backend(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(name) => write!(f, "no key record at {}", name),
            FetchError::Backend(err) => write!(f, "key lookup failed: {}", err),
        }
    }
}

impl std::error::Error for FetchError {}

/// A source of DKIM key records, behind a trait so tests and alternate
/// backends (a cache, a fixture file) don't need a live resolver.
pub trait KeyProvider: Sync + Send {
    fn fetch<'a>(
        &'a self,
        domain: &'a str,
        selector: &'a str,
    ) -> BoxFuture<'a, Result<Vec<KeyRecord>, FetchError>>;
}

pub(crate) fn dns_name(domain: &str, selector: &str) -> String {
    format!("{}.{}.{}", selector, DNS_NAMESPACE, domain)
}

/// Parses every TXT string returned for a selector into a `KeyRecord`,
/// silently dropping records that don't parse as a DKIM key; a
/// zero-length result after filtering surfaces as `PublicKeyNotFound`,
/// not a parse error.
pub(crate) fn parse_candidates(txt_records: Vec<String>) -> Vec<KeyRecord> {
    txt_records
        .iter()
        .filter_map(|txt| KeyRecord::parse(txt).ok())
        .collect()
}
