//! Signature verification (C7, RFC 6376 §6.1.3 step 4). RSA only, scoped
//! to `rsa-sha1`/`rsa-sha256`; Ed25519 is out of scope.

use crate::hash::HashAlgo;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;

/// Verifies `signature` against `header_hash` (the already-hashed
/// canonical header block) under `public_key`, per the scheme `hash_algo`
/// names. Returns `Ok(())` on a valid signature and `Err(())` otherwise;
/// the caller maps that to `DKIMError::SignatureDidNotVerify`.
pub fn verify(
    hash_algo: HashAlgo,
    header_hash: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<(), ()> {
    let scheme = match hash_algo {
        HashAlgo::RsaSha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgo::RsaSha256 => Pkcs1v15Sign::new::<Sha256>(),
    };
    scheme.verify(public_key, header_hash, signature).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::RsaPrivateKey;

    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        // A small key generated solely for this test; too small for any
        // real use, but large enough to exercise PKCS#1v1.5 verify.
        const PEM: &str = include_str!("../tests/fixtures/test_rsa_key.pem");
        let private = RsaPrivateKey::from_pkcs1_pem(PEM).expect("valid test fixture key");
        let public = private.to_public_key();
        (private, public)
    }

    // Signs the already-hashed digest directly via `RsaPrivateKey::sign`,
    // mirroring what `verify` expects, rather than going through the
    // `Signer` trait, which would hash its input a second time.
    fn sign_digest(private: &RsaPrivateKey, hash_algo: HashAlgo, digest: &[u8]) -> Vec<u8> {
        let scheme = match hash_algo {
            HashAlgo::RsaSha1 => Pkcs1v15Sign::new::<Sha1>(),
            HashAlgo::RsaSha256 => Pkcs1v15Sign::new::<Sha256>(),
        };
        private.sign(scheme, digest).expect("signing with a valid key never fails")
    }

    #[test]
    fn test_verify_round_trip() {
        let (private, public) = test_keypair();
        let digest = HashAlgo::RsaSha256.digest(b"the quick brown fox");
        let signature = sign_digest(&private, HashAlgo::RsaSha256, &digest);

        assert!(verify(HashAlgo::RsaSha256, &digest, &signature, &public).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_hash() {
        let (private, public) = test_keypair();
        let digest = HashAlgo::RsaSha256.digest(b"original");
        let signature = sign_digest(&private, HashAlgo::RsaSha256, &digest);

        let tampered = HashAlgo::RsaSha256.digest(b"tampered");
        assert!(verify(HashAlgo::RsaSha256, &tampered, &signature, &public).is_err());
    }
}
