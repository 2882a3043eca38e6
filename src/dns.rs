//! Default [`crate::key::KeyProvider`] backend, backed by
//! `trust-dns-resolver`. Gated behind the `dns` feature so a caller
//! supplying its own provider — a cache, a test fixture — doesn't need
//! to pull in a resolver at all.

use crate::key::{dns_name, parse_candidates, FetchError, KeyProvider, KeyRecord};
use futures::future::BoxFuture;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;

pub struct DnsKeyProvider {
    resolver: TokioAsyncResolver,
}

impl DnsKeyProvider {
    /// Builds a provider from the system's resolver configuration
    /// (`/etc/resolv.conf` on Unix).
    pub fn from_system_conf() -> Result<Self, ResolveError> {
        Ok(DnsKeyProvider {
            resolver: TokioAsyncResolver::tokio_from_system_conf()?,
        })
    }

    pub fn new(resolver: TokioAsyncResolver) -> Self {
        DnsKeyProvider { resolver }
    }
}

fn to_fetch_error(name: &str, err: ResolveError) -> FetchError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => FetchError::NotFound(name.to_owned()),
        _ => FetchError::Backend(err.to_string()),
    }
}

impl KeyProvider for DnsKeyProvider {
    fn fetch<'a>(
        &'a self,
        domain: &'a str,
        selector: &'a str,
    ) -> BoxFuture<'a, Result<Vec<KeyRecord>, FetchError>> {
        Box::pin(async move {
            let name = dns_name(domain, selector);
            let response = self
                .resolver
                .txt_lookup(&name)
                .await
                .map_err(|err| to_fetch_error(&name, err))?;

            let txt_records: Vec<String> = response
                .into_iter()
                .map(|txt| {
                    txt.iter()
                        .map(|chunk| String::from_utf8_lossy(chunk))
                        .collect()
                })
                .collect();

            Ok(parse_candidates(txt_records))
        })
    }
}
