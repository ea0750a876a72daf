// src/resolver/dns_txt.rs
//
// Ported from examples/original_source/entry_proxy/resolve_to_onion.go. The
// regex is per-resolver-instance, not a process global (spec §9 "Global
// state"), which avoids any initialization race around a shared static.

use hickory_resolver::TokioAsyncResolver;
use regex::Regex;

use crate::error::ResolveError;

use super::HostToOnion;

pub struct DnsTxtResolver {
    resolver: TokioAsyncResolver,
    onion_pattern: Regex,
}

impl DnsTxtResolver {
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .unwrap_or_else(|_| TokioAsyncResolver::tokio(Default::default(), Default::default()));
        Self {
            resolver,
            onion_pattern: Regex::new(r"(^| )onion=([a-z0-9]{16}\.onion)( |$)")
                .expect("static onion TXT regex is valid"),
        }
    }
}

impl Default for DnsTxtResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HostToOnion for DnsTxtResolver {
    async fn resolve(&self, host: &str) -> Result<String, ResolveError> {
        let lookup = self
            .resolver
            .txt_lookup(host)
            .await
            .map_err(|e| ResolveError::Dns {
                host: host.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?;

        let mut saw_any = false;
        for record in lookup.iter() {
            saw_any = true;
            let txt = record
                .txt_data()
                .iter()
                .map(|chunk| String::from_utf8_lossy(chunk))
                .collect::<String>();
            if let Some(captures) = self.onion_pattern.captures(&txt) {
                return Ok(captures[2].to_string());
            }
        }

        if !saw_any {
            Err(ResolveError::NoTxtRecords(host.to_string()))
        } else {
            Err(ResolveError::NoMatchingTxtRecord(host.to_string()))
        }
    }
}
