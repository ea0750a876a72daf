// src/dns/mod.rs
//
// ResolverCore (spec §4.8): answers (qname, qtype) -> [answer] against
// either a static config or the live etcd-backed membership store.
// Grounded on examples/original_source/nameserver/{etcd_resolver,
// fixed_resolver,static_resolver}.go, generalized into one enum dispatch in
// the same shape as resolver::Resolver.

mod handler;

pub use handler::DnsHandler;

use std::collections::HashMap;

use crate::error::ResolverCoreError;
use crate::membership::{AddressFamily, EtcdMembership};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    A,
    Aaaa,
    Txt,
}

pub enum ResolverCore {
    Etcd(EtcdResolverCore),
    Static(StaticResolverCore),
}

impl ResolverCore {
    pub async fn resolve(&self, name: &str, kind: RecordKind) -> Result<Vec<String>, ResolverCoreError> {
        match self {
            ResolverCore::Etcd(r) => r.resolve(name, kind).await,
            ResolverCore::Static(r) => r.resolve(name, kind).await,
        }
    }
}

/// Etcd-backed core: A/AAAA come from the live ProxySets, TXT from a direct
/// `/domain2onion/<name>` range-get (spec §4.8, "one Get ... (etcd)").
pub struct EtcdResolverCore {
    membership: std::sync::Arc<EtcdMembership>,
    etcd: etcd_client::Client,
    answer_count: usize,
}

impl EtcdResolverCore {
    pub fn new(membership: std::sync::Arc<EtcdMembership>, etcd: etcd_client::Client, answer_count: usize) -> Self {
        Self {
            membership,
            etcd,
            answer_count,
        }
    }

    async fn resolve(&self, name: &str, kind: RecordKind) -> Result<Vec<String>, ResolverCoreError> {
        match kind {
            RecordKind::A => self.sample(AddressFamily::V4).await,
            RecordKind::Aaaa => self.sample(AddressFamily::V6).await,
            RecordKind::Txt => self.txt_lookup(name).await,
        }
    }

    async fn sample(&self, family: AddressFamily) -> Result<Vec<String>, ResolverCoreError> {
        let set = self.membership.set_for(family);
        let guard = set.read().await;
        if guard.is_empty() {
            return Err(ResolverCoreError::NoProxies);
        }
        let mut rng = rand::thread_rng();
        Ok(guard.sample(&mut rng, self.answer_count))
    }

    async fn txt_lookup(&self, name: &str) -> Result<Vec<String>, ResolverCoreError> {
        let key = format!("/domain2onion/{name}");
        let mut client = self.etcd.clone();
        let resp = client.get(key, None).await?;
        let kv = resp
            .kvs()
            .first()
            .ok_or_else(|| ResolverCoreError::UnknownDomain(name.to_string()))?;
        let onion = String::from_utf8_lossy(kv.value()).to_string();
        Ok(vec![format!("onion={onion}")])
    }
}

/// Static-config-backed core: used when the nameserver is launched with
/// `-static-config` instead of `-etcd-endpoints`.
pub struct StaticResolverCore {
    ipv4_proxies: Vec<String>,
    ipv6_proxies: Vec<String>,
    domain2onion: HashMap<String, String>,
    answer_count: usize,
}

impl StaticResolverCore {
    pub fn new(
        ipv4_proxies: Vec<String>,
        ipv6_proxies: Vec<String>,
        domain2onion: HashMap<String, String>,
        answer_count: usize,
    ) -> Self {
        Self {
            ipv4_proxies,
            ipv6_proxies,
            domain2onion,
            answer_count,
        }
    }

    async fn resolve(&self, name: &str, kind: RecordKind) -> Result<Vec<String>, ResolverCoreError> {
        match kind {
            RecordKind::A => sample_static(&self.ipv4_proxies, self.answer_count),
            RecordKind::Aaaa => sample_static(&self.ipv6_proxies, self.answer_count),
            RecordKind::Txt => self
                .domain2onion
                .get(name)
                .map(|onion| vec![format!("onion={onion}")])
                .ok_or_else(|| ResolverCoreError::UnknownDomain(name.to_string())),
        }
    }
}

fn sample_static(proxies: &[String], k: usize) -> Result<Vec<String>, ResolverCoreError> {
    if proxies.is_empty() {
        return Err(ResolverCoreError::NoProxies);
    }
    use rand::seq::SliceRandom;
    let mut rng = rand::thread_rng();
    let mut chosen: Vec<String> = proxies.to_vec();
    chosen.shuffle(&mut rng);
    chosen.truncate(k.min(chosen.len()));
    Ok(chosen)
}
