// src/membership.rs
//
// EtcdMembership (spec §4.7): snapshot-then-watch sync of two ProxySets
// (/ipv4/, /ipv6/) against an etcd v3 cluster. Grounded on
// examples/original_source/nameserver/etcd_resolver.go for the key layout
// (`/ipv4/<addr>`, `/ipv6/<addr>`) and on the teacher's pattern of a
// long-lived background task per watched resource (teacher's dns.rs
// accept-loop shape, generalized to a watch-stream loop).

use std::sync::Arc;
use std::time::Duration;

use etcd_client::{Client, EventType, GetOptions, WatchOptions};
use tokio::sync::RwLock;

use crate::error::MembershipError;
use crate::proxyset::ProxySet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    fn prefix(self) -> &'static str {
        match self {
            AddressFamily::V4 => "/ipv4/",
            AddressFamily::V6 => "/ipv6/",
        }
    }
}

/// Read-write shared structure: readers sample under a shared lock, the
/// two watcher tasks serialize writes under the same lock (spec §5
/// "Shared-resource policy").
pub struct EtcdMembership {
    client: Client,
    v4: Arc<RwLock<ProxySet>>,
    v6: Arc<RwLock<ProxySet>>,
}

impl EtcdMembership {
    /// Performs the startup snapshot-then-watch protocol and spawns the two
    /// background watcher tasks. The returned value is immediately
    /// queryable; watchers keep it in sync for the process lifetime.
    pub async fn connect(endpoints: &[String], timeout: Duration) -> Result<Self, MembershipError> {
        let mut client = Client::connect(endpoints, None).await?;

        let v4 = Arc::new(RwLock::new(ProxySet::new()));
        let v6 = Arc::new(RwLock::new(ProxySet::new()));

        let (revision, v4_initial, v6_initial) = snapshot(&mut client, timeout).await?;
        {
            let mut guard = v4.write().await;
            for addr in v4_initial {
                guard.add(addr);
            }
        }
        {
            let mut guard = v6.write().await;
            for addr in v6_initial {
                guard.add(addr);
            }
        }

        spawn_watcher(client.clone(), AddressFamily::V4, revision, v4.clone());
        spawn_watcher(client.clone(), AddressFamily::V6, revision, v6.clone());

        Ok(Self { client, v4, v6 })
    }

    pub fn set_for(&self, family: AddressFamily) -> &Arc<RwLock<ProxySet>> {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }

    /// A cloned handle to the underlying etcd client, for direct reads
    /// (e.g. ResolverCore's TXT lookup) outside the watched prefixes.
    pub fn client(&self) -> Client {
        self.client.clone()
    }
}

/// Range-gets both prefixes at a single consistent revision (spec §4.7
/// step 1-2: the v6 read pins to the revision observed from the v4 read so
/// the snapshot is consistent across both kinds).
async fn snapshot(
    client: &mut Client,
    timeout: Duration,
) -> Result<(i64, Vec<String>, Vec<String>), MembershipError> {
    let v4_resp = tokio::time::timeout(
        timeout,
        client.get(AddressFamily::V4.prefix(), Some(GetOptions::new().with_prefix())),
    )
    .await
    .map_err(|_| MembershipError::StoreContractViolation("ipv4 snapshot".into(), "timed out".into()))??;

    let revision = v4_resp
        .header()
        .ok_or_else(|| MembershipError::StoreContractViolation("ipv4 snapshot".into(), "missing header".into()))?
        .revision();

    let v6_resp = tokio::time::timeout(
        timeout,
        client.get(
            AddressFamily::V6.prefix(),
            Some(GetOptions::new().with_prefix().with_revision(revision)),
        ),
    )
    .await
    .map_err(|_| MembershipError::StoreContractViolation("ipv6 snapshot".into(), "timed out".into()))??;

    let v4_addrs = v4_resp.kvs().iter().filter_map(base_name).collect();
    let v6_addrs = v6_resp.kvs().iter().filter_map(base_name).collect();

    Ok((revision, v4_addrs, v6_addrs))
}

fn base_name(kv: &etcd_client::KeyValue) -> Option<String> {
    let key = kv.key_str().ok()?;
    key.rsplit('/').next().map(str::to_string)
}

fn spawn_watcher(mut client: Client, family: AddressFamily, from_revision: i64, set: Arc<RwLock<ProxySet>>) {
    tokio::spawn(async move {
        let result = watch_loop(&mut client, family, from_revision, &set).await;
        if let Err(e) = result {
            tracing::error!(prefix = family.prefix(), error = %e, "membership watch terminated, exiting process");
            std::process::exit(1);
        }
    });
}

async fn watch_loop(
    client: &mut Client,
    family: AddressFamily,
    from_revision: i64,
    set: &Arc<RwLock<ProxySet>>,
) -> Result<(), MembershipError> {
    let (_watcher, mut stream) = client
        .watch(
            family.prefix(),
            Some(WatchOptions::new().with_prefix().with_start_revision(from_revision + 1)),
        )
        .await?;

    loop {
        let message = stream
            .message()
            .await
            .map_err(|source| MembershipError::WatchCancelled {
                prefix: family.prefix().to_string(),
                source,
            })?;

        let Some(resp) = message else {
            return Err(MembershipError::WatchCancelled {
                prefix: family.prefix().to_string(),
                source: etcd_client::Error::WatchError("watch stream closed".into()),
            });
        };
        if resp.canceled() {
            return Err(MembershipError::WatchCancelled {
                prefix: family.prefix().to_string(),
                source: etcd_client::Error::WatchError(
                    resp.cancel_reason().to_string(),
                ),
            });
        }

        let mut guard = set.write().await;
        for event in resp.events() {
            let Some(kv) = event.kv() else { continue };
            let Some(addr) = base_name(kv) else { continue };
            match event.event_type() {
                EventType::Put if event.is_create() => guard.add(addr),
                EventType::Put => { /* value update, no new address: no-op */ }
                EventType::Delete => guard.del(&addr),
            }
        }
    }
}
