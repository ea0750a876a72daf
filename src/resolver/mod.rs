// src/resolver/mod.rs
//
// HostToOnion resolvers (spec §4.2). Three variants behind one capability;
// exactly one is active per process, chosen at startup by `select`.

mod dns_txt;
mod static_map;
mod subdomain;

pub use dns_txt::DnsTxtResolver;
pub use static_map::StaticMapResolver;
pub use subdomain::SubdomainResolver;

use crate::error::ResolveError;

#[async_trait::async_trait]
pub trait HostToOnion: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<String, ResolveError>;
}

/// One of the three resolver variants, selected once at startup (§4.2
/// "Selection rule").
pub enum Resolver {
    Static(StaticMapResolver),
    Subdomain(SubdomainResolver),
    DnsTxt(DnsTxtResolver),
}

#[async_trait::async_trait]
impl HostToOnion for Resolver {
    async fn resolve(&self, host: &str) -> Result<String, ResolveError> {
        match self {
            Resolver::Static(r) => r.resolve(host).await,
            Resolver::Subdomain(r) => r.resolve(host).await,
            Resolver::DnsTxt(r) => r.resolve(host).await,
        }
    }
}

/// Selection rule (§4.2): static map if provided, else subdomain if a parent
/// domain is provided, else DNS TXT.
pub fn select(
    host_to_onion: Option<std::collections::HashMap<String, String>>,
    parent_host: Option<String>,
) -> Resolver {
    if let Some(map) = host_to_onion {
        Resolver::Static(StaticMapResolver::new(map))
    } else if let Some(parent) = parent_host {
        Resolver::Subdomain(SubdomainResolver::new(parent))
    } else {
        Resolver::DnsTxt(DnsTxtResolver::new())
    }
}
