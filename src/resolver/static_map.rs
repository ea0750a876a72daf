// src/resolver/static_map.rs
//
// Ported from examples/original_source/entry_proxy/static_resolver.go.

use std::collections::HashMap;

use crate::config::fqdn;
use crate::error::ResolveError;

use super::HostToOnion;

/// Fixed FQDN->onion map loaded once from config; immutable after load.
pub struct StaticMapResolver {
    host2onion: HashMap<String, String>,
}

impl StaticMapResolver {
    pub fn new(host2onion: HashMap<String, String>) -> Self {
        Self { host2onion }
    }
}

#[async_trait::async_trait]
impl HostToOnion for StaticMapResolver {
    async fn resolve(&self, host: &str) -> Result<String, ResolveError> {
        self.host2onion
            .get(&fqdn(host))
            .cloned()
            .ok_or_else(|| ResolveError::UnknownHost(host.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_host() {
        let mut map = HashMap::new();
        map.insert("pasta.cf.".to_string(), "pastagdsp33j7aoq.onion".to_string());
        let resolver = StaticMapResolver::new(map);
        assert_eq!(resolver.resolve("pasta.cf").await.unwrap(), "pastagdsp33j7aoq.onion");
        assert_eq!(resolver.resolve("pasta.cf.").await.unwrap(), "pastagdsp33j7aoq.onion");
    }

    #[tokio::test]
    async fn missing_key_fails() {
        let resolver = StaticMapResolver::new(HashMap::new());
        assert!(resolver.resolve("unknown.example").await.is_err());
    }
}
