// Integration coverage for the two config-driven HostToOnion variants (spec
// §4.2, §8 scenario 6 and the associated boundary case).

use oniongateway::error::ResolveError;
use oniongateway::resolver::{HostToOnion, StaticMapResolver, SubdomainResolver};

use std::collections::HashMap;

#[tokio::test]
async fn static_map_resolver_resolves_known_host() {
    let mut map = HashMap::new();
    map.insert("pasta.cf.".to_string(), "pastagdsp33j7aoq.onion".to_string());
    let resolver = StaticMapResolver::new(map);

    let onion = resolver.resolve("pasta.cf").await.unwrap();
    assert_eq!(onion, "pastagdsp33j7aoq.onion");
}

#[tokio::test]
async fn static_map_resolver_unknown_host_fails() {
    let resolver = StaticMapResolver::new(HashMap::new());
    let err = resolver.resolve("unknown.example").await.unwrap_err();
    assert!(matches!(err, ResolveError::UnknownHost(_)));
}

#[tokio::test]
async fn subdomain_resolver_strips_parent_and_returns_onion() {
    let resolver = SubdomainResolver::new("example.com".to_string());
    let onion = resolver
        .resolve("pastagdsp33j7aoq.example.com")
        .await
        .unwrap();
    assert_eq!(onion, "pastagdsp33j7aoq.onion");
}

#[tokio::test]
async fn subdomain_resolver_rejects_wrong_length_label() {
    let resolver = SubdomainResolver::new("example.com".to_string());
    let err = resolver
        .resolve("sub.17charsxxxxxxxxxx.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::MalformedSubdomain(_)));
}

#[tokio::test]
async fn subdomain_resolver_rejects_mismatched_parent() {
    let resolver = SubdomainResolver::new("example.com".to_string());
    let err = resolver
        .resolve("pastagdsp33j7aoq.other.org")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotASubdomain { .. }));
}
