// src/error.rs

use thiserror::Error;

/// Failures from [`crate::sni::peek_sni`].
#[derive(Debug, Error)]
pub enum SniError {
    #[error("not a TLS ClientHello")]
    NotTls,
    #[error("ClientHello had no server_name extension")]
    NoSni,
    #[error("connection closed before the ClientHello was complete")]
    ShortRead,
    #[error("io error while peeking ClientHello: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from a [`crate::resolver::HostToOnion`] implementation.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("DNS TXT lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no TXT records for {0}")]
    NoTxtRecords(String),
    #[error("no TXT record for {0} matched onion=<16-char>.onion")]
    NoMatchingTxtRecord(String),
    #[error("no onion mapping for host {0}")]
    UnknownHost(String),
    #[error("host {host} is not a subdomain of {parent}")]
    NotASubdomain { host: String, parent: String },
    #[error("subdomain label {0:?} is not a valid 16-character onion id")]
    MalformedSubdomain(String),
}

/// Failures dialing the SOCKS5 upstream.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("failed to dial {target} via SOCKS5 proxy {proxy}: {source}")]
    Socks {
        target: String,
        proxy: String,
        #[source]
        source: tokio_socks::Error,
    },
}

/// Failures from [`crate::dns::ResolverCore`].
#[derive(Debug, Error)]
pub enum ResolverCoreError {
    #[error("no proxies registered for this query type")]
    NoProxies,
    #[error("unknown domain {0:?}")]
    UnknownDomain(String),
    #[error("unsupported query type")]
    Unsupported,
    #[error("etcd query failed: {0}")]
    Etcd(#[from] etcd_client::Error),
}

/// Fatal failures from the etcd membership watcher; these terminate the process.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("etcd watch for prefix {prefix:?} was cancelled or errored: {source}")]
    WatchCancelled {
        prefix: String,
        #[source]
        source: etcd_client::Error,
    },
    #[error("etcd store contract violation: unexpected event kind {0:?} on prefix {1:?}")]
    StoreContractViolation(String, String),
    #[error("etcd client error: {0}")]
    Etcd(#[from] etcd_client::Error),
}
