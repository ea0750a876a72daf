// src/resolver/subdomain.rs
//
// Ported from examples/original_source/entry_proxy/subdomain_resolver.go.

use crate::error::ResolveError;

use super::HostToOnion;

/// Strips a configured parent domain and interprets the last remaining
/// label as the onion id.
pub struct SubdomainResolver {
    parent_domain: String,
}

impl SubdomainResolver {
    pub fn new(parent_domain: String) -> Self {
        Self { parent_domain }
    }
}

fn is_onion_label(label: &str) -> bool {
    label.len() == 16 && label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[async_trait::async_trait]
impl HostToOnion for SubdomainResolver {
    async fn resolve(&self, host: &str) -> Result<String, ResolveError> {
        if !host.ends_with(&self.parent_domain) {
            return Err(ResolveError::NotASubdomain {
                host: host.to_string(),
                parent: self.parent_domain.clone(),
            });
        }

        let suffix = format!(".{}", self.parent_domain);
        let subdomains = host
            .strip_suffix(&suffix)
            .ok_or_else(|| ResolveError::NotASubdomain {
                host: host.to_string(),
                parent: self.parent_domain.clone(),
            })?;

        let onion_label = subdomains
            .rsplit('.')
            .next()
            .ok_or_else(|| ResolveError::MalformedSubdomain(host.to_string()))?;

        if is_onion_label(onion_label) {
            Ok(format!("{onion_label}.onion"))
        } else {
            Err(ResolveError::MalformedSubdomain(host.to_string()))
        }
    }
}
