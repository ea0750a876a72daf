// src/config.rs

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// One `(host, onion)` pairing from the legacy checker config. Kept so a real
/// oniongateway YAML file deserializes cleanly; nothing in this crate reads
/// it back out (the checker itself is out of scope, per spec.md §1).
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "ExpectedText", default)]
    pub expected_text: String,
}

/// The full static-mode YAML document (§6 "YAML config (static mode)").
/// Every field is optional: an empty document is a valid (empty) config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfig {
    #[serde(rename = "Rules", default)]
    pub rules: Vec<Rule>,
    #[serde(rename = "RedirectRules", default)]
    pub redirect_rules: Vec<String>,
    #[serde(rename = "IPv4Proxies", default)]
    pub ipv4_proxies: Vec<String>,
    #[serde(rename = "IPv6Proxies", default)]
    pub ipv6_proxies: Vec<String>,
    #[serde(rename = "Domain2Onion", default)]
    pub domain2onion: HashMap<String, String>,
    #[serde(rename = "Host2Onion", default)]
    pub host2onion: HashMap<String, String>,
}

impl StaticConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read static config {}: {e}", path.display()))?;
        let cfg: StaticConfig = serde_yaml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse static config {}: {e}", path.display()))?;
        Ok(cfg)
    }

    /// Host->onion map, re-keyed to trailing-dot (FQDN) form as the static
    /// resolver expects (§3 "FQDN normalization").
    pub fn host2onion_fqdn(&self) -> HashMap<String, String> {
        self.host2onion
            .iter()
            .map(|(host, onion)| (fqdn(host), onion.clone()))
            .collect()
    }
}

/// Normalize a hostname to trailing-dot FQDN form, e.g. `pasta.cf` -> `pasta.cf.`.
pub fn fqdn(host: &str) -> String {
    if host.ends_with('.') {
        host.to_string()
    } else {
        format!("{host}.")
    }
}
