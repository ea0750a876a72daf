// src/bin/entry_proxy.rs
//
// Entry Proxy binary (spec §4.1, §4.4, §4.5): TLS SNI-routed SOCKS5 gateway
// with an optional HTTP->HTTPS redirect listener. CLI flag table follows
// spec.md §6 ("CLI (entry proxy)") verbatim; staged startup follows the
// teacher's src/main.rs numbered-section style. `.env` overrides follow the
// teacher's config.rs (`dotenvy::dotenv()` then env-backed values), wired
// here via clap's `env` attribute rather than hand-rolled `env::var` calls.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use oniongateway::entry_proxy::EntryProxy;
use oniongateway::redirect::HttpRedirect;
use oniongateway::resolver;
use oniongateway::socks::SocksDialer;

#[derive(Parser, Debug)]
#[command(author, version, about = "TLS SNI entry proxy for onion services", long_about = None)]
struct Args {
    /// Network for the upstream SOCKS5 dial; only "tcp" is supported
    #[arg(long = "proxyNet", env = "ONIONGATEWAY_PROXY_NET", default_value = "tcp")]
    proxy_net: String,

    /// Upstream SOCKS5 proxy address
    #[arg(long = "proxyAddr", env = "ONIONGATEWAY_PROXY_ADDR", default_value = "127.0.0.1:9050")]
    proxy_addr: String,

    /// TLS listen address
    #[arg(long = "entry-proxy", env = "ONIONGATEWAY_ENTRY_PROXY", default_value = "0.0.0.0:443")]
    entry_proxy: String,

    /// HTTP->HTTPS redirect listen address; empty disables it
    #[arg(long = "http-redirect", env = "ONIONGATEWAY_HTTP_REDIRECT", default_value = "0.0.0.0:80")]
    http_redirect: String,

    /// Port on the onion service to connect to
    #[arg(long = "onion-port", env = "ONIONGATEWAY_ONION_PORT", default_value_t = 443)]
    onion_port: u16,

    /// YAML path for the static Host2Onion map; takes precedence over `-parent-host`
    #[arg(long = "host-to-onion", env = "ONIONGATEWAY_HOST_TO_ONION")]
    host_to_onion: Option<std::path::PathBuf>,

    /// Parent domain for subdomain-based onion resolution, e.g. example.com
    #[arg(long = "parent-host", env = "ONIONGATEWAY_PARENT_HOST")]
    parent_host: Option<String>,

    /// Public HTTPS port clients are redirected to (appended to the Location
    /// header only when it differs from 443)
    #[arg(long, env = "ONIONGATEWAY_PUBLIC_HTTPS_PORT", default_value_t = 443)]
    public_https_port: u16,

    /// Skip the startup Tor2Web sanity check
    #[arg(long)]
    skip_tor2web_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ------------------------------------------------------------
    // 1. Logging + .env
    // ------------------------------------------------------------
    let _ = dotenvy::dotenv();
    oniongateway::logging::init();

    let args = Args::parse();
    if args.proxy_net != "tcp" {
        anyhow::bail!("-proxyNet {:?} unsupported: only \"tcp\" is implemented", args.proxy_net);
    }

    // ------------------------------------------------------------
    // 2. Load optional static config
    // ------------------------------------------------------------
    let host2onion: Option<HashMap<String, String>> = match &args.host_to_onion {
        Some(path) => {
            let cfg = oniongateway::config::StaticConfig::load(path)
                .context("failed to load -host-to-onion config")?;
            if cfg.host2onion.is_empty() {
                None
            } else {
                Some(cfg.host2onion_fqdn())
            }
        }
        None => None,
    };

    // ------------------------------------------------------------
    // 3. Select resolver variant
    // ------------------------------------------------------------
    let resolver = Arc::new(resolver::select(host2onion, args.parent_host.clone()));

    // ------------------------------------------------------------
    // 4. SOCKS5 dialer + fire-and-forget Tor2Web sanity check
    // ------------------------------------------------------------
    let dialer = SocksDialer::new(args.proxy_addr.clone());
    if !args.skip_tor2web_check {
        let dialer = dialer.clone();
        tokio::spawn(async move {
            dialer.tor2web_sanity_check().await;
        });
    }

    // ------------------------------------------------------------
    // 5. Entry proxy
    // ------------------------------------------------------------
    let entry_proxy = Arc::new(EntryProxy::new(resolver, dialer, args.onion_port));
    {
        let entry_proxy = entry_proxy.clone();
        let listen_addr = args.entry_proxy.clone();
        tokio::spawn(async move {
            if let Err(e) = entry_proxy.serve(&listen_addr).await {
                error!("CRITICAL: entry proxy crashed: {e}");
                std::process::exit(1);
            }
        });
    }

    // ------------------------------------------------------------
    // 6. Optional HTTP redirect listener
    // ------------------------------------------------------------
    if !args.http_redirect.is_empty() {
        let redirect = HttpRedirect::new(args.public_https_port);
        let redirect_addr = args.http_redirect.clone();
        tokio::spawn(async move {
            if let Err(e) = redirect.serve(&redirect_addr).await {
                error!("CRITICAL: http redirect crashed: {e}");
                std::process::exit(1);
            }
        });
    }

    // ------------------------------------------------------------
    // 7. Shutdown handling
    // ------------------------------------------------------------
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!("failed to listen for shutdown signal: {e}"),
    }

    Ok(())
}
