// src/bin/nameserver.rs
//
// Authoritative nameserver binary (spec §4.8, §4.9): serves A/AAAA/TXT
// answers from either a static YAML config or a live etcd membership store.
// CLI flag table follows spec.md §6 ("CLI (nameserver)") verbatim, generalized
// with clap's ArgGroup for the static/etcd exclusivity the Go version didn't
// need (it only ever had the fixed resolver wired up). `.env` overrides
// follow the teacher's config.rs idiom, wired via clap's `env` attribute.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use oniongateway::config::StaticConfig;
use oniongateway::dns::{DnsHandler, EtcdResolverCore, ResolverCore, StaticResolverCore};
use oniongateway::membership::EtcdMembership;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative DNS server for onion gateway membership", long_about = None)]
#[command(group(
    clap::ArgGroup::new("backend")
        .required(true)
        .args(["static_config", "etcd_endpoints"]),
))]
struct Args {
    /// Static YAML config providing IPv4Proxies/IPv6Proxies/Domain2Onion
    #[arg(long = "static-config", env = "ONIONGATEWAY_STATIC_CONFIG")]
    static_config: Option<std::path::PathBuf>,

    /// Comma-separated etcd v3 endpoints
    #[arg(long = "etcd-endpoints", env = "ONIONGATEWAY_ETCD_ENDPOINTS", value_delimiter = ',')]
    etcd_endpoints: Option<Vec<String>>,

    /// Timeout for etcd range-gets, in milliseconds
    #[arg(long = "etcd-timeout", env = "ONIONGATEWAY_ETCD_TIMEOUT", default_value_t = 2000)]
    etcd_timeout: u64,

    /// Address to listen on
    #[arg(long = "listen-addr", env = "ONIONGATEWAY_LISTEN_ADDR", default_value = "0.0.0.0:4253")]
    listen_addr: String,

    /// Network to serve on: "udp" or "tcp"
    #[arg(long = "listen-net", env = "ONIONGATEWAY_LISTEN_NET", default_value = "udp")]
    listen_net: String,

    /// Number of proxy addresses to return per A/AAAA answer
    #[arg(long = "answer-count", env = "ONIONGATEWAY_ANSWER_COUNT", default_value_t = 2)]
    answer_count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ------------------------------------------------------------
    // 1. Logging + .env
    // ------------------------------------------------------------
    let _ = dotenvy::dotenv();
    oniongateway::logging::init();

    let args = Args::parse();
    if args.answer_count == 0 {
        anyhow::bail!("-answer-count must be >= 1");
    }
    if args.listen_net != "udp" && args.listen_net != "tcp" {
        anyhow::bail!("-listen-net {:?} unsupported: must be \"udp\" or \"tcp\"", args.listen_net);
    }

    // ------------------------------------------------------------
    // 2. Build the resolver core from whichever backend was selected
    // ------------------------------------------------------------
    let core = if let Some(path) = &args.static_config {
        info!(config = %path.display(), "running nameserver in static-config mode");
        let cfg = StaticConfig::load(path)?;
        ResolverCore::Static(StaticResolverCore::new(
            cfg.ipv4_proxies,
            cfg.ipv6_proxies,
            cfg.domain2onion,
            args.answer_count,
        ))
    } else {
        let endpoints = args.etcd_endpoints.clone().expect("clap enforces backend exclusivity");
        info!(?endpoints, "running nameserver in etcd-backed mode");
        let timeout = Duration::from_millis(args.etcd_timeout);
        let membership = Arc::new(EtcdMembership::connect(&endpoints, timeout).await?);
        let etcd = membership.client();
        ResolverCore::Etcd(EtcdResolverCore::new(membership, etcd, args.answer_count))
    };

    // ------------------------------------------------------------
    // 3. DNS handler, served on whichever net -listen-net selected
    // ------------------------------------------------------------
    let handler = Arc::new(DnsHandler::new(Arc::new(core)));
    {
        let handler = handler.clone();
        let listen_addr = args.listen_addr.clone();
        let listen_net = args.listen_net.clone();
        tokio::spawn(async move {
            let result = if listen_net == "udp" {
                handler.serve_udp(&listen_addr).await
            } else {
                handler.serve_tcp(&listen_addr).await
            };
            if let Err(e) = result {
                error!("CRITICAL: {listen_net} nameserver crashed: {e}");
                std::process::exit(1);
            }
        });
    }

    // ------------------------------------------------------------
    // 4. Shutdown handling
    // ------------------------------------------------------------
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!("failed to listen for shutdown signal: {e}"),
    }

    Ok(())
}
