// src/socks.rs
//
// SocksDialer (spec §4.3): wraps a SOCKS5 dialer pointed at the upstream Tor
// client's listener. Grounded on the client-side connect path in
// examples/other_examples/c2e30aeb_sticnarf-tokio-socks__...tokio_impl.rs.rs
// and the dial-then-startup-check shape of
// examples/original_source/entry_proxy/main.go's connectToProxy.

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::error::DialError;

/// Host the Tor2Web startup probe dials; if the SOCKS5 proxy lets this
/// through, Tor is not actually running in Tor2Web mode and onion addresses
/// may be unreachable (spec §4.3).
const TOR2WEB_CHECK_HOST: &str = "check.torproject.org";
const TOR2WEB_CHECK_PORT: u16 = 443;

#[derive(Clone)]
pub struct SocksDialer {
    proxy_addr: String,
}

impl SocksDialer {
    pub fn new(proxy_addr: String) -> Self {
        Self { proxy_addr }
    }

    /// Dial `host:port` through the configured SOCKS5 upstream. No auth.
    pub async fn dial(&self, host: &str, port: u16) -> Result<TcpStream, DialError> {
        let stream = Socks5Stream::connect(self.proxy_addr.as_str(), (host, port))
            .await
            .map_err(|source| DialError::Socks {
                target: format!("{host}:{port}"),
                proxy: self.proxy_addr.clone(),
                source,
            })?;
        Ok(stream.into_inner())
    }

    /// Startup sanity check (spec §4.3): attempt to dial a known clearnet
    /// host through the SOCKS5 proxy. Success means Tor is *not* in Tor2Web
    /// mode. Non-fatal either way; only logs.
    pub async fn tor2web_sanity_check(&self) {
        match self.dial(TOR2WEB_CHECK_HOST, TOR2WEB_CHECK_PORT).await {
            Ok(_) => {
                tracing::warn!(
                    proxy = %self.proxy_addr,
                    "SOCKS5 upstream reached a clearnet host; it does not appear to be \
                     running in Tor2Web mode, onion addresses may be unreachable"
                );
            }
            Err(e) => {
                tracing::debug!(proxy = %self.proxy_addr, error = %e, "Tor2Web sanity check failed as expected");
            }
        }
    }
}
