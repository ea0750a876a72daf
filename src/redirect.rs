// src/redirect.rs
//
// HttpRedirect (spec §4.5): upgrades plain HTTP to HTTPS, with an
// ACME-challenge reverse-proxy passthrough. Grounded on
// examples/original_source/entry_proxy/redirect.go for the redirect/host
// logic, and on the teacher's manual length-prefixed framing style in
// dns.rs for hand-rolling the request parsing instead of pulling in a full
// HTTP server crate (this redirect never speaks HTTP/2 or keep-alive,
// spec.md §1 non-goals).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

pub struct HttpRedirect {
    proxy_port: u16,
}

impl HttpRedirect {
    pub fn new(proxy_port: u16) -> Self {
        Self { proxy_port }
    }

    pub async fn serve(self, listen_addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind http redirect listener {listen_addr}: {e}"))?;
        tracing::info!(%listen_addr, "http redirect listening");
        self.serve_on(listener).await
    }

    /// Same as [`Self::serve`] but takes an already-bound listener, so
    /// callers (tests, or a supervisor doing socket activation) can choose
    /// the port out-of-band.
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        let proxy_port = self.proxy_port;
        loop {
            let (conn, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "unable to accept redirect connection");
                    continue;
                }
            };
            tokio::spawn(async move {
                if let Err(e) = handle_request(conn, proxy_port).await {
                    tracing::debug!(%peer, error = %e, "redirect request failed");
                }
            });
        }
    }
}

struct ParsedRequest {
    path_and_query: String,
    host_header: String,
}

async fn read_request(conn: &mut TcpStream) -> anyhow::Result<ParsedRequest> {
    let mut reader = BufReader::new(conn);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next().ok_or_else(|| anyhow::anyhow!("empty request line"))?;
    let path_and_query = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing request target"))?
        .to_string();

    let mut host_header = String::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if let Some(value) = line.strip_prefix("Host:").or_else(|| line.strip_prefix("host:")) {
            host_header = value.trim().to_string();
        }
    }

    Ok(ParsedRequest {
        path_and_query,
        host_header,
    })
}

async fn handle_request(mut conn: TcpStream, proxy_port: u16) -> anyhow::Result<()> {
    let ParsedRequest {
        path_and_query,
        host_header,
    } = read_request(&mut conn).await?;

    if let Some(challenge_path) = path_and_query.strip_prefix(ACME_CHALLENGE_PREFIX) {
        reverse_proxy_acme_challenge(&mut conn, &host_header, proxy_port, challenge_path).await
    } else {
        redirect_to_https(&mut conn, &host_header, proxy_port, &path_and_query).await
    }
}

/// Host derivation per spec §4.5: split host:port from the Host header; on
/// failure use the whole header value; append `:proxyPort` only when it
/// differs from 443.
fn derive_https_host(host_header: &str, proxy_port: u16) -> String {
    let host = match host_header.rsplit_once(':') {
        Some((h, _port)) => h,
        None => host_header,
    };
    if proxy_port != 443 {
        format!("{host}:{proxy_port}")
    } else {
        host.to_string()
    }
}

async fn redirect_to_https(
    conn: &mut TcpStream,
    host_header: &str,
    proxy_port: u16,
    path_and_query: &str,
) -> anyhow::Result<()> {
    let host = derive_https_host(host_header, proxy_port);
    let location = format!("https://{host}{path_and_query}");

    let body = format!("Redirecting to {location}\n");
    let response = format!(
        "HTTP/1.1 301 Moved Permanently\r\nLocation: {location}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    conn.write_all(response.as_bytes()).await?;
    conn.shutdown().await?;
    Ok(())
}

async fn reverse_proxy_acme_challenge(
    conn: &mut TcpStream,
    host_header: &str,
    proxy_port: u16,
    challenge_path: &str,
) -> anyhow::Result<()> {
    let host = derive_https_host(host_header, proxy_port);
    let url = format!("https://{host}{ACME_CHALLENGE_PREFIX}{challenge_path}");

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?;

    let (status, body) = match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let body = resp.bytes().await.unwrap_or_default();
            (status, body.to_vec())
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "acme-challenge upstream request failed");
            (502, Vec::new())
        }
    };

    let response = format!(
        "HTTP/1.1 {status} \r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    conn.write_all(response.as_bytes()).await?;
    conn.write_all(&body).await?;
    conn.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_omits_suffix() {
        assert_eq!(derive_https_host("h", 443), "h");
        assert_eq!(derive_https_host("h:8080", 443), "h");
    }

    #[test]
    fn non_standard_port_appends_suffix() {
        assert_eq!(derive_https_host("h", 1443), "h:1443");
        assert_eq!(derive_https_host("h:9999", 1443), "h:1443");
    }

    #[test]
    fn unsplittable_host_header_used_verbatim() {
        // no ':' present, rsplit_once returns None -> whole header is host
        assert_eq!(derive_https_host("example.com", 1443), "example.com:1443");
    }
}
