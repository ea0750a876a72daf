// src/entry_proxy.rs
//
// EntryProxy pipeline (spec §4.4): accept TCP, peek SNI, resolve to onion,
// dial the SOCKS5 upstream, splice. Grounded on the accept-loop shape of the
// teacher's proxy.rs (`start_socks_server`/`handle_socks_connection`) and on
// examples/original_source/entry_proxy/proxy.go's `ProcessRequest`/`copyLoop`.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::resolver::{HostToOnion, Resolver};
use crate::sni::peek_sni;
use crate::socks::SocksDialer;

pub struct EntryProxy {
    resolver: Arc<Resolver>,
    dialer: SocksDialer,
    onion_port: u16,
}

impl EntryProxy {
    pub fn new(resolver: Arc<Resolver>, dialer: SocksDialer, onion_port: u16) -> Self {
        Self {
            resolver,
            dialer,
            onion_port,
        }
    }

    /// Accept loop: one task per connection, errors in a single connection
    /// never take down the listener (spec §7).
    pub async fn serve(self: Arc<Self>, listen_addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind entry proxy listener {listen_addr}: {e}"))?;
        tracing::info!(%listen_addr, "entry proxy listening");
        self.serve_on(listener).await
    }

    /// Same as [`Self::serve`] but takes an already-bound listener.
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (conn, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "unable to accept connection");
                    continue;
                }
            };
            let this = self.clone();
            tokio::spawn(async move {
                this.process_connection(conn, peer).await;
            });
        }
    }

    async fn process_connection(&self, conn: TcpStream, peer: std::net::SocketAddr) {
        let (hostname, client) = match peek_sni(conn).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "unable to get target server name from SNI");
                return;
            }
        };

        let onion = match self.resolver.resolve(&hostname).await {
            Ok(onion) => onion,
            Err(e) => {
                tracing::warn!(%peer, %hostname, error = %e, "unable to resolve hostname to onion address");
                return;
            }
        };
        tracing::info!(%hostname, %onion, "resolved hostname to onion address");

        let server = match self.dialer.dial(&onion, self.onion_port).await {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(%peer, %onion, error = %e, "unable to dial onion address through SOCKS5 upstream");
                return;
            }
        };

        splice(client, server).await;
    }
}

/// Runs two concurrent unidirectional copies until both sides have seen EOF
/// or an error, closing the destination on each leg's completion (spec
/// §4.4 "splice").
async fn splice<C>(client: C, mut server: TcpStream)
where
    C: AsyncReadExt + AsyncWriteExt + Unpin + Send + 'static,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut server_rd, mut server_wr) = server.split();

    let client_to_server = async {
        let result = tokio::io::copy(&mut client_rd, &mut server_wr).await;
        let _ = server_wr.shutdown().await;
        result
    };
    let server_to_client = async {
        let result = tokio::io::copy(&mut server_rd, &mut client_wr).await;
        let _ = client_wr.shutdown().await;
        result
    };

    let _ = tokio::join!(client_to_server, server_to_client);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splice_copies_both_directions_and_closes() {
        let (client_a, mut client_b) = tokio::io::duplex(4096);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
            sock.write_all(b"world").await.unwrap();
            sock.shutdown().await.unwrap();
        });

        let server_conn = TcpStream::connect(addr).await.unwrap();

        let splice_task = tokio::spawn(async move {
            splice(client_a, server_conn).await;
        });

        client_b.write_all(b"hello").await.unwrap();
        let mut response = [0u8; 5];
        client_b.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"world");

        server_task.await.unwrap();
        splice_task.await.unwrap();
    }
}
