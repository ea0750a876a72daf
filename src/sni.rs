// src/sni.rs
//
// SNIPeeker (spec §4.1): reads just enough of a TLS ClientHello to pull out
// the `server_name` extension, then hands back a stream that replays every
// byte it consumed before falling through to the live socket. The upstream
// SOCKS5 connection gets a byte-for-byte copy of the original client stream;
// TLS itself is never terminated here.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::SniError;

/// Cap on how much of the handshake we'll buffer while looking for SNI.
/// A ClientHello with a legitimate `server_name` extension is a few hundred
/// bytes at most; anything past this is either not TLS or hostile.
const MAX_PEEK_BYTES: usize = 16 * 1024;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const SERVER_NAME_TYPE_HOST_NAME: u8 = 0x00;

/// Peek the SNI hostname off a freshly-accepted connection, returning it
/// alongside a stream that replays the consumed bytes before reading live.
pub async fn peek_sni<S>(mut conn: S) -> Result<(String, PeekedStream<S>), SniError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        match try_parse_client_hello(&buf) {
            ParseOutcome::Sni(host) => {
                return Ok((host, PeekedStream::new(buf, conn)));
            }
            ParseOutcome::NoSni => return Err(SniError::NoSni),
            ParseOutcome::NotTls => return Err(SniError::NotTls),
            ParseOutcome::Incomplete => {}
        }

        if buf.len() >= MAX_PEEK_BYTES {
            return Err(SniError::NotTls);
        }

        let mut chunk = [0u8; 4096];
        let n = tokio::io::AsyncReadExt::read(&mut conn, &mut chunk).await?;
        if n == 0 {
            return Err(SniError::ShortRead);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

enum ParseOutcome {
    Sni(String),
    NoSni,
    NotTls,
    Incomplete,
}

/// Try to parse a (possibly still-incomplete) TLS record containing a
/// ClientHello out of `buf`. We only look at the first handshake record;
/// real ClientHellos fit in one TLS record in practice.
fn try_parse_client_hello(buf: &[u8]) -> ParseOutcome {
    // TLS record header: type(1) version(2) length(2)
    if buf.len() < 5 {
        return ParseOutcome::Incomplete;
    }
    if buf[0] != CONTENT_TYPE_HANDSHAKE {
        return ParseOutcome::NotTls;
    }
    let record_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    if buf.len() < 5 + record_len {
        return ParseOutcome::Incomplete;
    }
    let record = &buf[5..5 + record_len];

    // Handshake header: msg_type(1) length(3)
    if record.len() < 4 {
        return ParseOutcome::NotTls;
    }
    if record[0] != HANDSHAKE_TYPE_CLIENT_HELLO {
        return ParseOutcome::NotTls;
    }
    let hs_len = u32::from_be_bytes([0, record[1], record[2], record[3]]) as usize;
    if record.len() < 4 + hs_len {
        // ClientHello spans multiple TLS records; not handled, but also not
        // malformed. Ask the caller for more bytes only up to our cap.
        return ParseOutcome::Incomplete;
    }
    let body = &record[4..4 + hs_len];

    match parse_client_hello_body(body) {
        Some(Some(host)) => ParseOutcome::Sni(host),
        Some(None) => ParseOutcome::NoSni,
        None => ParseOutcome::NotTls,
    }
}

/// Parses the ClientHello body. Returns `Some(Some(host))` on a found SNI,
/// `Some(None)` if the handshake is well-formed but has no `server_name`
/// extension, `None` if the body itself is malformed.
fn parse_client_hello_body(body: &[u8]) -> Option<Option<String>> {
    let mut pos = 0usize;

    // client_version(2) + random(32)
    pos += 2 + 32;
    if body.len() < pos + 1 {
        return None;
    }

    // session_id
    let session_id_len = *body.get(pos)? as usize;
    pos += 1 + session_id_len;
    if body.len() < pos + 2 {
        return None;
    }

    // cipher_suites
    let cipher_suites_len = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]) as usize;
    pos += 2 + cipher_suites_len;
    if body.len() < pos + 1 {
        return None;
    }

    // compression_methods
    let compression_len = *body.get(pos)? as usize;
    pos += 1 + compression_len;

    if body.len() == pos {
        // No extensions block at all: valid ClientHello, no SNI possible.
        return Some(None);
    }
    if body.len() < pos + 2 {
        return None;
    }

    let extensions_len = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]) as usize;
    pos += 2;
    if body.len() < pos + extensions_len {
        return None;
    }
    let extensions = &body[pos..pos + extensions_len];

    let mut epos = 0usize;
    while epos + 4 <= extensions.len() {
        let ext_type = u16::from_be_bytes([extensions[epos], extensions[epos + 1]]);
        let ext_len = u16::from_be_bytes([extensions[epos + 2], extensions[epos + 3]]) as usize;
        epos += 4;
        if epos + ext_len > extensions.len() {
            return None;
        }
        let ext_data = &extensions[epos..epos + ext_len];
        if ext_type == EXTENSION_SERVER_NAME {
            if let Some(host) = parse_server_name_extension(ext_data) {
                return Some(Some(host));
            }
        }
        epos += ext_len;
    }

    Some(None)
}

fn parse_server_name_extension(data: &[u8]) -> Option<String> {
    // server_name_list length(2)
    if data.len() < 2 {
        return None;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let list = data.get(2..2 + list_len)?;

    let mut pos = 0usize;
    while pos + 3 <= list.len() {
        let name_type = list[pos];
        let name_len = u16::from_be_bytes([list[pos + 1], list[pos + 2]]) as usize;
        pos += 3;
        let name = list.get(pos..pos + name_len)?;
        pos += name_len;
        if name_type == SERVER_NAME_TYPE_HOST_NAME {
            return std::str::from_utf8(name).ok().map(|s| s.to_lowercase());
        }
    }
    None
}

/// Wraps a connection so that bytes consumed during the SNI peek are
/// replayed before reads fall through to the live socket.
pub struct PeekedStream<S> {
    replay: BytesMut,
    inner: S,
}

impl<S> PeekedStream<S> {
    fn new(replay: BytesMut, inner: S) -> Self {
        Self { replay, inner }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PeekedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.replay.is_empty() {
            let n = std::cmp::min(self.replay.len(), buf.remaining());
            buf.put_slice(&self.replay[..n]);
            self.replay.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PeekedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    /// Builds a minimal ClientHello record with an SNI extension for `host`.
    fn build_client_hello(host: &str) -> Vec<u8> {
        let mut server_name_list = Vec::new();
        server_name_list.push(SERVER_NAME_TYPE_HOST_NAME);
        server_name_list.extend_from_slice(&(host.len() as u16).to_be_bytes());
        server_name_list.extend_from_slice(host.as_bytes());

        let mut sni_ext_data = Vec::new();
        sni_ext_data.extend_from_slice(&(server_name_list.len() as u16).to_be_bytes());
        sni_ext_data.extend_from_slice(&server_name_list);

        let mut extensions = Vec::new();
        extensions.extend_from_slice(&EXTENSION_SERVER_NAME.to_be_bytes());
        extensions.extend_from_slice(&(sni_ext_data.len() as u16).to_be_bytes());
        extensions.extend_from_slice(&sni_ext_data);

        let mut body = Vec::new();
        body.extend_from_slice(&[0x03, 0x03]); // client_version
        body.extend_from_slice(&[0u8; 32]); // random
        body.push(0); // session_id len
        body.extend_from_slice(&(2u16).to_be_bytes()); // cipher_suites len
        body.extend_from_slice(&[0x13, 0x01]); // one cipher suite
        body.push(1); // compression_methods len
        body.push(0); // null compression
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(&extensions);

        let mut handshake = Vec::new();
        handshake.push(HANDSHAKE_TYPE_CLIENT_HELLO);
        let hs_len = (body.len() as u32).to_be_bytes();
        handshake.extend_from_slice(&hs_len[1..]); // 3-byte length
        handshake.extend_from_slice(&body);

        let mut record = Vec::new();
        record.push(CONTENT_TYPE_HANDSHAKE);
        record.extend_from_slice(&[0x03, 0x01]); // record version
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        record
    }

    #[tokio::test]
    async fn extracts_sni_and_replays_bytes() {
        let mut hello = build_client_hello("example.com");
        hello.extend_from_slice(b"trailing application data");
        let (io_client, io_server) = tokio::io::duplex(8192);

        let writer = tokio::spawn(async move {
            let mut io_client = io_client;
            tokio::io::AsyncWriteExt::write_all(&mut io_client, &hello).await.unwrap();
            io_client
        });

        let (host, mut peeked) = peek_sni(io_server).await.unwrap();
        assert_eq!(host, "example.com");

        let mut rest = Vec::new();
        let io_client = writer.await.unwrap();
        drop(io_client);
        peeked.read_to_end(&mut rest).await.unwrap();
        assert!(rest.ends_with(b"trailing application data"));
    }

    #[tokio::test]
    async fn lowercases_hostname() {
        let hello = build_client_hello("ExAmple.COM");
        let (io_client, io_server) = tokio::io::duplex(8192);
        tokio::spawn(async move {
            let mut io_client = io_client;
            tokio::io::AsyncWriteExt::write_all(&mut io_client, &hello).await.unwrap();
        });
        let (host, _peeked) = peek_sni(io_server).await.unwrap();
        assert_eq!(host, "example.com");
    }

    #[tokio::test]
    async fn rejects_non_tls_bytes() {
        let (io_client, io_server) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut io_client = io_client;
            tokio::io::AsyncWriteExt::write_all(&mut io_client, b"GET / HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
        });
        let err = peek_sni(io_server).await.unwrap_err();
        assert!(matches!(err, SniError::NotTls));
    }

    #[tokio::test]
    async fn short_read_before_record_complete() {
        let hello = build_client_hello("example.com");
        let truncated = &hello[..hello.len() - 5];
        let (io_client, io_server) = tokio::io::duplex(8192);
        tokio::spawn(async move {
            let mut io_client = io_client;
            tokio::io::AsyncWriteExt::write_all(&mut io_client, truncated).await.unwrap();
            // io_client dropped here -> EOF
        });
        let err = peek_sni(io_server).await.unwrap_err();
        assert!(matches!(err, SniError::ShortRead));
    }

    #[tokio::test]
    async fn client_hello_without_sni_extension() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x03, 0x03]);
        body.extend_from_slice(&[0u8; 32]);
        body.push(0);
        body.extend_from_slice(&(2u16).to_be_bytes());
        body.extend_from_slice(&[0x13, 0x01]);
        body.push(1);
        body.push(0);
        // no extensions block at all

        let mut handshake = Vec::new();
        handshake.push(HANDSHAKE_TYPE_CLIENT_HELLO);
        let hs_len = (body.len() as u32).to_be_bytes();
        handshake.extend_from_slice(&hs_len[1..]);
        handshake.extend_from_slice(&body);

        let mut record = Vec::new();
        record.push(CONTENT_TYPE_HANDSHAKE);
        record.extend_from_slice(&[0x03, 0x01]);
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        let (io_client, io_server) = tokio::io::duplex(8192);
        tokio::spawn(async move {
            let mut io_client = io_client;
            tokio::io::AsyncWriteExt::write_all(&mut io_client, &record).await.unwrap();
        });
        let err = peek_sni(io_server).await.unwrap_err();
        assert!(matches!(err, SniError::NoSni));
    }
}
