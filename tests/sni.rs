// End-to-end SNI peek over a real TCP socket (spec §4.1, §8): the entry
// proxy never terminates TLS, so this only checks that the SNI hostname is
// extracted and that every byte the client sent -- ClientHello and anything
// after it -- is still visible to whoever reads from the returned stream.

use oniongateway::sni::peek_sni;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn build_client_hello(host: &str) -> Vec<u8> {
    let mut server_name_list = Vec::new();
    server_name_list.push(0x00); // host_name
    server_name_list.extend_from_slice(&(host.len() as u16).to_be_bytes());
    server_name_list.extend_from_slice(host.as_bytes());

    let mut sni_ext_data = Vec::new();
    sni_ext_data.extend_from_slice(&(server_name_list.len() as u16).to_be_bytes());
    sni_ext_data.extend_from_slice(&server_name_list);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&0x0000u16.to_be_bytes()); // server_name extension
    extensions.extend_from_slice(&(sni_ext_data.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni_ext_data);

    let mut body = Vec::new();
    body.extend_from_slice(&[0x03, 0x03]);
    body.extend_from_slice(&[0u8; 32]);
    body.push(0);
    body.extend_from_slice(&2u16.to_be_bytes());
    body.extend_from_slice(&[0x13, 0x01]);
    body.push(1);
    body.push(0);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = Vec::new();
    handshake.push(0x01); // client_hello
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut record = Vec::new();
    record.push(0x16); // handshake content type
    record.extend_from_slice(&[0x03, 0x01]);
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

#[tokio::test]
async fn peeks_sni_over_a_real_tcp_connection_and_preserves_trailing_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut hello = build_client_hello("pasta.cf");
    hello.extend_from_slice(b"application data that must survive the peek");

    let client = tokio::spawn(async move {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(&hello).await.unwrap();
        conn.shutdown().await.unwrap();
    });

    let (conn, _peer) = listener.accept().await.unwrap();
    let (hostname, mut peeked) = peek_sni(conn).await.unwrap();
    assert_eq!(hostname, "pasta.cf");

    let mut rest = Vec::new();
    peeked.read_to_end(&mut rest).await.unwrap();
    assert!(rest.ends_with(b"application data that must survive the peek"));

    client.await.unwrap();
}
