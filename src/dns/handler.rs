// src/dns/handler.rs
//
// DnsHandler (spec §4.9): wire glue between a UDP/TCP socket and
// ResolverCore. Answers only OPCODE=QUERY, builds each answer RR from the
// resolved value directly (equivalent to the original handler's
// `dns.NewRR("<name> IN <TYPE> <value>")`, see
// examples/original_source/nameserver/handler.go and main.go's ServeDNS),
// and never lets one bad question fail the whole response (spec §7).

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::Bytes;
use dns_message_parser::{
    question::{QClass, QType, Question},
    rr::{RR, A, AAAA, TXT},
    Dns, Flags, Opcode, RCode,
};
use tokio::net::{TcpListener, UdpSocket};

use super::{RecordKind, ResolverCore};

pub struct DnsHandler {
    core: Arc<ResolverCore>,
}

impl DnsHandler {
    pub fn new(core: Arc<ResolverCore>) -> Self {
        Self { core }
    }

    pub async fn serve_udp(self: Arc<Self>, listen_addr: &str) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(listen_addr).await?;
        tracing::info!(%listen_addr, "nameserver listening (udp)");
        self.serve_udp_on(socket).await
    }

    /// Same as [`Self::serve_udp`] but takes an already-bound socket.
    pub async fn serve_udp_on(self: Arc<Self>, socket: UdpSocket) -> anyhow::Result<()> {
        let socket = Arc::new(socket);
        let mut buf = vec![0u8; 4096];
        loop {
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "udp recv failed");
                    continue;
                }
            };
            let query = Bytes::copy_from_slice(&buf[..n]);
            let this = self.clone();
            let socket = socket.clone();
            tokio::spawn(async move {
                if let Some(reply) = this.handle_query(query).await {
                    if let Err(e) = socket.send_to(&reply, peer).await {
                        tracing::warn!(%peer, error = %e, "udp reply send failed");
                    }
                }
            });
        }
    }

    pub async fn serve_tcp(self: Arc<Self>, listen_addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_addr).await?;
        tracing::info!(%listen_addr, "nameserver listening (tcp)");
        self.serve_tcp_on(listener).await
    }

    /// Same as [`Self::serve_tcp`] but takes an already-bound listener.
    pub async fn serve_tcp_on(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (mut conn, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "tcp accept failed");
                    continue;
                }
            };
            let this = self.clone();
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut len_buf = [0u8; 2];
                if conn.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let msg_len = u16::from_be_bytes(len_buf) as usize;
                let mut msg = vec![0u8; msg_len];
                if conn.read_exact(&mut msg).await.is_err() {
                    return;
                }
                let Some(reply) = this.handle_query(Bytes::from(msg)).await else {
                    return;
                };
                let len = (reply.len() as u16).to_be_bytes();
                let _ = conn.write_all(&len).await;
                let _ = conn.write_all(&reply).await;
                tracing::debug!(%peer, "answered tcp query");
            });
        }
    }

    /// Returns `None` when the query could not even be decoded, or was not
    /// an `OPCODE=QUERY` (logged, no reply sent -- spec §4.9).
    async fn handle_query(&self, raw: Bytes) -> Option<Bytes> {
        let request = match Dns::decode(raw) {
            Ok(dns) => dns,
            Err(e) => {
                tracing::warn!(error = ?e, "unable to decode dns query");
                return None;
            }
        };

        if request.flags.opcode != Opcode::Query {
            tracing::info!(opcode = ?request.flags.opcode, "opcode ignored");
            return None;
        }

        let mut answers = Vec::new();
        for question in &request.questions {
            match self.answer_question(question).await {
                Ok(mut rrs) => answers.append(&mut rrs),
                Err(e) => {
                    tracing::warn!(question = ?question, error = %e, "unable to answer question");
                }
            }
        }

        let reply = Dns {
            id: request.id,
            flags: Flags {
                qr: true,
                opcode: Opcode::Query,
                aa: true,
                tc: false,
                rd: request.flags.rd,
                ra: false,
                rcode: RCode::NoError,
            },
            questions: request.questions.clone(),
            answers,
            authorities: Vec::new(),
            additionals: Vec::new(),
        };

        match reply.encode() {
            Ok(bytes) => Some(bytes.freeze()),
            Err(e) => {
                tracing::warn!(error = ?e, "unable to encode dns reply");
                None
            }
        }
    }

    async fn answer_question(&self, question: &Question) -> anyhow::Result<Vec<RR>> {
        let kind = match question.q_type {
            QType::A => RecordKind::A,
            QType::AAAA => RecordKind::Aaaa,
            QType::TXT => RecordKind::Txt,
            other => {
                tracing::debug!(q_type = ?other, "unsupported query type, dropping question");
                return Ok(Vec::new());
            }
        };

        let name = question.domain.to_string();
        let values = self.core.resolve(&name, kind).await?;

        let ttl = 60;
        let mut rrs = Vec::with_capacity(values.len());
        for value in values {
            match build_rr(&question.domain, ttl, kind, &value) {
                Some(rr) => rrs.push(rr),
                None => tracing::warn!(
                    record = %presentation_form(question, &value),
                    "resolved value does not parse as this record type, dropping"
                ),
            }
        }
        Ok(rrs)
    }
}

fn build_rr(domain: &dns_message_parser::Domain, ttl: u32, kind: RecordKind, value: &str) -> Option<RR> {
    match kind {
        RecordKind::A => value.parse::<Ipv4Addr>().ok().map(|ip| RR::A(A {
            domain: domain.clone(),
            ttl,
            ipv4_addr: ip,
        })),
        RecordKind::Aaaa => value.parse::<Ipv6Addr>().ok().map(|ip| RR::AAAA(AAAA {
            domain: domain.clone(),
            ttl,
            ipv6_addr: ip,
        })),
        RecordKind::Txt => Some(RR::TXT(TXT {
            domain: domain.clone(),
            ttl,
            string: value.as_bytes().to_vec(),
        })),
    }
}

fn presentation_form(question: &Question, value: &str) -> String {
    format!("{} IN {:?} {}", question.domain, question.q_type, value)
}
