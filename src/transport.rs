use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::dns::DNSPacket;
use crate::dns::common::normalize_name;
use crate::dns::constants::DEFAULT_UDP_PAYLOAD_SIZE;
use crate::dns::enums::DNSResourceType;
use crate::error::TransportError;

/// A parsed reply and the number of bytes it occupied on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsResponse {
    pub packet: DNSPacket,
    pub size: usize,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask `server` for (`name`, `qtype`) and return its reply.
    async fn query(
        &self,
        name: &str,
        qtype: DNSResourceType,
        server: SocketAddr,
    ) -> Result<DnsResponse, TransportError>;
}

/// One UDP exchange per query on a fresh ephemeral socket.
#[derive(Clone, Debug)]
pub struct UdpTransport {
    timeout: Duration,
    payload_size: u16,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), DEFAULT_UDP_PAYLOAD_SIZE)
    }
}

impl UdpTransport {
    pub fn new(timeout: Duration, payload_size: u16) -> Self {
        Self {
            timeout,
            payload_size,
        }
    }

    async fn exchange(&self, query: &[u8], server: SocketAddr) -> std::io::Result<Vec<u8>> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;
        socket.send(query).await?;

        let mut buf = vec![0u8; usize::from(self.payload_size).max(512)];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn query(
        &self,
        name: &str,
        qtype: DNSResourceType,
        server: SocketAddr,
    ) -> Result<DnsResponse, TransportError> {
        let id: u16 = rand::random();
        let query = DNSPacket::query(id, name, qtype, self.payload_size);
        let query_bytes = query
            .serialize()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        debug!("Querying {} for {} {} (id {})", server, name, qtype, id);

        let buf = timeout(self.timeout, self.exchange(&query_bytes, server))
            .await
            .map_err(|_| TransportError::Timeout(server))??;

        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            buf.len(),
            &buf[..buf.len().min(64)]
        );

        // TC is bit 1 of the third header byte
        let truncated = buf.get(2).is_some_and(|flags| flags & 0x02 != 0);
        if truncated {
            return Err(TransportError::Truncated(server));
        }

        let packet = DNSPacket::parse(&buf).map_err(|source| {
            debug!("Failed to parse UDP response from {}: {}", server, source);
            TransportError::Malformed { server, source }
        })?;

        if packet.header.id != id {
            return Err(TransportError::IdMismatch {
                expected: id,
                got: packet.header.id,
            });
        }

        if !packet.header.qr {
            return Err(TransportError::UnexpectedReply {
                server,
                reason: "QR bit clear",
            });
        }

        let echoes_question = match packet.questions.as_slice() {
            [question] => {
                question.qtype == qtype && normalize_name(&question.name()) == normalize_name(name)
            }
            _ => false,
        };
        if !echoes_question {
            return Err(TransportError::UnexpectedReply {
                server,
                reason: "question does not match",
            });
        }

        Ok(DnsResponse {
            packet,
            size: buf.len(),
        })
    }
}
