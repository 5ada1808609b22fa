//! One-shot DNS exchanges with an upstream nameserver.

use hickory_proto::op::{Message, MessageType};
use hickory_server::authority::MessageRequest;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, trace};

use crate::error::DnsError;

/// Largest reply accepted over UDP.
const MAX_UDP_PAYLOAD: usize = u16::MAX as usize;

/// Rebuild a wire message from a parsed request so it can be relayed.
///
/// Header flags, questions, additionals and EDNS are carried over unchanged.
pub fn query_from_request(request: &MessageRequest) -> Message {
    let header = request.header();

    let mut message = Message::new();
    message
        .set_id(header.id())
        .set_message_type(MessageType::Query)
        .set_op_code(header.op_code())
        .set_recursion_desired(header.recursion_desired())
        .set_authentic_data(header.authentic_data())
        .set_checking_disabled(header.checking_disabled());
    message.add_queries(request.queries().iter().map(|q| q.original().clone()));
    message.add_additionals(request.additionals().iter().cloned());
    if let Some(edns) = request.edns() {
        message.set_edns(edns.clone());
    }
    message
}

/// Relays queries to upstream nameservers.
#[derive(Debug, Clone)]
pub struct Forwarder {
    default_upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder using `default_upstream` for unmatched queries.
    pub fn new(default_upstream: SocketAddr, timeout: Duration) -> Self {
        Self {
            default_upstream,
            timeout,
        }
    }

    /// Upstream used by the fallback path.
    pub fn default_upstream(&self) -> SocketAddr {
        self.default_upstream
    }

    /// Send `query` to `upstream` and wait for its reply.
    ///
    /// Uses UDP first and retries over TCP when the reply is truncated. Each
    /// leg is bounded by the configured timeout.
    pub async fn exchange(&self, upstream: SocketAddr, query: &Message) -> Result<Message, DnsError> {
        let bytes = query.to_vec()?;

        let reply = self
            .bounded(upstream, Self::exchange_udp(upstream, &bytes, query.id()))
            .await?;
        if !reply.truncated() {
            return Ok(reply);
        }

        debug!(%upstream, id = query.id(), "UDP reply truncated, retrying over TCP");
        self.bounded(upstream, Self::exchange_tcp(upstream, &bytes))
            .await
    }

    async fn bounded<F>(&self, upstream: SocketAddr, exchange: F) -> Result<Message, DnsError>
    where
        F: std::future::Future<Output = Result<Message, DnsError>>,
    {
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                DnsError::Upstream(format!("{} timed out after {:?}", upstream, self.timeout))
            })?
    }

    async fn exchange_udp(upstream: SocketAddr, bytes: &[u8], id: u16) -> Result<Message, DnsError> {
        // one socket per exchange
        let local: SocketAddr = match upstream {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(upstream).await?;
        socket.send(bytes).await?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        loop {
            let len = socket.recv(&mut buf).await?;
            let reply = match Message::from_vec(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    trace!(%upstream, error = %e, "ignoring undecodable datagram");
                    continue;
                }
            };
            if reply.id() == id {
                return Ok(reply);
            }
            trace!(%upstream, expected = id, got = reply.id(), "ignoring reply with foreign id");
        }
    }

    async fn exchange_tcp(upstream: SocketAddr, bytes: &[u8]) -> Result<Message, DnsError> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| DnsError::Upstream("query exceeds TCP frame size".to_string()))?;

        let mut stream = TcpStream::connect(upstream).await?;
        stream.write_u16(len).await?;
        stream.write_all(bytes).await?;
        stream.flush().await?;

        let len = stream.read_u16().await?;
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf).await?;
        Ok(Message::from_vec(&buf)?)
    }
}
