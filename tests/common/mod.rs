//! Shared test infrastructure for responder integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use failover_dns::{FailoverResponder, Forwarder, ZoneRouter};

// --- Constants ---

/// Address every fake upstream answers with.
pub const UPSTREAM_ANSWER: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

/// Timeout used for upstream exchanges in tests.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(200);

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as wire bytes, which are parsed back with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Fake upstreams ---

/// Bind a UDP socket that never answers. Keep it alive for the test's duration.
pub async fn silent_upstream() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind silent upstream");
    let addr = socket.local_addr().expect("failed to get local addr");
    (socket, addr)
}

/// Start a UDP upstream answering every A question with [`UPSTREAM_ANSWER`].
pub async fn answering_upstream() -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind fake upstream");
    let addr = socket.local_addr().expect("failed to get local addr");

    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(query) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let reply = upstream_reply(&query);
            let _ = socket.send_to(&reply.to_vec().unwrap(), src).await;
        }
    });

    (addr, handle)
}

/// Reply an upstream resolver would give: recursion available, one A answer.
fn upstream_reply(query: &Message) -> Message {
    let mut reply = Message::new();
    reply.set_id(query.id());
    reply.set_message_type(MessageType::Response);
    reply.set_op_code(query.op_code());
    reply.set_recursion_desired(query.recursion_desired());
    reply.set_recursion_available(true);
    reply.add_queries(query.queries().to_vec());
    if let Some(q) = query.queries().first() {
        let mut record = Record::from_rdata(q.name().clone(), 300, RData::A(A::from(UPSTREAM_ANSWER)));
        record.set_dns_class(DNSClass::IN);
        reply.add_answer(record);
    }
    reply
}

// --- Responder builder ---

pub fn build_responder(router: ZoneRouter, default_upstream: SocketAddr) -> FailoverResponder {
    FailoverResponder::new(router, Forwarder::new(default_upstream, UPSTREAM_TIMEOUT))
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Build wire-format bytes for a query carrying no question.
pub fn build_empty_query_bytes(id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Wrap wire bytes into a `Request` from a fixed client address.
pub fn request_from_bytes(bytes: &[u8]) -> Request {
    let msg = parse_message_request(bytes);
    Request::new(msg, "10.0.0.1:12345".parse().unwrap(), Protocol::Udp)
}

/// Build a full `Request` for `name`/`record_type`.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    request_from_bytes(&build_query_bytes(name, record_type, id))
}

// --- Response helpers ---

/// Run a request through the responder and return the parsed response.
pub async fn execute_request(responder: &FailoverResponder, request: Request) -> Message {
    let handler = TestResponseHandler::new();
    responder.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// Execute a query through the responder and return the parsed response.
pub async fn execute_query(
    responder: &FailoverResponder,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    execute_request(responder, build_request(name, record_type, id)).await
}

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected A addresses.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let actual = extract_a_ips(msg);
    assert_eq!(
        actual, expected_ips,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected_ips
    );
}
