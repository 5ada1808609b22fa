//! Answer-producing handlers stored in the zone router.

use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, ResponseHandler, ResponseInfo};
use std::iter;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::{debug, warn};

use crate::metrics;
use crate::upstream::{query_from_request, Forwarder};

/// TTL of synthesized A records.
pub const STATIC_TTL: u32 = 3600;

/// How a matched zone is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    /// Relay the query to this upstream and relay its reply.
    Forward(SocketAddr),
    /// Answer authoritatively with an A record for `ip`.
    ///
    /// The record is owned by the queried name, so a query for a name below
    /// `domain` gets an answer matching its question.
    StaticA {
        /// Zone the answer is published for (FQDN).
        domain: String,
        /// Published address.
        ip: Ipv4Addr,
    },
    /// Relay to the default upstream, or SERVFAIL.
    Fallback,
}

impl Handler {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Forward(_) => "forward",
            Handler::StaticA { .. } => "static_a",
            Handler::Fallback => "fallback",
        }
    }

    /// Write the answer for `request` to `response_handle`.
    pub async fn serve<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
        forwarder: &Forwarder,
    ) -> ResponseInfo {
        match self {
            Handler::StaticA { domain, ip } => {
                serve_static_a(request, response_handle, domain, *ip).await
            }
            Handler::Forward(upstream) => {
                serve_forward(request, response_handle, forwarder, *upstream).await
            }
            Handler::Fallback => {
                serve_forward(request, response_handle, forwarder, forwarder.default_upstream())
                    .await
            }
        }
    }
}

async fn serve_static_a<R: ResponseHandler>(
    request: &Request,
    response_handle: R,
    domain: &str,
    ip: Ipv4Addr,
) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_authoritative(true);
    header.set_response_code(ResponseCode::NoError);

    let question = request.queries().first().map(|q| q.original());
    let answers = match question {
        Some(q) if matches!(q.query_type(), RecordType::A | RecordType::ANY) => {
            let mut record =
                Record::from_rdata(q.name().clone(), STATIC_TTL, RData::A(A::from(ip)));
            record.set_dns_class(DNSClass::IN);
            vec![record]
        }
        // The zone only publishes an A record.
        _ => Vec::new(),
    };
    debug!(
        domain,
        %ip,
        qtype = ?question.map(|q| q.query_type()),
        answers = answers.len(),
        "static A answer"
    );

    let builder = MessageResponseBuilder::from_message_request(request);
    let response = builder.build(
        header,
        answers.iter(),
        iter::empty(),
        iter::empty(),
        iter::empty(),
    );
    send(response_handle, response, header).await
}

async fn serve_forward<R: ResponseHandler>(
    request: &Request,
    response_handle: R,
    forwarder: &Forwarder,
    upstream: SocketAddr,
) -> ResponseInfo {
    let query = query_from_request(request);

    let reply = match forwarder.exchange(upstream, &query).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(%upstream, id = request.id(), error = %e, "upstream exchange failed");
            metrics::record_upstream_failure();
            return serve_error(request, response_handle, ResponseCode::ServFail).await;
        }
    };
    debug!(%upstream, id = request.id(), rcode = ?reply.response_code(), "relaying upstream reply");

    let mut header = *reply.header();
    header.set_id(request.id());

    let mut builder = MessageResponseBuilder::from_message_request(request);
    if let Some(edns) = reply.extensions().clone() {
        builder.edns(edns);
    }
    let response = builder.build(
        header,
        reply.answers().iter(),
        reply.name_servers().iter(),
        iter::empty(),
        reply.additionals().iter(),
    );
    send(response_handle, response, header).await
}

async fn serve_error<R: ResponseHandler>(
    request: &Request,
    mut response_handle: R,
    code: ResponseCode,
) -> ResponseInfo {
    let builder = MessageResponseBuilder::from_message_request(request);
    let response = builder.error_msg(request.header(), code);
    response_handle
        .send_response(response)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to send error response");
            let mut header = Header::response_from_request(request.header());
            header.set_response_code(code);
            ResponseInfo::from(header)
        })
}

async fn send<'a, R, A, N, S, D>(
    mut response_handle: R,
    response: hickory_server::authority::MessageResponse<'_, 'a, A, N, S, D>,
    header: Header,
) -> ResponseInfo
where
    R: ResponseHandler,
    A: Iterator<Item = &'a Record> + Send + 'a,
    N: Iterator<Item = &'a Record> + Send + 'a,
    S: Iterator<Item = &'a Record> + Send + 'a,
    D: Iterator<Item = &'a Record> + Send + 'a,
{
    response_handle
        .send_response(response)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to send response");
            ResponseInfo::from(header)
        })
}
