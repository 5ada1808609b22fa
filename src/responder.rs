//! Request handler plugged into the hickory server.

use async_trait::async_trait;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tracing::{debug, trace};

use crate::handler::Handler;
use crate::metrics::{self, Timer};
use crate::router::ZoneRouter;
use crate::upstream::Forwarder;

/// Routes every query through the zone router and serves the matched handler.
///
/// Queries with no question, or with no matching zone, go to
/// [`Handler::Fallback`].
#[derive(Debug, Clone)]
pub struct FailoverResponder {
    router: ZoneRouter,
    forwarder: Forwarder,
}

impl FailoverResponder {
    /// Create a responder reading from `router`.
    pub fn new(router: ZoneRouter, forwarder: Forwarder) -> Self {
        Self { router, forwarder }
    }

    /// Pick the handler for `request`.
    pub fn route(&self, request: &Request) -> Handler {
        let Some(query) = request.queries().first() else {
            debug!(id = request.id(), src = %request.src(), "query without question, using fallback");
            return Handler::Fallback;
        };

        // Display renders IDN labels as Unicode; zones are keyed by wire form.
        let name = query.original().name().to_ascii();
        let handler = self
            .router
            .resolve(&name, query.query_type())
            .unwrap_or(Handler::Fallback);
        trace!(name = %name, qtype = ?query.query_type(), handler = handler.kind(), "routed query");
        handler
    }
}

#[async_trait]
impl RequestHandler for FailoverResponder {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();
        let handler = self.route(request);
        let info = handler
            .serve(request, response_handle, &self.forwarder)
            .await;
        metrics::record_query(handler.kind(), info.response_code(), timer.elapsed());
        info
    }
}
