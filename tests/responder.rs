//! Integration tests for query routing through `FailoverResponder`.

mod common;

use std::net::Ipv4Addr;

use common::*;
use failover_dns::handler::STATIC_TTL;
use failover_dns::{Handler, ZoneRouter};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;

const SVC_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

fn static_zone(router: &ZoneRouter, domain: &str, ip: Ipv4Addr) {
    router.register(
        domain,
        Handler::StaticA {
            domain: domain.to_string(),
            ip,
        },
    );
}

#[tokio::test]
async fn static_zone_answers_authoritatively() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "svc.example.com.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let msg = execute_query(&responder, "svc.example.com.", RecordType::A, 4242).await;

    assert_a_response(&msg, &[SVC_IP]);
    assert_eq!(msg.id(), 4242);
    assert!(msg.header().authoritative());
    assert_eq!(msg.answers()[0].ttl(), STATIC_TTL);
    assert_eq!(msg.answers()[0].name().to_ascii(), "svc.example.com.");
}

#[tokio::test]
async fn subdomain_is_answered_by_parent_zone() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "svc.example.com.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let msg = execute_query(&responder, "www.SVC.example.com.", RecordType::A, 7).await;

    assert_a_response(&msg, &[SVC_IP]);
    // owned by the queried name so stub resolvers accept it
    assert_eq!(msg.answers()[0].name(), msg.queries()[0].name());
    assert_eq!(
        msg.answers()[0].name().to_ascii().to_ascii_lowercase(),
        "www.svc.example.com."
    );
}

#[tokio::test]
async fn punycode_zone_is_answered() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "xn--bcher-kva.example.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let request = build_request("www.xn--bcher-kva.example.", RecordType::A, 13);
    assert_eq!(
        responder.route(&request),
        Handler::StaticA {
            domain: "xn--bcher-kva.example.".to_string(),
            ip: SVC_IP,
        }
    );

    let msg = execute_request(&responder, request).await;
    assert_a_response(&msg, &[SVC_IP]);
    assert!(msg.header().authoritative());
}

#[tokio::test]
async fn static_zone_returns_nodata_for_other_types() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "svc.example.com.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let msg = execute_query(&responder, "svc.example.com.", RecordType::AAAA, 8).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(msg.header().authoritative());
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn unmatched_query_is_relayed_to_default_upstream() {
    let (upstream_addr, _upstream) = answering_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "svc.example.com.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let msg = execute_query(&responder, "other.example.net.", RecordType::A, 99).await;

    assert_a_response(&msg, &[UPSTREAM_ANSWER]);
    assert_eq!(msg.id(), 99);
    assert!(msg.header().recursion_available());
}

#[tokio::test]
async fn unmatched_query_gets_servfail_when_upstream_is_silent() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let responder = build_responder(ZoneRouter::new(), upstream_addr);

    let msg = execute_query(&responder, "other.example.net.", RecordType::A, 100).await;

    assert_response_code(&msg, ResponseCode::ServFail);
    assert_eq!(msg.id(), 100);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn query_without_question_uses_fallback() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let responder = build_responder(ZoneRouter::new(), upstream_addr);

    let request = request_from_bytes(&build_empty_query_bytes(5));
    assert_eq!(responder.route(&request), Handler::Fallback);

    let msg = execute_request(&responder, request).await;
    assert_response_code(&msg, ResponseCode::ServFail);
}

#[tokio::test]
async fn forward_zone_relays_to_its_upstream() {
    let (_default, default_addr) = silent_upstream().await;
    let (zone_upstream, _task) = answering_upstream().await;
    let router = ZoneRouter::new();
    router.register("ext.example.org.", Handler::Forward(zone_upstream));
    let responder = build_responder(router, default_addr);

    let msg = execute_query(&responder, "host.ext.example.org.", RecordType::A, 321).await;

    assert_a_response(&msg, &[UPSTREAM_ANSWER]);
    assert_eq!(msg.id(), 321);
    assert_eq!(msg.answers()[0].name().to_ascii(), "host.ext.example.org.");
}

#[tokio::test]
async fn forward_zone_gets_servfail_when_upstream_is_silent() {
    let (default_addr, _task) = answering_upstream().await;
    let (_zone_upstream, zone_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    router.register("ext.example.org.", Handler::Forward(zone_addr));
    let responder = build_responder(router, default_addr);

    let msg = execute_query(&responder, "host.ext.example.org.", RecordType::A, 322).await;

    // no retry through the default upstream
    assert_response_code(&msg, ResponseCode::ServFail);
}

#[tokio::test]
async fn root_zone_catches_unmatched_names() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, ".", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let msg = execute_query(&responder, "anything.example.", RecordType::A, 11).await;

    assert_a_response(&msg, &[SVC_IP]);
}

#[tokio::test]
async fn ds_query_is_routed_to_parent_zone() {
    let (_upstream, upstream_addr) = silent_upstream().await;
    let router = ZoneRouter::new();
    static_zone(&router, "example.com.", Ipv4Addr::new(192, 0, 2, 1));
    static_zone(&router, "svc.example.com.", SVC_IP);
    let responder = build_responder(router, upstream_addr);

    let request = build_request("svc.example.com.", RecordType::DS, 12);
    assert_eq!(
        responder.route(&request),
        Handler::StaticA {
            domain: "example.com.".to_string(),
            ip: Ipv4Addr::new(192, 0, 2, 1),
        }
    );
}
