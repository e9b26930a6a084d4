//! End-to-end proxy flow tests
//!
//! Exercise the orchestrator through the wired service graph with scripted
//! browser and transport doubles: clearance reuse, single-flight solving,
//! expiry refresh, and the bounded challenge retry.

mod common;

use cf_clearance_proxy::ProxyRequest;
use cf_clearance_proxy::server::build_state;
use common::{
    CountingFactory, ScriptedTransport, challenge_response, ok_response, test_settings,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_clearance_is_reused_across_requests() {
    let factory = CountingFactory::new();
    let created = Arc::clone(&factory.created);
    let navigations = Arc::clone(&factory.navigations);
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("hello")]));
    let sends = Arc::clone(&transport.sends);

    let state = build_state(test_settings(), Arc::new(factory), transport);
    let request = ProxyRequest::new("https://a.test/page");

    for _ in 0..3 {
        let response = state.orchestrator.proxy("anonymous", &request).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "hello");
    }

    // One browser, one solve, three outbound replays
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(navigations.load(Ordering::SeqCst), 1);
    assert_eq!(sends.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_solve() {
    let factory = CountingFactory::new();
    let navigations = Arc::clone(&factory.navigations);
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("ok")]));

    let state = build_state(test_settings(), Arc::new(factory), transport);
    let request = ProxyRequest::new("https://a.test/");

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let state = state.clone();
        let request = request.clone();
        tasks.push(tokio::spawn(async move {
            state.orchestrator.proxy("anonymous", &request).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    // Single-flight: all four callers rode one solve
    assert_eq!(navigations.load(Ordering::SeqCst), 1);
    assert_eq!(state.cache.active_count().await, 1);
}

#[tokio::test]
async fn test_expired_clearance_triggers_fresh_solve() {
    let factory = CountingFactory::new();
    let navigations = Arc::clone(&factory.navigations);
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("ok")]));

    let mut settings = test_settings();
    settings.cache.clearance_ttl_secs = 0;
    let state = build_state(settings, Arc::new(factory), transport);
    let request = ProxyRequest::new("https://b.test/");

    state.orchestrator.proxy("anonymous", &request).await.unwrap();
    state.orchestrator.proxy("anonymous", &request).await.unwrap();

    // Zero TTL: the first clearance is already stale on the second request
    assert_eq!(navigations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_challenge_rejection_retries_once_then_succeeds() {
    let factory = CountingFactory::new();
    let navigations = Arc::clone(&factory.navigations);
    let transport = Arc::new(ScriptedTransport::new(vec![
        challenge_response(),
        ok_response("real content"),
    ]));
    let sends = Arc::clone(&transport.sends);

    let state = build_state(test_settings(), Arc::new(factory), transport);
    let request = ProxyRequest::new("https://a.test/");

    let response = state.orchestrator.proxy("anonymous", &request).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "real content");

    // The rejected replay invalidated the clearance and solved again
    assert_eq!(navigations.load(Ordering::SeqCst), 2);
    assert_eq!(sends.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_challenge_gives_up_after_second_rejection() {
    let factory = CountingFactory::new();
    let navigations = Arc::clone(&factory.navigations);
    let transport = Arc::new(ScriptedTransport::new(vec![challenge_response()]));
    let sends = Arc::clone(&transport.sends);

    let state = build_state(test_settings(), Arc::new(factory), transport);
    let request = ProxyRequest::new("https://a.test/");

    let err = state
        .orchestrator
        .proxy("anonymous", &request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        cf_clearance_proxy::Error::ChallengeNotBypassable { .. }
    ));

    // Exactly one retry: two solves, two replays, nothing cached
    assert_eq!(navigations.load(Ordering::SeqCst), 2);
    assert_eq!(sends.load(Ordering::SeqCst), 2);
    assert_eq!(state.cache.active_count().await, 0);
}

#[tokio::test]
async fn test_non_challenge_error_status_passes_through() {
    // A plain 404 is the origin speaking for itself
    let not_found = ScriptedTransport::new(vec![cf_clearance_proxy::proxy::TransportResponse {
        status: 404,
        headers: Default::default(),
        body: "not found".to_string(),
    }]);
    let state = build_state(
        test_settings(),
        Arc::new(CountingFactory::new()),
        Arc::new(not_found),
    );

    let response = state
        .orchestrator
        .proxy("anonymous", &ProxyRequest::new("https://a.test/missing"))
        .await
        .unwrap();
    assert_eq!(response.status_code, 404);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let factory = CountingFactory::new();
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("ok")]));

    let mut settings = test_settings();
    settings.limits.per_minute = 2;
    let state = build_state(settings, Arc::new(factory), transport);
    let request = ProxyRequest::new("https://a.test/");

    assert!(state.orchestrator.proxy("caller", &request).await.is_ok());
    assert!(state.orchestrator.proxy("caller", &request).await.is_ok());

    let err = state
        .orchestrator
        .proxy("caller", &request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        cf_clearance_proxy::Error::RateLimitExceeded { .. }
    ));
}

#[tokio::test]
async fn test_private_targets_are_rejected_before_any_work() {
    let factory = CountingFactory::new();
    let created = Arc::clone(&factory.created);
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("ok")]));
    let sends = Arc::clone(&transport.sends);

    let state = build_state(test_settings(), Arc::new(factory), transport);

    let err = state
        .orchestrator
        .proxy("anonymous", &ProxyRequest::new("http://192.168.1.1/router"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        cf_clearance_proxy::Error::TargetNotAllowed { .. }
    ));
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert_eq!(sends.load(Ordering::SeqCst), 0);
}
