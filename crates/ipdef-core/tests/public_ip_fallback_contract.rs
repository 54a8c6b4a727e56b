//! Contract Test: Public IP Fallback Chain
//!
//! Constraints verified:
//! - Endpoints are tried strictly in configured order; the first valid
//!   answer wins and later endpoints are never contacted
//! - A cached answer is served without touching any endpoint until its TTL
//!   elapses
//! - Exhausting the list reports every per-endpoint cause, in order
//! - Concurrent callers on a cold cache trigger a single fallback walk
//!
//! If this test fails, detection is contacting the network more (or less)
//! than it should.

mod common;

use common::*;
use ipdef_core::traits::TransportError;
use ipdef_core::{DetectorConfig, Error, Family, PublicIpDetector, ResolutionCache, ServiceEndpoint};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn detector_with(
    transport: &Arc<ScriptedHttpTransport>,
    endpoints: Vec<ServiceEndpoint>,
) -> PublicIpDetector {
    let config = DetectorConfig {
        endpoints,
        ..DetectorConfig::default()
    };
    PublicIpDetector::new(transport.clone(), ResolutionCache::new(), config)
}

#[tokio::test]
async fn first_failure_falls_through_to_second_endpoint() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_error("a", TransportError::connection("connection refused"))
            .with_body("b", "203.0.113.5\n")
            .with_body("c", "198.51.100.1"),
    );
    let detector = detector_with(&transport, vec![endpoint("a"), endpoint("b"), endpoint("c")]);

    let found = detector.detect().await.expect("b answers");
    assert_eq!(found.address, addr("203.0.113.5"));
    assert_eq!(found.source, "b");
    assert_eq!(transport.requested(), vec![url_for("a"), url_for("b")]);

    // Within the TTL no endpoint is invoked at all
    let again = detector.detect().await.expect("cached");
    assert_eq!(again, found);
    assert_eq!(transport.fetch_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cache_expiry_triggers_a_new_walk() {
    let transport = Arc::new(ScriptedHttpTransport::new().with_body("a", "192.0.2.10"));
    let detector = detector_with(&transport, vec![endpoint("a")]);

    detector.detect().await.unwrap();
    tokio::time::advance(Duration::from_secs(59)).await;
    detector.detect().await.unwrap();
    assert_eq!(transport.fetch_call_count(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    detector.detect().await.unwrap();
    assert_eq!(transport.fetch_call_count(), 2);
}

#[tokio::test]
async fn all_failures_are_reported_in_order() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_error("a", TransportError::Timeout)
            .with_body("b", "not an address")
            .with_error("c", TransportError::connection("HTTP error: 503")),
    );
    let detector = detector_with(&transport, vec![endpoint("a"), endpoint("b"), endpoint("c")]);

    match detector.detect().await {
        Err(Error::AllServicesUnavailable { attempts }) => {
            let names: Vec<&str> = attempts.iter().map(|a| a.endpoint.as_str()).collect();
            assert_eq!(names, vec!["a", "b", "c"]);
            assert_eq!(attempts[0].cause, TransportError::Timeout);
            assert!(matches!(attempts[1].cause, TransportError::MalformedResponse(_)));
            assert!(matches!(attempts[2].cause, TransportError::Connection(_)));
        }
        other => panic!("expected AllServicesUnavailable, got {:?}", other),
    }

    // Failures are not cached
    let _ = detector.detect().await;
    assert_eq!(transport.fetch_call_count(), 6);
}

#[tokio::test]
async fn disabled_endpoints_are_skipped() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("a", "192.0.2.1")
            .with_body("b", "192.0.2.2"),
    );
    let endpoints = vec![endpoint("a").with_enabled(false), endpoint("b")];
    let detector = detector_with(&transport, endpoints);

    let found = detector.detect().await.unwrap();
    assert_eq!(found.source, "b");
    assert_eq!(transport.requested(), vec![url_for("b")]);
}

#[tokio::test]
async fn no_enabled_endpoint_reports_empty_attempts() {
    let transport = Arc::new(ScriptedHttpTransport::new().with_body("a", "192.0.2.1"));
    let detector = detector_with(&transport, vec![endpoint("a").with_enabled(false)]);

    assert_eq!(
        detector.detect().await,
        Err(Error::AllServicesUnavailable { attempts: vec![] })
    );
    assert_eq!(transport.fetch_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_endpoint_times_out_and_falls_through() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("slow", "192.0.2.1")
            .with_delay("slow", Duration::from_secs(30))
            .with_body("fast", "192.0.2.2"),
    );
    let detector = detector_with(
        &transport,
        vec![endpoint("slow").with_timeout_secs(2), endpoint("fast")],
    );

    let found = detector.detect().await.unwrap();
    assert_eq!(found.source, "fast");
    assert_eq!(found.address, addr("192.0.2.2"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_cold_callers_share_one_walk() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("a", "192.0.2.77")
            .with_delay("a", Duration::from_millis(200)),
    );
    let detector = detector_with(&transport, vec![endpoint("a")]);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let detector = detector.clone();
        handles.push(tokio::spawn(async move { detector.detect().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().address, addr("192.0.2.77"));
    }

    assert_eq!(transport.fetch_call_count(), 1);
}

#[tokio::test]
async fn reload_replaces_endpoints_and_drops_cache() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("a", "192.0.2.1")
            .with_body("b", "192.0.2.2"),
    );
    let detector = detector_with(&transport, vec![endpoint("a")]);
    assert_eq!(detector.detect().await.unwrap().source, "a");
    assert_eq!(detector.last_source().await.as_deref(), Some("a"));

    assert_ok!(detector.reload_endpoints(vec![endpoint("b")]).await);
    let found = detector.detect().await.unwrap();
    assert_eq!(found.source, "b");
    assert_eq!(detector.last_source().await.as_deref(), Some("b"));
    assert_eq!(detector.endpoints().await, vec![endpoint("b")]);
}

#[tokio::test]
async fn invalidate_forces_redetection() {
    let transport = Arc::new(ScriptedHttpTransport::new().with_body("a", "192.0.2.1"));
    let detector = detector_with(&transport, vec![endpoint("a")]);

    detector.detect().await.unwrap();
    assert!(detector.invalidate().await);
    detector.detect().await.unwrap();
    assert_eq!(transport.fetch_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_detection_leaves_cache_untouched() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("a", "192.0.2.1")
            .with_delay("a", Duration::from_secs(5)),
    );
    let detector = detector_with(&transport, vec![endpoint("a")]);

    let result = detector.detect_with_deadline(Duration::from_secs(1)).await;
    assert!(matches!(result, Err(Error::ResolutionTimeout { .. })));
    assert!(!detector.invalidate().await, "nothing should have been cached");
}

#[tokio::test]
async fn family_preference_is_enforced() {
    let transport = Arc::new(
        ScriptedHttpTransport::new()
            .with_body("a", "2001:db8::10")
            .with_body("b", "2001:db8::11"),
    );
    let config = DetectorConfig {
        endpoints: vec![endpoint("a"), endpoint("b")],
        family: Some(Family::V4),
        ..DetectorConfig::default()
    };
    let detector = PublicIpDetector::new(transport.clone(), ResolutionCache::new(), config);

    match detector.detect().await {
        Err(Error::AllServicesUnavailable { attempts }) => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts
                .iter()
                .all(|a| matches!(a.cause, TransportError::MalformedResponse(_))));
        }
        other => panic!("expected AllServicesUnavailable, got {:?}", other),
    }
}
