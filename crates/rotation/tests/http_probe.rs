//! HTTP probe behavior against a mock server.

use std::time::Duration;

use keywheel_rotation::{
    DependencyProbe, HttpProbe, RotationError, ServiceDependency, UpdateMethod, ValidationSpec,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dependency(service: &str, url: String) -> ServiceDependency {
    ServiceDependency {
        service: service.to_string(),
        health_check: Some(url),
        restart_required: false,
        update_method: UpdateMethod::ApiCall,
    }
}

#[tokio::test]
async fn healthy_endpoint_passes_the_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(5));
    let dep = dependency("billing", format!("{}/health", server.uri()));
    probe.check_health(&dep).await.unwrap();
}

#[tokio::test]
async fn non_2xx_health_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(5));
    let dep = dependency("billing", format!("{}/health", server.uri()));

    let err = probe.check_health(&dep).await.unwrap_err();
    match err {
        RotationError::DependencyUnhealthy { service, reason } => {
            assert_eq!(service, "billing");
            assert!(reason.contains("503"), "reason was: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_endpoint_times_out_as_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_millis(200));
    let dep = dependency("billing", format!("{}/health", server.uri()));

    let err = probe.check_health(&dep).await.unwrap_err();
    assert!(matches!(err, RotationError::DependencyUnhealthy { .. }));
}

#[tokio::test]
async fn functional_check_matches_the_expected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token/validate"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(5));
    let spec = ValidationSpec {
        endpoint: format!("{}/v1/token/validate", server.uri()),
        method: "POST".to_string(),
        expected_status: 204,
    };
    probe.functional_check(&spec).await.unwrap();

    // A different status than declared is a failure even when 2xx.
    let mismatched = ValidationSpec {
        expected_status: 200,
        ..spec
    };
    let err = probe.functional_check(&mismatched).await.unwrap_err();
    assert!(matches!(err, RotationError::DependencyUnhealthy { .. }));
}
