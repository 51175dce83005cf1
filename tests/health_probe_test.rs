use apexbrain::launcher::HealthProbe;
use apexbrain::ApexError;
use httpmock::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_probe_succeeds_on_ok() {
    let server = MockServer::start();
    let health = server.mock(|when, then| {
        when.method(GET).path("/_stcore/health");
        then.status(200).body("ok");
    });

    let probe = HealthProbe::new(&server.base_url(), 3, Duration::from_millis(10)).unwrap();
    probe.check().await.unwrap();
    health.assert_hits(1);
}

#[tokio::test]
async fn test_probe_gives_up_after_attempts() {
    let server = MockServer::start();
    let health = server.mock(|when, then| {
        when.method(GET).path("/_stcore/health");
        then.status(503);
    });

    let probe = HealthProbe::new(&server.base_url(), 3, Duration::from_millis(10)).unwrap();
    let err = probe.check().await.unwrap_err();

    health.assert_hits(3);
    match err {
        ApexError::HealthCheckFailed { attempts, url } => {
            assert_eq!(attempts, 3);
            assert!(url.ends_with("/_stcore/health"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_probe_against_running_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = apexbrain::server::router(&Default::default());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let probe = HealthProbe::new(&format!("http://{}", addr), 5, Duration::from_millis(50)).unwrap();
    probe.check().await.unwrap();
}

#[tokio::test]
async fn test_silent_endpoint_times_out_per_attempt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and hold them open without ever answering.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let probe = HealthProbe::with_timeout(
        &format!("http://{}", addr),
        2,
        Duration::from_millis(10),
        Duration::from_millis(200),
    )
    .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), probe.check())
        .await
        .expect("health check must give up on a silent endpoint");
    assert!(matches!(
        outcome,
        Err(ApexError::HealthCheckFailed { attempts: 2, .. })
    ));
}
