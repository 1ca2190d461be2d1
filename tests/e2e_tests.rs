//! End-to-end tests: a full run against mock location, directory and
//! speed test servers, through the library and through the `nst` binary.

use assert_cmd::Command;
use network_speed_tester::{
    executor::{TestOrchestrator, TestRunner},
    logging::Logger,
    models::Config,
    AppError, Phase,
};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

const NEW_YORK: (&str, &str) = ("40.7128", "-74.0060");

/// Mock speed test server with healthy latency, download and upload endpoints
async fn start_speed_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/speedtest/latency.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("test=test"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/speedtest/random\d+x\d+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 256 * 1024]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/speedtest/upload.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("size=0"))
        .mount(&server)
        .await;

    server
}

/// Mock API server for location and directory lookups
async fn start_api_server(speed_server: &MockServer) -> MockServer {
    let api = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"ip":"203.0.113.7","loc":"{},{}","org":"AS64500 Example ISP"}}"#,
            NEW_YORK.0, NEW_YORK.1
        )))
        .mount(&api)
        .await;

    let directory = serde_json::json!([{
        "url": format!("{}/speedtest/upload.php", speed_server.uri()),
        "lat": NEW_YORK.0,
        "lon": NEW_YORK.1,
        "name": "New York, NY",
        "country": "United States",
        "cc": "US",
        "sponsor": "Example Telecom",
        "id": "4242",
        "host": "speed.example.com:8080"
    }]);

    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory))
        .mount(&api)
        .await;

    api
}

fn test_config(api: &MockServer) -> Config {
    Config {
        location_url: format!("{}/json", api.uri()),
        directory_url: format!("{}/servers", api.uri()),
        timeout_seconds: 30,
        latency_sample_timeout_ms: 2000,
        download_workers: 2,
        download_duration_seconds: 1,
        upload_workers: 2,
        upload_duration_seconds: 1,
        upload_size_bytes: 64 * 1024,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_full_run_with_single_nearby_server() {
    let speed = start_speed_server().await;
    let api = start_api_server(&speed).await;

    let orchestrator = TestOrchestrator::from_config(test_config(&api), Logger::quiet("E2E")).unwrap();
    let result = orchestrator.run(&CancellationToken::new(), None).await.unwrap();

    assert_eq!(result.server.id, "4242");
    assert_eq!(result.server.base_url, speed.uri());
    assert!(result.server.distance_km < 1e-6);
    assert_eq!(result.isp(), "AS64500 Example ISP");
    assert_eq!(result.external_ip(), "203.0.113.7");

    // Local mock round trips take a few milliseconds at most
    assert!(result.latency.sample_count >= 1);
    assert!(result.latency.average_ms < 500.0, "latency {}", result.latency.average_ms);

    assert!(result.download.bandwidth_bytes_per_sec > 0);
    assert!(result.download.total_bytes > 0);
    assert!(result.upload.bandwidth_bytes_per_sec > 0);
    assert!(result.upload.total_bytes > 0);
}

#[tokio::test]
async fn test_unknown_server_id_is_reported() {
    let speed = start_speed_server().await;
    let api = start_api_server(&speed).await;

    let config = Config {
        server_id: Some("999".to_string()),
        ..test_config(&api)
    };
    let orchestrator = TestOrchestrator::from_config(config, Logger::quiet("E2E")).unwrap();
    let err = orchestrator.run(&CancellationToken::new(), None).await.unwrap_err();

    assert_eq!(err.phase(), Some(Phase::SelectingServer));
    assert!(matches!(err.root_cause(), AppError::ServerNotFound(_)));
    assert_eq!(err.exit_code(), 6);
}

#[tokio::test]
async fn test_directory_outage_aborts_before_measuring() {
    let speed = start_speed_server().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ip":"203.0.113.7","loc":"1,1"}"#))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&api)
        .await;

    let orchestrator = TestOrchestrator::from_config(test_config(&api), Logger::quiet("E2E")).unwrap();
    let err = orchestrator.run(&CancellationToken::new(), None).await.unwrap_err();

    assert_eq!(err.phase(), Some(Phase::FetchingServers));
    assert!(matches!(err.root_cause(), AppError::DirectoryUnavailable(_)));

    // Nothing was measured against the speed server
    let requests = speed.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_binary_prints_json_result() {
    let speed = start_speed_server().await;
    let api = start_api_server(&speed).await;
    let location_url = format!("{}/json", api.uri());
    let directory_url = format!("{}/servers", api.uri());

    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("nst")
            .unwrap()
            .env("SPEEDTEST_LOCATION_URL", location_url)
            .env("SPEEDTEST_DIRECTORY_URL", directory_url)
            .env("SPEEDTEST_UPLOAD_SIZE", "65536")
            .env("SPEEDTEST_LATENCY_SAMPLES", "3")
            .args(["--json", "--download-duration", "1", "--upload-duration", "1", "--timeout", "30"])
            .timeout(Duration::from_secs(60))
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["server"]["id"], "4242");
    assert_eq!(report["isp"], "AS64500 Example ISP");
    assert_eq!(report["interface"]["externalIp"], "203.0.113.7");
    assert!(report["download"]["bandwidth"].as_u64().unwrap() > 0);
    assert!(report["upload"]["bandwidth"].as_u64().unwrap() > 0);
    assert!(report["ping"]["latency"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_binary_reports_missing_server_as_json_error() {
    let speed = start_speed_server().await;
    let api = start_api_server(&speed).await;
    let location_url = format!("{}/json", api.uri());
    let directory_url = format!("{}/servers", api.uri());

    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("nst")
            .unwrap()
            .env("SPEEDTEST_LOCATION_URL", location_url)
            .env("SPEEDTEST_DIRECTORY_URL", directory_url)
            .args(["--json", "--server", "12345"])
            .timeout(Duration::from_secs(60))
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(6));
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(body["error"].as_str().unwrap().contains("12345"));
    assert_eq!(body["phase"], "selection");
}
