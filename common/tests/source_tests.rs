// HTTP tests for the AtCoder Problems client and the Discord webhook sink

use chrono::{TimeZone, Utc};
use common::config::ApiConfig;
use common::errors::{FetchError, NotificationError};
use common::models::{AcceptedNotification, SubmissionResult};
use common::notifier::{DiscordWebhookSink, NotificationSink};
use common::source::{AtCoderProblemsClient, SubmissionSource};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        timeout_seconds: 1,
        ..ApiConfig::default()
    }
}

fn submissions_body() -> serde_json::Value {
    json!([
        {
            "id": 2,
            "epoch_second": 200,
            "problem_id": "abc300_b",
            "contest_id": "abc300",
            "user_id": "tourist",
            "language": "C++ 23 (gcc 12.2)",
            "point": 200.0,
            "length": 812,
            "result": "AC",
            "execution_time": 3
        },
        {
            "id": 1,
            "epoch_second": 100,
            "problem_id": "abc300_a",
            "contest_id": "abc300",
            "user_id": "tourist",
            "language": "Rust (rustc 1.70.0)",
            "point": 100.0,
            "length": 400,
            "result": "WA",
            "execution_time": null
        }
    ])
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_fetch_sends_user_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/user/submissions"))
        .and(query_param("user", "tourist"))
        .and(query_param("from_second", "1700000000"))
        .and(headers("accept", vec!["application/json", "text/plain", "*/*"]))
        .respond_with(ResponseTemplate::new(200).set_body_json(submissions_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let submissions = client.fetch("tourist", Some(1_700_000_000)).await.unwrap();

    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].problem_id, "abc300_b");
    assert_eq!(submissions[0].result, SubmissionResult::Ac);
    assert_eq!(submissions[1].execution_time, None);
}

#[tokio::test]
async fn test_not_found_means_no_submissions() {
    let server = MockServer::start().await;
    Mock::given(path("/v3/user/submissions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let submissions = client.fetch("nobody", None).await.unwrap();

    assert!(submissions.is_empty());
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(path("/v3/user/submissions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let err = client.fetch("tourist", Some(0)).await.unwrap_err();

    assert!(matches!(err, FetchError::HttpStatus(500)));
    assert_eq!(err.reason(), "http_status");
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let server = MockServer::start().await;
    let body = gzip(submissions_body().to_string().as_bytes());
    Mock::given(path("/v3/user/submissions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .insert_header("content-type", "application/json")
                .set_body_bytes(body),
        )
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let submissions = client.fetch("tourist", Some(0)).await.unwrap();

    assert_eq!(submissions.len(), 2);
}

#[tokio::test]
async fn test_corrupt_compressed_body_is_a_decode_error() {
    for encoding in ["gzip", "deflate", "br"] {
        let server = MockServer::start().await;
        Mock::given(path("/v3/user/submissions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-encoding", encoding)
                    .set_body_bytes(b"definitely not compressed".to_vec()),
            )
            .mount(&server)
            .await;

        let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
        let err = client.fetch("tourist", Some(0)).await.unwrap_err();

        assert!(
            matches!(err, FetchError::Decode(_)),
            "{} body gave {:?}",
            encoding,
            err
        );
        assert_eq!(err.reason(), "decode");
    }
}

#[tokio::test]
async fn test_malformed_json_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(path("/v3/user/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let err = client.fetch("tourist", Some(0)).await.unwrap_err();

    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/v3/user/submissions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = AtCoderProblemsClient::new(&api_config(&server)).unwrap();
    let err = client.fetch("tourist", Some(0)).await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout(1)));
}

#[tokio::test]
async fn test_unreachable_host_is_a_network_error() {
    let config = ApiConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 5,
        ..ApiConfig::default()
    };
    let client = AtCoderProblemsClient::new(&config).unwrap();
    let err = client.fetch("tourist", Some(0)).await.unwrap_err();

    assert!(matches!(err, FetchError::Network(_) | FetchError::Timeout(_)));
}

fn notification() -> AcceptedNotification {
    AcceptedNotification {
        submission_id: 42,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        user_id: "tourist".to_string(),
        contest_id: "abc300".to_string(),
        problem_id: "abc300_a".to_string(),
        language: "Rust (rustc 1.70.0)".to_string(),
        point: 100.0,
    }
}

#[tokio::test]
async fn test_discord_webhook_posts_embed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(body_partial_json(json!({
            "embeds": [{ "url": "https://atcoder.jp/contests/abc300/submissions/42" }]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sink = DiscordWebhookSink::new(
        Some(format!("{}/webhook", server.uri())),
        Duration::from_secs(5),
    )
    .unwrap();

    sink.notify(&notification()).await.unwrap();
}

#[tokio::test]
async fn test_discord_webhook_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = DiscordWebhookSink::new(Some(server.uri()), Duration::from_secs(5)).unwrap();
    let err = sink.notify(&notification()).await.unwrap_err();

    assert!(matches!(
        err,
        NotificationError::HttpStatus { status: 500, .. }
    ));
}
