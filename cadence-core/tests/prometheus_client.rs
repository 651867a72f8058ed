//! PrometheusClient against a minimal HTTP/1.1 stub server.

use cadence_core::config::SourceConfig;
use cadence_core::{MetricSpec, MetricsSource, PrometheusClient};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one canned response and hand back the raw request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
    });

    (addr, rx)
}

fn client(addr: SocketAddr, client_id: Option<&str>) -> PrometheusClient {
    PrometheusClient::new(&SourceConfig {
        url: format!("http://{}", addr),
        timeout_ms: 2_000,
        client_id: client_id.map(str::to_string),
    })
    .unwrap()
}

const VECTOR: &str = r#"{"status":"success","data":{"resultType":"vector","result":[
    {"metric":{"instance":"a"},"value":[1700000000.0,"12.5"]},
    {"metric":{"instance":"b"},"value":[1700000000.0,"7.5"]}]}}"#;

#[tokio::test]
async fn test_query_decodes_vector() {
    let (addr, request) = serve_once("200 OK", VECTOR).await;
    let client = client(addr, Some("collector-7"));

    let result = client.query(&MetricSpec::from("up")).await.unwrap();

    let values: Vec<f64> = result.series.iter().map(|s| s.value).collect();
    assert_eq!(values, vec![12.5, 7.5]);
    assert_eq!(result.series[0].labels.get("instance").map(String::as_str), Some("a"));
    assert_eq!(result.bytes, VECTOR.len());

    let request = request.await.unwrap();
    assert!(request.starts_with("GET /api/v1/query?query=up "));
    assert!(request.to_ascii_lowercase().contains("x-script-id: collector-7"));
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let (addr, _request) = serve_once(
        "200 OK",
        r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#,
    )
    .await;

    let result = client(addr, None).query(&MetricSpec::from("up")).await.unwrap();
    assert!(result.series.is_empty());
}

#[tokio::test]
async fn test_non_success_status_is_status_error() {
    let (addr, _request) = serve_once("503 Service Unavailable", "{}").await;

    let err = client(addr, None).query(&MetricSpec::from("up")).await.unwrap_err();
    assert_eq!(err.kind(), "status");
    assert!(err.is_fetch_failure());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let (addr, _request) = serve_once("200 OK", "<html>not json</html>").await;

    let err = client(addr, None).query(&MetricSpec::from("up")).await.unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn test_unreachable_source_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, None).query(&MetricSpec::from("up")).await.unwrap_err();
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = PrometheusClient::new(&SourceConfig {
        url: format!("http://{}", addr),
        timeout_ms: 200,
        client_id: None,
    })
    .unwrap();

    let err = client.query(&MetricSpec::from("up")).await.unwrap_err();
    assert_eq!(err.kind(), "transport");
    assert!(err.to_string().contains("timed out"));
}
