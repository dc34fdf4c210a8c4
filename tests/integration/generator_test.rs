//! SQLAI client tests against a one-shot local HTTP server.

use std::time::Duration;

use dsr_query::config::GeneratorConfig;
use dsr_query::generator::{GenerationErrorKind, SqlAiClient, SqlGenerator};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn config(api_url: String, timeout_secs: u64) -> GeneratorConfig {
    GeneratorConfig {
        api_key: Some("test-key".to_string()),
        api_url,
        engine: "mysql".to_string(),
        timeout_secs,
    }
}

/// Serves exactly one response and yields the raw request it received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/public/v2", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn test_generate_sends_request_and_unwraps_fence() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"query":"```sql\nSELECT COUNT(*) FROM dsr_table WHERE numerical_year = 2020\n```"}"#,
    )
    .await;
    let client = SqlAiClient::new(&config(url, 5)).unwrap();

    let sql = client
        .generate("total number of fires in 2020", "dsr_table(numerical_year INT)")
        .await
        .unwrap();
    assert_eq!(sql, "SELECT COUNT(*) FROM dsr_table WHERE numerical_year = 2020");

    let request = server.await.unwrap();
    let lowered = request.to_lowercase();
    assert!(lowered.starts_with("post /api/public/v2"), "{request}");
    assert!(lowered.contains("authorization: bearer test-key"), "{request}");
    assert!(request.contains(r#""mode":"textToSQL""#), "{request}");
    assert!(request.contains(r#""engine":"mysql""#), "{request}");
    assert!(request.contains(r#""dataSource":"dsr_table(numerical_year INT)""#), "{request}");
    assert!(request.contains(r#""prompt":"total number of fires in 2020""#), "{request}");
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (url, _server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#).await;
    let client = SqlAiClient::new(&config(url, 5)).unwrap();

    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::Authentication);
    assert!(!err.is_retryable());
    assert!(err.rendered().starts_with("ERROR: SQLAI Authentication Failed (401)."));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (url, _server) = serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;
    let client = SqlAiClient::new(&config(url, 5)).unwrap();

    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::Http { status: 503 });
    assert!(err.is_retryable());
    assert_eq!(err.message, "SQLAI HTTP Failed (503): overloaded");
}

#[tokio::test]
async fn test_malformed_body() {
    let (url, _server) = serve_once("200 OK", "<html>gateway</html>").await;
    let client = SqlAiClient::new(&config(url, 5)).unwrap();

    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_missing_query_field() {
    let (url, _server) = serve_once("200 OK", r#"{"status":"ok"}"#).await;
    let client = SqlAiClient::new(&config(url, 5)).unwrap();

    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::MissingField);
    assert!(err.message.contains("did not return a valid 'query'"));
}

#[tokio::test]
async fn test_unreachable_service_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let client = SqlAiClient::new(&config(url, 5)).unwrap();
    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::Network);
    assert!(err.message.starts_with("SQLAI Network Error:"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_silent_service_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let client = SqlAiClient::new(&config(url, 1)).unwrap();
    let err = client.generate("q", "s").await.unwrap_err();
    assert_eq!(err.kind, GenerationErrorKind::Timeout);
}
