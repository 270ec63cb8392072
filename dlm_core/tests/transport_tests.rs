use futures::StreamExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use dlm_core::{DownloadError, HttpTransport, Transport};

/// Generates deterministic test data.
fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// A wiremock responder that honours Range requests by slicing the body and
/// answering 206 with the matching Content-Range header.
struct RangeResponder {
    body: Vec<u8>,
}

impl wiremock::Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if let Some(range_header) = request.headers.get(&reqwest::header::RANGE) {
            let range_str = range_header.to_str().unwrap_or("");
            if let Some((start, end)) = parse_range(range_str, self.body.len()) {
                let slice = &self.body[start..=end];
                return ResponseTemplate::new(206)
                    .set_body_bytes(slice.to_vec())
                    .insert_header(
                        "Content-Range",
                        format!("bytes {}-{}/{}", start, end, self.body.len()),
                    )
                    .insert_header("Content-Type", "application/octet-stream");
            }
        }
        ResponseTemplate::new(200)
            .set_body_bytes(self.body.clone())
            .insert_header("Content-Type", "application/octet-stream")
    }
}

/// Parses a Range header like "bytes=0-" or "bytes=1024-2047".
fn parse_range(header: &str, body_len: usize) -> Option<(usize, usize)> {
    let s = header.strip_prefix("bytes=")?;
    let parts: Vec<&str> = s.splitn(2, '-').collect();
    if parts.len() != 2 {
        return None;
    }
    let start: usize = parts[0].parse().ok()?;
    let end: usize = if parts[1].is_empty() {
        body_len - 1
    } else {
        parts[1].parse().ok()?
    };
    Some((start, end.min(body_len - 1)))
}

async fn drain(mut response: dlm_core::TransportResponse) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = response.stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn fetch_without_offset_returns_full_body() {
    let body = generate_test_data(4096);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(RangeResponder { body: body.clone() })
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let response = transport.fetch(&server.uri(), 0).await.unwrap();

    assert!(!response.resumed);
    assert_eq!(response.content_length, Some(4096));
    assert_eq!(drain(response).await, body);
}

#[tokio::test]
async fn fetch_with_offset_returns_partial_content() {
    let body = generate_test_data(4096);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(RangeResponder { body: body.clone() })
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let response = transport.fetch(&server.uri(), 1024).await.unwrap();

    assert!(response.resumed);
    assert_eq!(response.content_length, Some(3072));
    assert_eq!(drain(response).await, &body[1024..]);
}

#[tokio::test]
async fn fetch_error_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let err = transport.fetch(&server.uri(), 0).await.unwrap_err();
    assert!(matches!(err, DownloadError::Transport(_)));
}

#[tokio::test]
async fn fetch_unreachable_host_fails() {
    let transport = HttpTransport::new().unwrap();
    let result = transport.fetch("http://127.0.0.1:1/nonexistent", 0).await;
    assert!(result.is_err());
}
