//! HTTP implementation of the translation gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};

use super::error::GatewayError;
use super::parse::{parse_word_results, WordResult};
use super::TranslationGateway;
use crate::config::GatewayConfig;

/// Maximum length of an error body kept in a [`GatewayError::Status`].
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

/// Posts `{text, source, target}` as JSON to a fixed endpoint.
pub struct HttpGateway {
    client: Client,
    endpoint: String,
}

impl HttpGateway {
    /// Creates a gateway from configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_timeouts(
            &config.endpoint,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Creates a gateway with explicit timeouts. An expired timeout is a
    /// soft failure like any other.
    pub fn with_timeouts(
        endpoint: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TranslationGateway for HttpGateway {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordResult>, GatewayError> {
        let span = info_span!(
            "gateway.translate",
            source = source_lang,
            target = target_lang,
            chars = text.chars().count()
        );

        async move {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&TranslateRequest {
                    text,
                    source: source_lang,
                    target: target_lang,
                })
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                warn!("Translation service answered HTTP {}", status.as_u16());
                return Err(GatewayError::Status {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                });
            }

            let words = parse_word_results(&body)?;
            debug!("Translation service returned {} words", words.len());
            Ok(words)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves exactly one HTTP response and returns the raw request.
    fn serve_once(status_line: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/processhtml", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            thread::sleep(delay);
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            request
        });

        (url, handle)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
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
                if data.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn gateway(url: &str, request_timeout: Duration) -> HttpGateway {
        HttpGateway::with_timeouts(url, Duration::from_secs(2), request_timeout).unwrap()
    }

    #[tokio::test]
    async fn test_translate_posts_json_and_parses_words() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"[["Hello", "hello", "INTJ", null, 3, "Bonjour"]]"#,
            Duration::ZERO,
        );

        let words = gateway(&url, Duration::from_secs(5))
            .translate("<p>Hello</p>", "en", "fr")
            .await
            .unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].translated, "Bonjour");
        assert_eq!(words[0].position, 3);

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /processhtml"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["text"], "<p>Hello</p>");
        assert_eq!(json["source"], "en");
        assert_eq!(json["target"], "fr");
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let (url, server) = serve_once("HTTP/1.1 503 Service Unavailable", "busy", Duration::ZERO);

        let err = gateway(&url, Duration::from_secs(5))
            .translate("x", "en", "fr")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Status {
                status: 503,
                body: "busy".to_string()
            }
        );
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_failure() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"error": "oops"}"#, Duration::ZERO);

        let err = gateway(&url, Duration::from_secs(5))
            .translate("x", "en", "fr")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "[]", Duration::from_millis(1500));

        let err = gateway(&url, Duration::from_millis(300))
            .translate("x", "en", "fr")
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout);
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = gateway(&url, Duration::from_secs(2))
            .translate("x", "en", "fr")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Request(_)));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert_eq!(truncated.chars().filter(|c| *c == 'é').count(), MAX_ERROR_BODY_LENGTH);
    }
}
