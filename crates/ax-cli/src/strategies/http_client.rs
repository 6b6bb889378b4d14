//! Async HTTP client wrapping reqwest.
//!
//! Retries on 5xx and connection errors with exponential backoff, honours
//! `retry-after` on 429, and falls back to HTTP/1.1 on protocol errors.

use anyhow::Result;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared HTTP client for the network strategies.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback for servers that reject HTTP/2.
    h1_client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            max_retries: 2,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET with retry, falling back to HTTP/1.1 on protocol errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    tracing::debug!("Retrying {url} over HTTP/1.1: {err_str}");
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            match client.get(url).send().await {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let content_type = r
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_lowercase);
                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries && !e.is_builder() {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_get_reports_status_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{\"a\":1}", "application/json"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).with_max_retries(0);
        let resp = client.get(&format!("{}/data", server.uri())).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(resp.body, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_server_error_without_retries_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).with_max_retries(0);
        let resp = client.get(&server.uri()).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
    }
}
