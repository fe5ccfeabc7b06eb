use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use super::QueryParams;
use crate::config::HttpConfig;
use crate::error::HttpError;

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single GET with no caching or retry. Status codes are reported, not
/// turned into errors; that decision belongs to the caller.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<RawResponse, HttpError>;
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr,en;q=0.9"));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| HttpError::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<RawResponse, HttpError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        // The client timeout also covers reading the body.
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RetryPolicy, RetryingFetcher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Sends headers and part of the body on every connection, then goes quiet.
    async fn stalling_server(connections: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                              Content-Length: 100\r\n\r\n{\"partial\":",
                        )
                        .await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });
        format!("http://{}/slow", addr)
    }

    fn one_second_config() -> HttpConfig {
        HttpConfig {
            timeout_secs: 1,
            cache_dir: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stalled_body_is_timeout() {
        let connections = Arc::new(AtomicUsize::new(0));
        let url = stalling_server(connections.clone()).await;
        let fetcher = ReqwestFetcher::new(&one_second_config()).unwrap();

        let err = fetcher.get(&url, &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout { .. }), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_stalled_body_is_retried() {
        let connections = Arc::new(AtomicUsize::new(0));
        let url = stalling_server(connections.clone()).await;
        let fetcher = RetryingFetcher::new(
            ReqwestFetcher::new(&one_second_config()).unwrap(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
            },
        );

        let err = fetcher.get(&url, &QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout { .. }));
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }
}
