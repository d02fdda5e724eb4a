//! HTTP implementation of [`Fetcher`].
//!
//! A single [`reqwest::Client`] is built up front with the configured
//! headers and timeout and shared by every page request of a crawl.
//! There is no retry layer: a failed request is reported to
//! the caller, which records it against the page and moves on.

use crate::{Fetcher, ScrapeConfig, ScrapeError};

/// [`Fetcher`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a client with the headers and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] for an invalid header and
    /// [`ScrapeError::Client`] if the client cannot be constructed.
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ScrapeError::Parse(format!("invalid header name '{key}': {e}")))?;
            let val = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| ScrapeError::Parse(format!("invalid header value '{value}': {e}")))?;
            header_map.insert(name, val);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

/// Maps a transport error onto the timeout/connection split.
fn classify(url: &str, e: reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::Timeout {
            url: url.to_owned(),
        }
    } else {
        ScrapeError::Connection {
            url: url.to_owned(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves one connection on a local port. With `reply` set it reads the
    /// request and writes the raw response; without it the connection is
    /// held open and never answered.
    async fn one_shot_server(reply: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 4096];
            let _ = socket.read(&mut buf).await;
            match reply {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.ok();
                }
                None => tokio::time::sleep(Duration::from_secs(10)).await,
            }
        });

        format!("http://{addr}")
    }

    #[test]
    fn builds_client_from_default_config() {
        assert!(HttpFetcher::new(&ScrapeConfig::default()).is_ok());
    }

    #[test]
    fn rejects_invalid_header_name() {
        let config = ScrapeConfig::default().with_header("bad header", "x");
        assert!(matches!(
            HttpFetcher::new(&config),
            Err(ScrapeError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let base = one_shot_server(Some(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;
        let config = ScrapeConfig::new(&base).with_timeout(Duration::from_secs(5));
        let fetcher = HttpFetcher::new(&config).unwrap();
        let url = config.page_url(1);

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(
            matches!(&err, ScrapeError::Status { status: 500, url: u } if *u == url),
            "{err}"
        );
    }

    #[tokio::test]
    async fn success_returns_body() {
        let base = one_shot_server(Some(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 12\r\nconnection: close\r\n\r\n<p>trang</p>",
        ))
        .await;
        let config = ScrapeConfig::new(&base).with_timeout(Duration::from_secs(5));
        let fetcher = HttpFetcher::new(&config).unwrap();

        let body = fetcher.fetch(&config.page_url(1)).await.unwrap();
        assert_eq!(body, "<p>trang</p>");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let base = one_shot_server(None).await;
        let config = ScrapeConfig::new(&base).with_timeout(Duration::from_millis(200));
        let fetcher = HttpFetcher::new(&config).unwrap();

        let err = fetcher.fetch(&config.page_url(1)).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { .. }), "{err}");
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let config =
            ScrapeConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch(&config.page_url(1)).await.unwrap_err();
        assert!(err.is_network(), "{err}");
    }
}
