use futures::StreamExt;
use reqwest::header::{HOST, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::feed::types::{ArticleRecord, PageResponse};
use crate::util::{host_header, preview};

const MAX_PAGE_SIZE_BYTES: usize = 10 * 1024 * 1024; // 10MB
const ERROR_DETAIL_CHARS: usize = 200;
const ARTICLES_PATH: [&str; 3] = ["api", "articles", "all"];

/// Errors raised while fetching one page from the upstream API.
///
/// Every variant is fatal to the feed generation that triggered it; the
/// fetcher never retries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code; `detail` is a preview of the body
    #[error("HTTP error: status {status}: {detail}")]
    HttpStatus { status: u16, detail: String },
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body was not valid JSON
    #[error("Invalid JSON in page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
    /// Pages are 1-based
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
}

/// Anything that can produce one page of article records.
///
/// [`PageFetcher`] is the HTTP implementation; the aggregation loop only
/// depends on this trait. The returned future is `Send` so a whole
/// aggregation can run on a spawned task.
pub trait PageSource {
    fn fetch(
        &self,
        page: u32,
    ) -> impl Future<Output = Result<Vec<ArticleRecord>, FetchError>> + Send;
}

/// Fetches pages of the upstream article listing.
///
/// Cheap to clone; the inner `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    endpoint: Url,
    host: Option<String>,
    user_agent: String,
    page_size: u32,
    timeout: Duration,
}

impl PageFetcher {
    /// Builds a fetcher from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BaseUrl`] if `config.base_url` fails validation.
    pub fn new(client: reqwest::Client, config: &Config) -> Result<Self, ConfigError> {
        // Appended rather than joined so a path prefix on the base survives
        let mut endpoint = config.base_url()?;
        endpoint
            .path_segments_mut()
            .map_err(|_| ConfigError::Invalid {
                key: "base_url",
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(ARTICLES_PATH);

        Ok(Self {
            client,
            host: host_header(&endpoint),
            endpoint,
            user_agent: config.user_agent.clone(),
            page_size: config.page_size,
            timeout: config.request_timeout(),
        })
    }

    /// Request URL for `page`:
    /// `<base>/api/articles/all?datasrc=articles&current=<page>&size=<page_size>`.
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("datasrc", "articles")
            .append_pair("current", &page.to_string())
            .append_pair("size", &self.page_size.to_string());
        url
    }

    /// Fetches `page` and returns the upstream JSON unchanged.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidPage`] - `page` is 0
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - Request exceeded the configured timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] - Response exceeded 10MB
    /// - [`FetchError::Decode`] - Body is not JSON
    pub async fn fetch_raw(&self, page: u32) -> Result<serde_json::Value, FetchError> {
        let bytes = self.fetch_bytes(page).await?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode { page, source })
    }

    /// Fetches `page` and extracts `data.records`.
    ///
    /// A missing `data` or `records` key yields an empty list rather than an
    /// error. Errors are the same as [`PageFetcher::fetch_raw`].
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<ArticleRecord>, FetchError> {
        let bytes = self.fetch_bytes(page).await?;
        let envelope: PageResponse =
            serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode { page, source })?;
        let records = envelope.into_records();

        tracing::debug!(page = page, records = records.len(), "Fetched article page");
        Ok(records)
    }

    async fn fetch_bytes(&self, page: u32) -> Result<Vec<u8>, FetchError> {
        if page == 0 {
            return Err(FetchError::InvalidPage(page));
        }

        let url = self.page_url(page);
        let mut request = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(host) = &self.host {
            request = request.header(HOST, host.as_str());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            // Best effort: the body is only used for the error message
            let body = response.text().await.unwrap_or_default();
            let detail = match preview(&body, ERROR_DETAIL_CHARS) {
                d if d.is_empty() => status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string(),
                d => d,
            };
            tracing::warn!(url = %url, status = status.as_u16(), detail = %detail, "Upstream returned error status");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                detail,
            });
        }

        read_limited_bytes(response, MAX_PAGE_SIZE_BYTES).await
    }
}

impl PageSource for PageFetcher {
    async fn fetch(&self, page: u32) -> Result<Vec<ArticleRecord>, FetchError> {
        self.fetch_page(page).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::RecordId;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE_ONE: &str = r#"{"code":200,"data":{"records":[
        {"id":1,"title":"A","content":"ca","author":"amy"},
        {"id":2,"title":"B","content":"cb"}
    ]}}"#;

    fn fetcher_for(server: &MockServer) -> PageFetcher {
        let config = Config {
            base_url: server.uri(),
            ..Config::default()
        };
        PageFetcher::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn test_page_url_shape() {
        let fetcher = PageFetcher::new(reqwest::Client::new(), &Config::default()).unwrap();
        assert_eq!(
            fetcher.page_url(3).as_str(),
            "https://n.ifun.cool/api/articles/all?datasrc=articles&current=3&size=12"
        );
    }

    #[test]
    fn test_page_url_keeps_base_path_prefix() {
        for base in ["https://mirror.example.com/quji", "https://mirror.example.com/quji/"] {
            let config = Config {
                base_url: base.to_string(),
                ..Config::default()
            };
            let fetcher = PageFetcher::new(reqwest::Client::new(), &config).unwrap();
            assert_eq!(
                fetcher.page_url(1).as_str(),
                "https://mirror.example.com/quji/api/articles/all?datasrc=articles&current=1&size=12",
                "base {base}"
            );
        }
    }

    #[test]
    fn test_host_header_from_base_url() {
        let fetcher = PageFetcher::new(reqwest::Client::new(), &Config::default()).unwrap();
        assert_eq!(fetcher.host.as_deref(), Some("n.ifun.cool"));
    }

    #[test]
    fn test_rejects_insecure_base_url() {
        let config = Config {
            base_url: "http://n.ifun.cool".to_string(),
            ..Config::default()
        };
        assert!(PageFetcher::new(reqwest::Client::new(), &config).is_err());
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/articles/all"))
            .and(query_param("datasrc", "articles"))
            .and(query_param("current", "1"))
            .and(query_param("size", "12"))
            .and(header("user-agent", "quji-rss-test"))
            .and(header("host", mock_server.address().to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = Config {
            base_url: mock_server.uri(),
            user_agent: "quji-rss-test".to_string(),
            ..Config::default()
        };
        let fetcher = PageFetcher::new(reqwest::Client::new(), &config).unwrap();
        let records = fetcher.fetch_page(1).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(RecordId::from(1)));
        assert_eq!(records[0].author.as_deref(), Some("amy"));
        assert_eq!(records[1].title.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_fetch_page_missing_records_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
            .mount(&mock_server)
            .await;

        let records = fetcher_for(&mock_server).fetch_page(7).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_503_is_http_status_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = fetcher_for(&mock_server).fetch_page(1).await.unwrap_err();
        match err {
            FetchError::HttpStatus { status: 503, detail } => {
                assert_eq!(detail, "upstream overloaded");
            }
            e => panic!("Expected HttpStatus(503), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_404_empty_body_uses_reason() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = fetcher_for(&mock_server).fetch_page(1).await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Not Found"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&mock_server)
            .await;

        let err = fetcher_for(&mock_server).fetch_page(2).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { page: 2, .. }));
    }

    #[tokio::test]
    async fn test_page_zero_rejected_without_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = fetcher_for(&mock_server).fetch_page(0).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidPage(0)));
    }

    #[tokio::test]
    async fn test_fetch_raw_passes_json_through() {
        let body = r#"{"code":200,"data":{"total":40,"records":[]},"msg":"ok"}"#;
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("current", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let value = fetcher_for(&mock_server).fetch_raw(4).await.unwrap();
        let expected: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value, expected);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PAGE_ONE)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let config = Config {
            base_url: mock_server.uri(),
            request_timeout_secs: 1,
            ..Config::default()
        };
        let fetcher = PageFetcher::new(reqwest::Client::new(), &config).unwrap();
        let err = fetcher.fetch_page(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }
}
