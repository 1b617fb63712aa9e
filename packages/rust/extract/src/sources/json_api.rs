//! Paginated JSON-API extractor source.
//!
//! Consumes an already-structured exhibitor feed of the form
//! `GET {base}?page=N&pageSize=M` → `{ "exhibitors": [...], "totalPages": T }`.
//! `totalPages` is advisory and becomes known after the first fetch.

use std::time::Duration;

use async_trait::async_trait;
use expoharvest_shared::{ExpoHarvestError, RawExhibitor, Result};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{Batch, Extractor};

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("ExpoHarvest/", env!("CARGO_PKG_VERSION"));

/// One page of the upstream feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedPage {
    #[serde(default)]
    exhibitors: Vec<RawExhibitor>,
    #[serde(default)]
    total_pages: Option<u32>,
}

/// An [`Extractor`] that pages through a JSON exhibitor feed over HTTP.
pub struct JsonApiExtractor {
    client: Client,
    base_url: Url,
    page_size: u32,
    rate_limit_ms: u64,
    /// 1-based page cursor.
    next_page: u32,
    total_pages: Option<u32>,
    exhausted: bool,
}

impl JsonApiExtractor {
    /// Create a source for `base_url`, fetching `page_size` records per page.
    pub fn new(base_url: &str, page_size: u32, rate_limit_ms: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ExpoHarvestError::validation(format!("invalid base_url: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExpoHarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            page_size,
            rate_limit_ms,
            next_page: 1,
            total_pages: None,
            exhausted: false,
        })
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &self.page_size.to_string());
        url
    }
}

#[async_trait]
impl Extractor for JsonApiExtractor {
    async fn next_batch(&mut self) -> Result<Batch> {
        if self.exhausted {
            return Ok(Batch {
                records: Vec::new(),
                done: true,
            });
        }

        // Rate limiting between page fetches
        if self.next_page > 1 && self.rate_limit_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.rate_limit_ms)).await;
        }

        let page = self.next_page;
        let url = self.page_url(page);
        tracing::debug!(%url, page, "fetching feed page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ExpoHarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExpoHarvestError::Network(format!("{url}: HTTP {status}")));
        }

        let feed: FeedPage = response
            .json()
            .await
            .map_err(|e| ExpoHarvestError::Extract(format!("{url}: invalid feed body: {e}")))?;

        if feed.total_pages.is_some() {
            self.total_pages = feed.total_pages;
        }

        self.next_page += 1;
        self.exhausted = feed.exhibitors.is_empty()
            || self.total_pages.is_some_and(|total| page >= total);

        Ok(Batch {
            records: feed.exhibitors,
            done: self.exhausted,
        })
    }

    fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    fn name(&self) -> &str {
        "json-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn pages_through_feed_until_total() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exhibitors"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"exhibitors": [{"companyName": "Acme Inc", "boothNo": "A-1"}],
                    "totalPages": 2}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/exhibitors"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"exhibitors": [{"companyName": "Borealis"}], "totalPages": 2}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut source =
            JsonApiExtractor::new(&format!("{}/exhibitors", server.uri()), 25, 0).unwrap();
        assert!(source.total_pages().is_none());

        let first = source.next_batch().await.expect("page 1");
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.records[0].company_name.as_deref(), Some("Acme Inc"));
        assert!(!first.done);
        assert_eq!(source.total_pages(), Some(2));

        let second = source.next_batch().await.expect("page 2");
        assert_eq!(second.records[0].company_name.as_deref(), Some("Borealis"));
        assert!(second.done);

        // Further pulls are empty and done, no extra HTTP traffic
        let after = source.next_batch().await.expect("after exhaustion");
        assert!(after.records.is_empty());
        assert!(after.done);
    }

    #[tokio::test]
    async fn empty_page_ends_feed_without_total() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exhibitors"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"exhibitors": []}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut source =
            JsonApiExtractor::new(&format!("{}/exhibitors", server.uri()), 25, 0).unwrap();
        let batch = source.next_batch().await.expect("empty page");
        assert!(batch.records.is_empty());
        assert!(batch.done);
        assert!(source.total_pages().is_none());
    }

    #[tokio::test]
    async fn http_error_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut source = JsonApiExtractor::new(&server.uri(), 25, 0).unwrap();
        let err = source.next_batch().await.expect_err("HTTP 503");
        assert!(matches!(err, ExpoHarvestError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn malformed_body_is_extract_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>not json</html>", "text/html"),
            )
            .mount(&server)
            .await;

        let mut source = JsonApiExtractor::new(&server.uri(), 25, 0).unwrap();
        let err = source.next_batch().await.expect_err("bad body");
        assert!(matches!(err, ExpoHarvestError::Extract(_)));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = JsonApiExtractor::new("not a url", 25, 0);
        assert!(matches!(
            result,
            Err(ExpoHarvestError::Validation { .. })
        ));
    }
}
