//! Portal page retrieval
//!
//! Pages are fetched through an ordered list of strategies: the portal itself,
//! then public intermediaries that relay the page. Each attempt is bounded by a
//! timeout, and a response too short to be a decision counts as a failure.

use crate::config::{CaptureConfig, FetchStrategy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of remote page content
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Retrieve the page at `url`, or fail with [`Error::FetchExhausted`]
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Expand a strategy template for `url`
pub fn strategy_url(template: &str, url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    template
        .replace("{url_encoded}", &encoded)
        .replace("{url}", url)
}

/// HTTP fetcher trying each configured strategy in order
pub struct HttpFetcher {
    client: Client,
    strategies: Vec<FetchStrategy>,
    timeout: Duration,
    min_chars: usize,
}

impl HttpFetcher {
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            strategies: config.fetch_strategies.clone(),
            timeout,
            min_chars: config.min_fetch_chars,
        })
    }

    async fn attempt(&self, target: &str) -> Result<String> {
        let response = self.client.get(target).send().await?.error_for_status()?;
        let body = response.text().await?;

        let chars = body.chars().count();
        if chars < self.min_chars {
            return Err(Error::Other(format!(
                "response too short ({} chars, need {})",
                chars, self.min_chars
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        for strategy in &self.strategies {
            let target = strategy_url(&strategy.template, url);
            debug!(strategy = %strategy.name, "Fetching {}", target);

            match tokio::time::timeout(self.timeout, self.attempt(&target)).await {
                Ok(Ok(body)) => {
                    info!(strategy = %strategy.name, "Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Ok(Err(e)) => warn!(strategy = %strategy.name, "Fetch failed: {}", e),
                Err(_) => warn!(
                    strategy = %strategy.name,
                    "Fetch timed out after {:?}", self.timeout
                ),
            }
        }

        Err(Error::FetchExhausted(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page() -> String {
        format!(
            "<html><body><table><tr><td>Processo:</td><td>1/22</td></tr></table>{}</body></html>",
            "Acórdão ".repeat(100)
        )
    }

    fn config(server: &MockServer) -> CaptureConfig {
        CaptureConfig {
            fetch_timeout_secs: 1,
            fetch_strategies: vec![
                FetchStrategy {
                    name: "direct".to_string(),
                    template: "{url}".to_string(),
                },
                FetchStrategy {
                    name: "relay".to_string(),
                    template: format!("{}/raw?url={{url_encoded}}", server.uri()),
                },
            ],
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn test_strategy_url() {
        assert_eq!(
            strategy_url("https://relay.example/raw?url={url_encoded}", "http://www.dgsi.pt/a b?x=1"),
            "https://relay.example/raw?url=http%3A%2F%2Fwww.dgsi.pt%2Fa+b%3Fx%3D1"
        );
        assert_eq!(strategy_url("{url}", "http://www.dgsi.pt/"), "http://www.dgsi.pt/");
    }

    #[tokio::test]
    async fn test_direct_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jstj.nsf/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page().into_bytes(), "text/html"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&config(&mock_server)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/jstj.nsf/abc", mock_server.uri()))
            .await
            .unwrap();
        assert!(body.contains("Processo:"));
    }

    #[tokio::test]
    async fn test_falls_back_to_relay() {
        let mock_server = MockServer::start().await;
        let target = format!("{}/jstj.nsf/blocked", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/jstj.nsf/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .and(query_param("url", target.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page().into_bytes(), "text/html"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&config(&mock_server)).unwrap();
        assert!(fetcher.fetch(&target).await.is_ok());
    }

    #[tokio::test]
    async fn test_short_or_slow_responses_exhaust_strategies() {
        let mock_server = MockServer::start().await;
        let target = format!("{}/jstj.nsf/short", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/jstj.nsf/short"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>curto</html>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&config(&mock_server)).unwrap();
        match fetcher.fetch(&target).await {
            Err(Error::FetchExhausted(url)) => assert_eq!(url, target),
            other => panic!("expected exhaustion, got {:?}", other.map(|b| b.len())),
        }
    }
}
