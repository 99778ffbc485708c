//! Scrape collaborator: turns a webpage URL into a full-page screenshot URL.
//!
//! [`ScrapeClient`] is the seam the rest of the crate depends on;
//! [`FirecrawlClient`] is the HTTP implementation against the Firecrawl
//! `/v1/scrape` endpoint.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "firecrawl";

/// Output format requested from the scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeFormat {
    /// Screenshot of the whole scrollable page, not just the viewport.
    FullPageScreenshot,
}

impl ScrapeFormat {
    fn wire_name(self) -> &'static str {
        match self {
            ScrapeFormat::FullPageScreenshot => "screenshot@fullPage",
        }
    }
}

/// One scrape request.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub format: ScrapeFormat,
    /// Time the page is given to settle before capture.
    pub wait_ms: u64,
}

impl ScrapeRequest {
    pub fn full_page_screenshot(url: impl Into<String>, wait_ms: u64) -> Self {
        Self {
            url: url.into(),
            format: ScrapeFormat::FullPageScreenshot,
            wait_ms,
        }
    }
}

/// A service able to capture a screenshot of a webpage.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    /// Returns the screenshot location (URL or data URI), or `None` when the
    /// service answered without one.
    async fn screenshot(&self, request: &ScrapeRequest) -> Result<Option<String>, WebRagError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeBody<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    wait_for: u64,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    screenshot: Option<String>,
}

/// Firecrawl HTTP client.
#[derive(Clone)]
pub struct FirecrawlClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FirecrawlClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, WebRagError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.firecrawl_base_url.trim_end_matches('/').to_string(),
            api_key: config.firecrawl_api_key.clone(),
        })
    }
}

#[async_trait]
impl ScrapeClient for FirecrawlClient {
    async fn screenshot(&self, request: &ScrapeRequest) -> Result<Option<String>, WebRagError> {
        info!("Scraping {} ({})", request.url, request.format.wire_name());

        let body = ScrapeBody {
            url: &request.url,
            formats: [request.format.wire_name()],
            wait_for: request.wait_ms,
        };
        let mut call = self
            .http
            .post(format!("{}/v1/scrape", self.base_url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;

        let parsed: Option<ScrapeResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let detail = parsed
                .and_then(|p| p.error)
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(WebRagError::collaborator(
                SERVICE,
                format!("HTTP {status}: {detail}"),
            ));
        }

        let parsed = parsed.ok_or_else(|| {
            WebRagError::collaborator(SERVICE, "response is not valid JSON")
        })?;
        if !parsed.success {
            let detail = parsed
                .error
                .unwrap_or_else(|| "request reported success: false".to_string());
            return Err(WebRagError::collaborator(SERVICE, detail));
        }

        let screenshot = parsed
            .data
            .and_then(|d| d.screenshot)
            .filter(|s| !s.trim().is_empty());
        debug!("Screenshot returned: {}", screenshot.is_some());
        Ok(screenshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_wire_names() {
        let body = ScrapeBody {
            url: "https://example.com",
            formats: [ScrapeFormat::FullPageScreenshot.wire_name()],
            wait_for: 10_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["formats"][0], "screenshot@fullPage");
        assert_eq!(json["waitFor"], 10_000);
        assert_eq!(json["url"], "https://example.com");
    }

    #[test]
    fn response_without_screenshot_parses() {
        let parsed: ScrapeResponse =
            serde_json::from_str(r##"{"success":true,"data":{"markdown":"# hi"}}"##).unwrap();
        assert!(parsed.success);
        assert!(parsed.data.unwrap().screenshot.is_none());
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = AssistantConfig::builder()
            .firecrawl_base_url("http://localhost:3002/")
            .build()
            .unwrap();
        let client = FirecrawlClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:3002");
    }
}
