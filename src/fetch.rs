//! GitHub implementation of the core [`Fetcher`] contract.
//!
//! Lists `/repos/{owner}/{repo}/issues` with `state=all` and 100 items per page,
//! starting at page 1, until an empty page or the page cap. The text media type is
//! requested so that records carry a plain-text `body_text`.

use async_trait::async_trait;
use issue_sync_core::config::SourceRepo;
use issue_sync_core::contract::{FetchError, Fetcher};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;

use crate::load_config::GitHubConfig;

pub const PER_PAGE: u32 = 100;
const TEXT_MEDIA_TYPE: &str = "application/vnd.github.text+json";
const USER_AGENT: &str = concat!("issue-sync/", env!("CARGO_PKG_VERSION"));

pub struct GitHubFetcher {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubFetcher {
    pub fn new(config: &GitHubConfig) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        tracing::info!(
            api_url = %config.api_url,
            token_set = config.token.is_some(),
            "Initialized GitHubFetcher"
        );
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn issues_url(&self, source: &SourceRepo) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            self.api_url, source.owner, source.repo
        )
    }

    async fn fetch_page(&self, url: &str, page: u32) -> Result<Vec<Value>, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, TEXT_MEDIA_TYPE)
            .query(&[("state", "all")])
            .query(&[("per_page", PER_PAGE), ("page", page)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, url, page, "Request to GitHub failed");
            e
        })?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, url, page, "GitHub API returned error. Response body: {text}");
            return Err(format!("GitHub API error for {url} (page {page}): {status}: {text}").into());
        }

        let items = response.json::<Vec<Value>>().await.map_err(|e| {
            tracing::error!(error = ?e, url, page, "GitHub response was not a JSON array");
            e
        })?;
        Ok(items)
    }
}

#[async_trait]
impl Fetcher for GitHubFetcher {
    async fn fetch(
        &self,
        source: &SourceRepo,
        max_pages: Option<u32>,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.issues_url(source);
        let mut issues = Vec::new();
        let mut page: u32 = 1;

        loop {
            if max_pages.is_some_and(|max| page > max) {
                tracing::info!(source = source.name(), max_pages = ?max_pages, "Page cap reached");
                break;
            }
            tracing::info!(source = source.name(), page, "Fetching page");
            let items = self.fetch_page(&url, page).await?;
            if items.is_empty() {
                break;
            }
            issues.extend(items);
            page += 1;
        }

        tracing::info!(source = source.name(), total = issues.len(), "Total issues fetched");
        Ok(issues)
    }
}
