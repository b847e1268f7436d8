use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ProviderError, ResultItem, SearchOptions, SearchPayload, SearchProvider, ensure_success,
    page_size,
};
use crate::credentials::Credential;

const API_URL: &str = "https://api.tavily.com/search";
const FAMILY: &str = "tavily";
const MAX_COUNT: u32 = 20;

/// Tavily search API: JSON POST with the key in the request body.
#[derive(Debug, Clone)]
pub struct TavilyAdapter {
    http: Client,
    url: String,
}

impl TavilyAdapter {
    pub fn new(http: Client, endpoint: Option<String>) -> Self {
        Self {
            http,
            url: endpoint.unwrap_or_else(|| API_URL.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl SearchProvider for TavilyAdapter {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError> {
        let request = TavilyRequest {
            api_key: credential.expose(),
            query,
            max_results: page_size(count, MAX_COUNT),
            time_range: options.freshness.map(|f| f.as_str()),
        };

        let response = self
            .http
            .post(&self.url)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .send()
            .await?;
        let body: TavilyResponse = ensure_success(FAMILY, response).await?.json().await?;

        let items: Vec<ResultItem> = body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| ResultItem {
                title: r.title,
                url: r.url,
                description: r.content,
            })
            .collect();
        debug!(results = items.len(), "tavily search complete");
        Ok(SearchPayload::Results(items))
    }
}
