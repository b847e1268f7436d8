use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Freshness, ProviderError, ResultItem, SearchOptions, SearchPayload, SearchProvider,
    ensure_success, page_size,
};
use crate::credentials::Credential;

const API_URL: &str = "https://google.serper.dev/search";
const FAMILY: &str = "serper";
const MAX_COUNT: u32 = 100;

/// Serper (Google results) API: JSON POST, key in `X-API-KEY`.
#[derive(Debug, Clone)]
pub struct SerperAdapter {
    http: Client,
    url: String,
}

impl SerperAdapter {
    pub fn new(http: Client, endpoint: Option<String>) -> Self {
        Self {
            http,
            url: endpoint.unwrap_or_else(|| API_URL.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tbs: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SearchProvider for SerperAdapter {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError> {
        let request = SerperRequest {
            q: query,
            num: page_size(count, MAX_COUNT),
            tbs: options.freshness.map(time_filter),
        };

        let response = self
            .http
            .post(&self.url)
            .header("X-API-KEY", credential.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .send()
            .await?;
        let body: SerperResponse = ensure_success(FAMILY, response).await?.json().await?;

        let items: Vec<ResultItem> = body
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| ResultItem {
                title: r.title,
                url: r.link,
                description: r.snippet,
            })
            .collect();
        debug!(results = items.len(), "serper search complete");
        Ok(SearchPayload::Results(items))
    }
}

fn time_filter(freshness: Freshness) -> &'static str {
    match freshness {
        Freshness::Day => "qdr:d",
        Freshness::Week => "qdr:w",
        Freshness::Month => "qdr:m",
    }
}
