//! Search provider adapters: one per provider family, plus a generic
//! HTTP-JSON adapter for arbitrary backends.

mod brave;
mod custom;
mod serper;
mod tavily;

pub use brave::BraveAdapter;
pub use custom::CustomAdapter;
pub use serper::SerperAdapter;
pub use tavily::TavilyAdapter;

use reqwest::{Client, Response};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ProviderSpec;
use crate::credentials::Credential;

const ERROR_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    Brave,
    Tavily,
    Serper,
    /// Generic HTTP-JSON backend; also the fallback for unrecognized tags.
    #[serde(other)]
    Custom,
}

impl ProviderFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderFamily::Brave => "brave",
            ProviderFamily::Tavily => "tavily",
            ProviderFamily::Serper => "serper",
            ProviderFamily::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Day,
    Week,
    Month,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Day => "day",
            Freshness::Week => "week",
            Freshness::Month => "month",
        }
    }
}

/// Per-call filters. Each family maps what it supports and ignores the rest.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub freshness: Option<Freshness>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchPayload {
    /// Results normalized from a known family's response.
    Results(Vec<ResultItem>),
    /// Body of a generic backend, passed through as-is.
    Raw(serde_json::Value),
}

impl SearchPayload {
    pub fn item_count(&self) -> Option<usize> {
        match self {
            SearchPayload::Results(items) => Some(items.len()),
            SearchPayload::Raw(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("no endpoint configured for custom provider")]
    MissingEndpoint,

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A backend that can answer a web search.
/// Implemented by [`Adapter`] for production; mock implementations used in tests.
pub trait SearchProvider {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError>;
}

/// Closed dispatch over the supported provider families.
#[derive(Debug, Clone)]
pub enum Adapter {
    Brave(BraveAdapter),
    Tavily(TavilyAdapter),
    Serper(SerperAdapter),
    Custom(CustomAdapter),
}

impl Adapter {
    pub fn for_spec(http: Client, spec: &ProviderSpec) -> Self {
        let endpoint = spec.endpoint.clone();
        match spec.family {
            ProviderFamily::Brave => Adapter::Brave(BraveAdapter::new(http, endpoint)),
            ProviderFamily::Tavily => Adapter::Tavily(TavilyAdapter::new(http, endpoint)),
            ProviderFamily::Serper => Adapter::Serper(SerperAdapter::new(http, endpoint)),
            ProviderFamily::Custom => {
                Adapter::Custom(CustomAdapter::new(http, endpoint, spec.options.clone()))
            }
        }
    }
}

impl SearchProvider for Adapter {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError> {
        match self {
            Adapter::Brave(a) => a.search(credential, query, count, options).await,
            Adapter::Tavily(a) => a.search(credential, query, count, options).await,
            Adapter::Serper(a) => a.search(credential, query, count, options).await,
            Adapter::Custom(a) => a.search(credential, query, count, options).await,
        }
    }
}

/// Fit a requested result count into what a hosted API accepts per request.
fn page_size(count: u32, max: u32) -> u32 {
    count.clamp(1, max)
}

/// Pass successful responses through; turn anything else into [`ProviderError::Api`].
async fn ensure_success(
    provider: &'static str,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = extract_error_message(&text).unwrap_or_else(|| {
        let snippet: String = text.chars().take(ERROR_SNIPPET_CHARS).collect();
        format!("HTTP {status}: {snippet}")
    });
    warn!(provider, status = status.as_u16(), "search API error");
    Err(ProviderError::Api {
        provider,
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of a JSON error body, if there is one.
fn extract_error_message(body: &str) -> Option<String> {
    fn field(value: &serde_json::Value, key: &str) -> Option<String> {
        value.get(key)?.as_str().map(str::to_string)
    }

    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    field(&value, "message")
        .or_else(|| field(&value, "error"))
        .or_else(|| field(&value, "detail"))
        .or_else(|| value.get("error").and_then(|e| field(e, "message")))
        .or_else(|| value.get("error").and_then(|e| field(e, "detail")))
}
