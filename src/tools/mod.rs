mod errors;
mod params;

pub use params::SearchParams;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use tracing::info;

use errors::{search_error_result, to_json};

use crate::config::Config;
use crate::credentials::EnvCredentials;
use crate::providers::{Adapter, SearchOptions};
use crate::search::{FallbackSearch, Provider, SearchRequest};
use crate::usage::UsageStore;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout; a provider that exceeds it counts as failed.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;
const DEFAULT_COUNT: u32 = 10;

pub type WebSearch = FallbackSearch<Adapter, EnvCredentials>;

/// MCP server handler exposing quota-aware web search.
#[derive(Clone)]
pub struct QuotaSearch {
    search: Arc<WebSearch>,
    tool_router: ToolRouter<Self>,
}

pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

#[tool_router]
impl QuotaSearch {
    pub fn new(search: WebSearch) -> Self {
        Self {
            search: Arc::new(search),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = http_client()?;
        let providers = config
            .providers
            .iter()
            .map(|spec| Provider {
                spec: spec.clone(),
                adapter: Adapter::for_spec(http.clone(), spec),
            })
            .collect();
        let usage = Arc::new(UsageStore::open(&config.usage_file).await);
        let credentials = EnvCredentials::new().with_file(&config.credentials_file);

        Ok(Self::new(FallbackSearch::new(
            providers,
            config.primary.clone(),
            usage,
            credentials,
        )))
    }

    #[tool(
        name = "search",
        description = "Search the web. Tries the configured search providers in order, skipping any whose monthly quota is used up or whose API key is missing, and falls back to the next provider when one fails. Returns JSON {provider, query, results: [{title, url, description}]}."
    )]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let count = params.count.unwrap_or(DEFAULT_COUNT);

        info!(query = %params.query, count, "tool:search");

        let request = SearchRequest {
            query: params.query,
            count,
            options: SearchOptions {
                freshness: params.freshness,
            },
        };

        match self.search.search(&request).await {
            Ok(result) => {
                info!(provider = %result.provider, "search complete");
                Ok(CallToolResult::success(vec![Content::text(to_json(&result)?)]))
            }
            Err(e) => search_error_result(&e),
        }
    }

    #[tool(
        name = "search_usage",
        description = "Show this month's request count, monthly limit, and remaining quota for each configured search provider, in the order they are tried."
    )]
    async fn search_usage(&self) -> Result<CallToolResult, McpError> {
        info!("tool:search_usage");
        let report = self.search.usage_report().await;
        Ok(CallToolResult::success(vec![Content::text(to_json(&report)?)]))
    }
}

#[tool_handler]
impl ServerHandler for QuotaSearch {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "quota-search".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "quota-search provides web search across several search APIs with automatic fallback and per-provider monthly quotas (search), plus a quota report (search_usage)."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
