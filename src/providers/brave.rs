use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{
    Freshness, ProviderError, ResultItem, SearchOptions, SearchPayload, SearchProvider,
    ensure_success, page_size,
};
use crate::credentials::Credential;

const API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const FAMILY: &str = "brave";
const MAX_COUNT: u32 = 20;

/// Brave Search web API: query-string GET, key in `X-Subscription-Token`.
#[derive(Debug, Clone)]
pub struct BraveAdapter {
    http: Client,
    url: String,
}

impl BraveAdapter {
    pub fn new(http: Client, endpoint: Option<String>) -> Self {
        Self {
            http,
            url: endpoint.unwrap_or_else(|| API_URL.to_string()),
        }
    }
}

impl SearchProvider for BraveAdapter {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("count", page_size(count, MAX_COUNT).to_string()),
        ];
        if let Some(freshness) = options.freshness {
            params.push(("freshness", freshness_code(freshness).to_string()));
        }
        let url = Url::parse_with_params(&self.url, &params)?;

        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", credential.expose())
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        let body: BraveResponse = ensure_success(FAMILY, response).await?.json().await?;

        let items: Vec<ResultItem> = body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| ResultItem {
                title: r.title,
                url: r.url,
                description: r.description,
            })
            .collect();
        debug!(results = items.len(), "brave search complete");
        Ok(SearchPayload::Results(items))
    }
}

fn freshness_code(freshness: Freshness) -> &'static str {
    match freshness {
        Freshness::Day => "pd",
        Freshness::Week => "pw",
        Freshness::Month => "pm",
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> BraveAdapter {
        BraveAdapter::new(Client::new(), Some(format!("{}/res/v1/web/search", server.uri())))
    }

    fn key() -> Credential {
        Credential::new("brave-key").unwrap()
    }

    #[tokio::test]
    async fn maps_web_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(query_param("q", "rust async"))
            .and(query_param("count", "5"))
            .and(header("X-Subscription-Token", "brave-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "web": {
                    "results": [
                        {"title": "Tokio", "url": "https://tokio.rs", "description": "Runtime"},
                        {"title": "No URL", "description": "dropped"}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = adapter(&server)
            .search(&key(), "rust async", 5, &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(
            payload,
            SearchPayload::Results(vec![ResultItem {
                title: "Tokio".into(),
                url: "https://tokio.rs".into(),
                description: "Runtime".into(),
            }])
        );
    }

    #[tokio::test]
    async fn sends_freshness_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("freshness", "pw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let options = SearchOptions {
            freshness: Some(Freshness::Week),
        };
        let payload = adapter(&server)
            .search(&key(), "news", 10, &options)
            .await
            .unwrap();
        assert_eq!(payload.item_count(), Some(0));
    }

    #[tokio::test]
    async fn count_is_capped_at_api_maximum() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("count", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server)
            .search(&key(), "rust", 50, &SearchOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"detail": "Invalid subscription token"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .search(&key(), "q", 10, &SearchOptions::default())
            .await
            .unwrap_err();
        match err {
            ProviderError::Api {
                provider,
                status,
                message,
            } => {
                assert_eq!(provider, "brave");
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid subscription token");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }
}
